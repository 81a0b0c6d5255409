use crate::traits::{NetconfError, Result, TransportConnector, TransportStream};
use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Plain TCP transport to a fixed address
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl TransportConnector for TcpConnector {
    async fn connect(&self, timeout: Duration) -> Result<TransportStream> {
        debug!("[TcpConnector] Connecting to {} (timeout {:?})", self.address, timeout);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                NetconfError::Transport(format!(
                    "connect to {} timed out after {:?}",
                    self.address, timeout
                ))
            })??;
        stream.set_nodelay(true)?;

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.address.clone());
        debug!("[TcpConnector] Connected to {}", peer);
        Ok(TransportStream::new(stream, peer))
    }

    fn peer(&self) -> String {
        self.address.clone()
    }
}
