use crate::traits::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream a channel can run on
pub trait AsyncStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> AsyncStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Completion signal of a security handshake (e.g. TLS) running on a stream
///
/// Negotiation is deferred until it resolves and aborted if it fails.
pub struct SecurityHandshake {
    completion: BoxFuture<'static, Result<()>>,
}

impl SecurityHandshake {
    pub fn new<F>(completion: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            completion: Box::pin(completion),
        }
    }

    pub async fn wait(self) -> Result<()> {
        self.completion.await
    }
}

impl fmt::Debug for SecurityHandshake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityHandshake")
    }
}

/// A live stream produced by the transport layer
pub struct TransportStream {
    io: Box<dyn AsyncStream>,
    peer: String,
    security: Option<SecurityHandshake>,
}

impl TransportStream {
    pub fn new(io: impl AsyncStream, peer: impl Into<String>) -> Self {
        Self {
            io: Box::new(io),
            peer: peer.into(),
            security: None,
        }
    }

    /// Attach a pending security handshake
    pub fn with_security_handshake(mut self, handshake: SecurityHandshake) -> Self {
        self.security = Some(handshake);
        self
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn has_security_handshake(&self) -> bool {
        self.security.is_some()
    }

    pub(crate) fn into_parts(self) -> (Box<dyn AsyncStream>, String, Option<SecurityHandshake>) {
        (self.io, self.peer, self.security)
    }
}

impl fmt::Debug for TransportStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportStream")
            .field("peer", &self.peer)
            .field("security", &self.security.is_some())
            .finish()
    }
}

/// Trait for establishing transport streams to a fixed peer
#[async_trait]
pub trait TransportConnector: Send + Sync + 'static {
    /// Open a new stream, giving up after `timeout`
    async fn connect(&self, timeout: Duration) -> Result<TransportStream>;

    /// Human-readable peer identity used in logs
    fn peer(&self) -> String;
}
