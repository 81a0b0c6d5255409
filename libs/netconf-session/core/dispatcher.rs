//! Client and server entry points: connect (or accept) and negotiate

use crate::core::channel::Channel;
use crate::core::config::NegotiatorConfig;
use crate::core::factory::{ClientSessionFactory, ServerSessionFactory};
use crate::core::negotiator::SessionNegotiator;
use crate::core::promise::Promise;
use crate::core::session::Session;
use crate::message::{CapabilitySet, HelloMessage};
use crate::traits::{
    NetconfError, Result, SessionFactory, SessionListener, TransportConnector, TransportStream,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Start negotiating on `stream`; the promise resolves exactly once
///
/// Cancelling the promise closes the channel.
fn negotiate_stream(
    stream: TransportStream,
    local_hello: HelloMessage,
    factory: Arc<dyn SessionFactory>,
    listener: Arc<dyn SessionListener>,
    config: NegotiatorConfig,
    promise: Promise<Session>,
) -> Result<Channel> {
    let negotiator = SessionNegotiator::new(local_hello, promise.clone(), factory, listener, config);
    let channel = Channel::spawn(stream, negotiator.into_pipeline()?);

    let watched = channel.clone();
    promise.on_complete(move |outcome| {
        if let Err(NetconfError::Cancelled) = outcome {
            debug!("Negotiation on {} cancelled, closing", watched);
            watched.close();
        }
    });
    Ok(channel)
}

/// Connects to one peer and negotiates client sessions
#[derive(Clone)]
pub struct ClientDispatcher {
    connector: Arc<dyn TransportConnector>,
    capabilities: CapabilitySet,
    listener: Arc<dyn SessionListener>,
    config: NegotiatorConfig,
}

impl ClientDispatcher {
    pub fn new(
        connector: Arc<dyn TransportConnector>,
        capabilities: CapabilitySet,
        listener: Arc<dyn SessionListener>,
        config: NegotiatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            connector,
            capabilities,
            listener,
            config,
        })
    }

    pub fn peer(&self) -> String {
        self.connector.peer()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Connect and negotiate one session
    pub fn create_client(&self, connect_timeout: Duration) -> Promise<Session> {
        let promise = Promise::new();
        let this = self.clone();
        let attempt = promise.clone();

        tokio::spawn(async move {
            let stream = match this.connector.connect(connect_timeout).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("Connecting to {} failed: {}", this.peer(), e);
                    attempt.try_failure(e);
                    return;
                }
            };

            if attempt.is_done() {
                debug!("Attempt to {} resolved while connecting, dropping stream", this.peer());
                return;
            }

            let hello = HelloMessage::new(this.capabilities.clone());
            if let Err(e) = negotiate_stream(
                stream,
                hello,
                Arc::new(ClientSessionFactory),
                Arc::clone(&this.listener),
                this.config.clone(),
                attempt.clone(),
            ) {
                attempt.try_failure(e);
            }
        });

        promise
    }

    /// Negotiate a client session on an already established stream
    pub fn negotiate(&self, stream: TransportStream) -> Result<(Channel, Promise<Session>)> {
        let promise = Promise::new();
        let channel = negotiate_stream(
            stream,
            HelloMessage::new(self.capabilities.clone()),
            Arc::new(ClientSessionFactory),
            Arc::clone(&self.listener),
            self.config.clone(),
            promise.clone(),
        )?;
        Ok((channel, promise))
    }
}

/// Negotiates server sessions on accepted streams
pub struct ServerDispatcher {
    capabilities: CapabilitySet,
    listener: Arc<dyn SessionListener>,
    config: NegotiatorConfig,
    next_session_id: AtomicU64,
}

impl ServerDispatcher {
    pub fn new(
        capabilities: CapabilitySet,
        listener: Arc<dyn SessionListener>,
        config: NegotiatorConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            capabilities,
            listener,
            config,
            next_session_id: AtomicU64::new(1),
        })
    }

    /// Negotiate on an accepted stream under a fresh session id
    pub fn negotiate(&self, stream: TransportStream) -> Result<(Channel, Promise<Session>)> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        let hello = HelloMessage::new(self.capabilities.clone()).with_session_id(session_id);
        let promise = Promise::new();
        let channel = negotiate_stream(
            stream,
            hello,
            Arc::new(ServerSessionFactory::new(session_id)),
            Arc::clone(&self.listener),
            self.config.clone(),
            promise.clone(),
        )?;
        info!("Negotiating session {} on {}", session_id, channel);
        Ok((channel, promise))
    }

    /// Accept connections until the listener fails
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, addr) = listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            match self.negotiate(TransportStream::new(stream, addr.to_string())) {
                Ok((channel, promise)) => promise.on_complete(move |outcome| match outcome {
                    Ok(session) => debug!("Accepted {}", session),
                    Err(e) => warn!("Negotiation on {} failed: {}", channel, e),
                }),
                Err(e) => error!("Failed to start negotiation with {}: {}", addr, e),
            }
        }
    }
}
