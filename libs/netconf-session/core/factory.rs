use crate::core::channel::Channel;
use crate::core::session::Session;
use crate::framing::FramingMechanism;
use crate::message::HelloMessage;
use crate::traits::{NetconfError, Result, SessionFactory, SessionListener};
use std::sync::Arc;

/// Builds client sessions; the server hello must carry the session id
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientSessionFactory;

impl SessionFactory for ClientSessionFactory {
    fn create_session(
        &self,
        listener: Arc<dyn SessionListener>,
        channel: &Channel,
        peer_hello: &HelloMessage,
        framing: FramingMechanism,
    ) -> Result<Session> {
        let session_id = peer_hello.session_id().ok_or_else(|| {
            NetconfError::SessionRejected(format!("server hello on {} carries no session-id", channel))
        })?;
        Ok(Session::new(
            session_id,
            channel.clone(),
            listener,
            peer_hello.clone(),
            framing,
        ))
    }
}

/// Builds server sessions under an id assigned before negotiation
#[derive(Debug, Clone, Copy)]
pub struct ServerSessionFactory {
    session_id: u64,
}

impl ServerSessionFactory {
    pub fn new(session_id: u64) -> Self {
        Self { session_id }
    }
}

impl SessionFactory for ServerSessionFactory {
    fn create_session(
        &self,
        listener: Arc<dyn SessionListener>,
        channel: &Channel,
        peer_hello: &HelloMessage,
        framing: FramingMechanism,
    ) -> Result<Session> {
        if let Some(id) = peer_hello.session_id() {
            return Err(NetconfError::SessionRejected(format!(
                "client hello on {} carries session-id {}",
                channel, id
            )));
        }
        Ok(Session::new(
            self.session_id,
            channel.clone(),
            listener,
            peer_hello.clone(),
            framing,
        ))
    }
}
