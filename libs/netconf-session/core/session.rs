//! Established session
//!
//! The session owns the connection once negotiation has succeeded. All
//! writes are queued on the connection's context, so messages reach the
//! transport in the order `send` was called.

use crate::core::channel::{names, Channel, HandlerContext, Stage, WriteFuture};
use crate::framing::FramingMechanism;
use crate::message::{CapabilitySet, HelloMessage, NetconfMessage};
use crate::traits::{
    ChannelEvent, ChannelHandler, InboundEvent, MessageDecoder, MessageEncoder, NetconfError, Result,
    SessionListener, TerminationReason,
};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

struct SessionInner {
    session_id: u64,
    channel: Channel,
    listener: Arc<dyn SessionListener>,
    peer_hello: HelloMessage,
    framing: FramingMechanism,
    up: AtomicBool,
    closed: AtomicBool,
    /// Encoder to install right after the next outbound message
    delayed_encoder: Mutex<Option<Box<dyn MessageEncoder>>>,
}

/// Handle to an established session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(
        session_id: u64,
        channel: Channel,
        listener: Arc<dyn SessionListener>,
        peer_hello: HelloMessage,
        framing: FramingMechanism,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id,
                channel,
                listener,
                peer_hello,
                framing,
                up: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                delayed_encoder: Mutex::new(None),
            }),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.inner.session_id
    }

    pub fn channel(&self) -> &Channel {
        &self.inner.channel
    }

    pub fn peer_hello(&self) -> &HelloMessage {
        &self.inner.peer_hello
    }

    pub fn peer_capabilities(&self) -> &CapabilitySet {
        self.inner.peer_hello.capabilities()
    }

    pub fn framing(&self) -> FramingMechanism {
        self.inner.framing
    }

    pub fn is_up(&self) -> bool {
        self.inner.up.load(Ordering::Acquire)
    }

    /// Mark the session usable and notify the listener
    pub(crate) fn session_up(&self) {
        if self.inner.closed.load(Ordering::Acquire) {
            return;
        }
        self.inner.up.store(true, Ordering::Release);
        debug!("{} up", self);
        self.inner.listener.on_session_up(self);
    }

    /// Queue a message for writing
    pub fn send(&self, message: NetconfMessage) -> WriteFuture {
        // Held while queueing so a deferred swap lands after exactly this message
        let mut delayed = self.inner.delayed_encoder.lock();
        match delayed.take() {
            Some(encoder) => {
                let id = self.inner.session_id;
                self.inner.channel.write_then(
                    message,
                    Box::new(move |ctx: &mut HandlerContext<'_>| {
                        let stage = Stage::MessageEncoder(encoder);
                        match ctx.replace(names::MESSAGE_ENCODER, names::MESSAGE_ENCODER, stage) {
                            Ok(old) => debug!("Session {} replaced encoder {:?}", id, old),
                            Err(e) => warn!("Session {} failed to replace encoder: {}", id, e),
                        }
                    }),
                )
            }
            None => self.inner.channel.write(message),
        }
    }

    /// Close the session; the listener is notified once
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.up.store(false, Ordering::Release);
        info!("{} closing", self);
        self.inner.channel.close();
        self.inner
            .listener
            .on_session_terminated(self, &TerminationReason::new("Session closed"));
    }

    /// Replace the message decoder before the next frame is decoded
    pub async fn replace_message_decoder(&self, decoder: impl MessageDecoder) -> Result<()> {
        self.replace_stage(names::MESSAGE_DECODER, Stage::message_decoder(decoder))
            .await
    }

    /// Replace the message encoder before the next message is encoded
    pub async fn replace_message_encoder(&self, encoder: impl MessageEncoder) -> Result<()> {
        self.replace_stage(names::MESSAGE_ENCODER, Stage::message_encoder(encoder))
            .await
    }

    /// Replace the message encoder right after the next outbound message
    ///
    /// Only one deferred replacement may be pending at a time.
    pub fn replace_message_encoder_after_next_message(&self, encoder: impl MessageEncoder) -> Result<()> {
        let mut delayed = self.inner.delayed_encoder.lock();
        if delayed.is_some() {
            return Err(NetconfError::EncoderReplacementPending);
        }
        *delayed = Some(Box::new(encoder));
        Ok(())
    }

    async fn replace_stage(&self, name: &'static str, stage: Stage) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.channel.execute(move |ctx| {
            let _ = tx.send(ctx.replace(name, name, stage).map(|_| ()));
        })?;
        rx.await
            .map_err(|_| NetconfError::ChannelClosed(self.inner.channel.to_string()))?
    }

    /// The peer ended the stream; reported only if the session was up and
    /// not closed locally first
    fn end_of_input(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let was_up = self.inner.up.swap(false, Ordering::AcqRel);
        debug!("{}: end of input", self);
        if was_up {
            let cause = NetconfError::ChannelClosed("End of input".into());
            self.inner.listener.on_session_down(self, &cause);
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session {} on {}", self.inner.session_id, self.inner.channel)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.inner.session_id)
            .field("channel", &self.inner.channel)
            .field("framing", &self.inner.framing)
            .field("up", &self.is_up())
            .finish()
    }
}

/// The `session` handler stage, installed in place of the negotiator
pub struct SessionHandler {
    session: Session,
}

impl SessionHandler {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

impl ChannelHandler for SessionHandler {
    fn handle(&mut self, _ctx: &mut HandlerContext<'_>, event: ChannelEvent) -> Option<ChannelEvent> {
        let session = &self.session;
        let listener = &session.inner.listener;
        match event {
            ChannelEvent::Inbound(InboundEvent::Message(message)) => {
                listener.on_message(session, message);
                None
            }
            ChannelEvent::Inbound(InboundEvent::Hello(hello)) => {
                let error = NetconfError::ProtocolViolation(format!("unexpected {} on established session", hello));
                listener.on_error(session, &error);
                None
            }
            ChannelEvent::Inbound(InboundEvent::StreamError(error)) => {
                debug!("{} error: {}", session, error);
                listener.on_error(session, &error);
                None
            }
            ChannelEvent::Inactive => {
                session.end_of_input();
                Some(ChannelEvent::Inactive)
            }
            ChannelEvent::Active => None,
        }
    }
}
