//! Session negotiation state machine
//!
//! One negotiator is installed per connection, as the `negotiator` handler
//! stage. On activation it sends the local hello, arms the negotiation timer
//! and waits for the peer hello. When the peer hello arrives it selects the
//! framing mechanism, swaps the wire stages, builds the session through the
//! factory and replaces itself with the session handler.
//!
//! ```text
//! IDLE ──start──► OPEN_WAIT ──peer hello──► ESTABLISHED
//!   │                 │
//!   └──error──► FAILED ◄──error / timeout──┘
//! ```

pub mod state;
mod timeout;

pub use crate::framing::select_framing;
pub use state::{NegotiationState, NegotiationStateCell};

use crate::core::channel::{names, HandlerContext, Pipeline, Stage};
use crate::core::config::NegotiatorConfig;
use crate::core::promise::Promise;
use crate::core::session::{Session, SessionHandler};
use crate::framing::{ChunkAggregator, EomFrameDecoder, FramedMessageEncoder, FramingMechanism};
use crate::message::{DocumentDecoder, HelloMessage, HelloMessageDecoder};
use crate::traits::{
    ChannelEvent, ChannelHandler, InboundEvent, NetconfError, Result, SessionFactory, SessionListener,
};
use futures::FutureExt;
use std::sync::Arc;
use timeout::NegotiationTimer;
use tracing::{debug, info, trace, warn};

/// State shared between the negotiator stage, its exception stage and its
/// timer and handshake tasks
struct NegotiatorShared {
    local_hello: HelloMessage,
    state: Arc<NegotiationStateCell>,
    timer: NegotiationTimer,
    promise: Promise<Session>,
    factory: Arc<dyn SessionFactory>,
    listener: Arc<dyn SessionListener>,
    config: NegotiatorConfig,
}

/// The `negotiator` handler stage
pub struct SessionNegotiator {
    shared: Arc<NegotiatorShared>,
}

impl SessionNegotiator {
    /// Create a negotiator resolving `promise` exactly once
    pub fn new(
        local_hello: HelloMessage,
        promise: Promise<Session>,
        factory: Arc<dyn SessionFactory>,
        listener: Arc<dyn SessionListener>,
        config: NegotiatorConfig,
    ) -> Self {
        Self {
            shared: Arc::new(NegotiatorShared {
                local_hello,
                state: Arc::new(NegotiationStateCell::new()),
                timer: NegotiationTimer::new(),
                promise,
                factory,
                listener,
                config,
            }),
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.shared.state.get()
    }

    /// Handle on the state cell, readable after the negotiator is installed
    pub fn state_cell(&self) -> Arc<NegotiationStateCell> {
        Arc::clone(&self.shared.state)
    }

    pub fn local_hello(&self) -> &HelloMessage {
        &self.shared.local_hello
    }

    /// The pipeline a connection starts with: end-of-message framing, the
    /// hello-aware decoder and this negotiator
    pub fn into_pipeline(self) -> Result<Pipeline> {
        let maximum = self.shared.config.maximum_incoming_chunk_size;
        Pipeline::new()
            .with(names::FRAME_DECODER, Stage::frame_decoder(EomFrameDecoder::new(maximum)))?
            .with(names::MESSAGE_DECODER, Stage::message_decoder(HelloMessageDecoder))?
            .with(names::MESSAGE_ENCODER, Stage::message_encoder(FramedMessageEncoder::end_of_message()))?
            .with(names::NEGOTIATOR, Stage::handler(self))
    }
}

impl ChannelHandler for SessionNegotiator {
    fn handle(&mut self, ctx: &mut HandlerContext<'_>, event: ChannelEvent) -> Option<ChannelEvent> {
        let shared = &self.shared;
        match event {
            ChannelEvent::Active => {
                debug!("Starting session negotiation on {}", ctx.channel());
                shared.start_negotiation(ctx);
                Some(ChannelEvent::Active)
            }
            ChannelEvent::Inbound(inbound) => {
                if shared.state.get() == NegotiationState::Failed {
                    trace!("Dropping {:?} on failed {}", inbound, ctx.channel());
                    return None;
                }
                match inbound {
                    InboundEvent::Hello(hello) => {
                        debug!("Negotiation read invoked on {}", ctx.channel());
                        shared.on_peer_hello(ctx, hello);
                        None
                    }
                    InboundEvent::Message(message) => {
                        let root = message.root_name().unwrap_or("?").to_string();
                        shared.negotiation_failed(
                            ctx,
                            NetconfError::ProtocolViolation(format!(
                                "expected hello, got <{}> during negotiation",
                                root
                            )),
                        );
                        None
                    }
                    // Routed through the exception stage once it is installed
                    InboundEvent::StreamError(error) if shared.state.get() == NegotiationState::OpenWait => {
                        Some(ChannelEvent::Inbound(InboundEvent::StreamError(error)))
                    }
                    InboundEvent::StreamError(error) => {
                        info!("Unexpected error during negotiation on {}: {}", ctx.channel(), error);
                        shared.negotiation_failed(ctx, error);
                        None
                    }
                }
            }
            ChannelEvent::Inactive => {
                shared.negotiation_failed(
                    ctx,
                    NetconfError::ChannelClosed(format!(
                        "{} closed before negotiation completed",
                        ctx.channel()
                    )),
                );
                Some(ChannelEvent::Inactive)
            }
        }
    }
}

/// Tail stage catching errors while negotiation is open
struct NegotiationExceptionHandler {
    shared: Arc<NegotiatorShared>,
}

impl ChannelHandler for NegotiationExceptionHandler {
    fn handle(&mut self, ctx: &mut HandlerContext<'_>, event: ChannelEvent) -> Option<ChannelEvent> {
        match event {
            ChannelEvent::Inbound(InboundEvent::StreamError(error))
                if !self.shared.state.get().is_terminal() =>
            {
                warn!("An error occurred during negotiation on {}: {}", ctx.channel(), error);
                self.shared.negotiation_failed(ctx, error);
                None
            }
            other => Some(other),
        }
    }
}

impl NegotiatorShared {
    fn start_negotiation(self: &Arc<Self>, ctx: &mut HandlerContext<'_>) {
        if self.state.get() != NegotiationState::Idle {
            debug!("Negotiation on {} already started", ctx.channel());
            return;
        }

        let Some(handshake) = ctx.channel().take_security_handshake() else {
            self.start(ctx);
            return;
        };

        debug!("Deferring negotiation on {} until security handshake completes", ctx.channel());
        let shared = Arc::clone(self);
        let channel = ctx.channel().clone();
        tokio::spawn(async move {
            let outcome = handshake.wait().await;
            let scheduled = channel.execute(move |ctx| match outcome {
                Ok(()) => {
                    debug!("Security handshake complete on {}", ctx.channel());
                    shared.start(ctx);
                }
                Err(error) => {
                    warn!("Security handshake on {} failed: {}", ctx.channel(), error);
                    let cause = match error {
                        NetconfError::SecurityHandshake(_) => error,
                        other => NetconfError::SecurityHandshake(other.to_string()),
                    };
                    shared.negotiation_failed(ctx, cause);
                }
            });
            if scheduled.is_err() {
                trace!("{} gone before security handshake completed", channel);
            }
        });
    }

    fn start(self: &Arc<Self>, ctx: &mut HandlerContext<'_>) {
        if self.state.get() != NegotiationState::Idle {
            debug!("Negotiation on {} already started", ctx.channel());
            return;
        }

        debug!("Sending negotiation proposal {} on {}", self.local_hello, ctx.channel());
        let mut hello_write = ctx.write(&self.local_hello.to_message());

        // A write that has already failed ends negotiation before it starts
        if let Some(Err(cause)) = (&mut hello_write).now_or_never() {
            warn!("Failed to send negotiation proposal on {}: {}", ctx.channel(), cause);
            if let Err(e) = self.state.transition(NegotiationState::Idle, NegotiationState::Failed) {
                warn!("{}", e);
            }
            ctx.close();
            self.promise.try_failure(cause);
            return;
        }

        let exception_stage = Stage::handler(NegotiationExceptionHandler {
            shared: Arc::clone(self),
        });
        if let Err(e) = ctx.add_last(names::NEGOTIATION_EXCEPTION_HANDLER, exception_stage) {
            self.negotiation_failed(ctx, e);
            return;
        }

        if let Err(e) = self.state.transition(NegotiationState::Idle, NegotiationState::OpenWait) {
            self.negotiation_failed(ctx, e);
            return;
        }
        debug!("Changed state from IDLE to OPEN_WAIT for {}", ctx.channel());

        let shared = Arc::clone(self);
        self.timer.arm(
            ctx.channel().clone(),
            self.config.negotiation_timeout,
            move |ctx| shared.timeout_expired(ctx),
        );
        debug!("Session negotiation started on {}", ctx.channel());

        let shared = Arc::clone(self);
        let channel = ctx.channel().clone();
        tokio::spawn(async move {
            match hello_write.await {
                Ok(()) => trace!("Hello sent to socket on {}", channel),
                Err(cause) => {
                    info!("Failed to send hello on {}: {}", channel, cause);
                    let detached = Arc::clone(&shared);
                    let fallback = cause.clone();
                    if channel.execute(move |ctx| shared.negotiation_failed(ctx, cause)).is_err() {
                        detached.fail_detached(fallback);
                    }
                }
            }
        });
    }

    fn timeout_expired(&self, ctx: &mut HandlerContext<'_>) {
        if !self.timer.claim_expiry() {
            trace!("Negotiation timer on {} was cancelled", ctx.channel());
            return;
        }

        match self.state.get() {
            NegotiationState::OpenWait => {
                // A cancelled or already resolved attempt is left alone
                if self.promise.is_done() {
                    return;
                }
                warn!(
                    "Session on {} was not established after {:?}",
                    ctx.channel(),
                    self.config.negotiation_timeout
                );
                if let Err(e) = self.state.transition(NegotiationState::OpenWait, NegotiationState::Failed) {
                    warn!("{}", e);
                }
                ctx.close();
                self.promise
                    .try_failure(NetconfError::NegotiationTimeout(self.config.negotiation_timeout));
            }
            NegotiationState::Established if !ctx.is_closing() => {
                match ctx.remove(names::NEGOTIATION_EXCEPTION_HANDLER) {
                    Ok(_) => debug!("Removed negotiation exception stage from {}", ctx.channel()),
                    Err(e) => trace!("{}: {}", ctx.channel(), e),
                }
            }
            _ => {}
        }
    }

    fn on_peer_hello(&self, ctx: &mut HandlerContext<'_>, hello: HelloMessage) {
        debug!("Received {} on {}", hello, ctx.channel());
        match self.establish(ctx, &hello) {
            Ok(session) => self.negotiation_successful(ctx, session),
            Err(e) => {
                debug!("Unexpected error while handling {} on {}: {}", hello, ctx.channel(), e);
                self.negotiation_failed(ctx, e);
            }
        }
    }

    /// Swap framing, build the session and swap the message decoder
    fn establish(&self, ctx: &mut HandlerContext<'_>, hello: &HelloMessage) -> Result<Session> {
        let framing = select_framing(self.local_hello.capabilities(), hello.capabilities());
        if framing == FramingMechanism::Chunked {
            ctx.replace(
                names::FRAME_DECODER,
                names::FRAME_DECODER,
                Stage::frame_decoder(ChunkAggregator::new(self.config.maximum_incoming_chunk_size)),
            )?;
            ctx.replace(
                names::MESSAGE_ENCODER,
                names::MESSAGE_ENCODER,
                Stage::message_encoder(FramedMessageEncoder::chunked(self.config.outgoing_chunk_size)),
            )?;
        }
        debug!("Using {} framing on {}", framing, ctx.channel());

        self.state
            .transition(NegotiationState::OpenWait, NegotiationState::Established)?;
        debug!("Changed state from OPEN_WAIT to ESTABLISHED for {}", ctx.channel());

        let session = self
            .factory
            .create_session(Arc::clone(&self.listener), ctx.channel(), hello, framing)?;

        let replaced = ctx.replace(
            names::MESSAGE_DECODER,
            names::MESSAGE_DECODER,
            Stage::message_decoder(DocumentDecoder),
        )?;
        if replaced.implementation() != Some("hello-message-decoder") {
            return Err(NetconfError::Configuration(format!(
                "pipeline stages misplaced on {}: {:?}",
                ctx.channel(),
                ctx.pipeline()
            )));
        }

        Ok(session)
    }

    fn negotiation_successful(&self, ctx: &mut HandlerContext<'_>, session: Session) {
        info!("Negotiation on {} successful with {}", ctx.channel(), session);
        if let Err(e) = ctx.replace_self(names::SESSION, SessionHandler::new(session.clone())) {
            self.negotiation_failed(ctx, e);
            return;
        }
        session.session_up();
        if !self.promise.try_success(session) {
            debug!("Negotiation promise on {} was already resolved", ctx.channel());
        }
    }

    /// Cancel the timer, fail the state, close the connection and resolve
    /// the promise; only the first resolution takes effect
    fn negotiation_failed(&self, ctx: &mut HandlerContext<'_>, cause: NetconfError) {
        self.timer.cancel();
        if let Some(previous) = self.state.fail_if_pending() {
            debug!("Changed state from {} to FAILED for {}", previous, ctx.channel());
        }
        debug!("Negotiation on {} failed: {}", ctx.channel(), cause);
        ctx.close();
        if !self.promise.try_failure(cause) {
            trace!("Negotiation promise on {} was already resolved", ctx.channel());
        }
    }

    /// Failure path for when the channel is already gone
    fn fail_detached(&self, cause: NetconfError) {
        self.timer.cancel();
        self.state.fail_if_pending();
        self.promise.try_failure(cause);
    }
}
