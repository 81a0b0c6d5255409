use crate::core::channel::HandlerContext;
use crate::traits::NetconfError;
use crate::message::{HelloMessage, NetconfMessage};

/// Inbound traffic delivered to handler stages after decoding
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// A decoded hello message
    Hello(HelloMessage),
    /// A decoded data message
    Message(NetconfMessage),
    /// A decoding or processing error raised upstream
    StreamError(NetconfError),
}

/// Events dispatched through the handler stages of a channel
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel is live and the pipeline installed
    Active,
    Inbound(InboundEvent),
    /// The channel has closed; no more events follow
    Inactive,
}

/// A named handler stage in a channel pipeline
///
/// Handlers run on the channel's own execution context, one event at a time.
/// A handler may replace or remove itself through the context while handling
/// an event; the change takes effect before the next frame is decoded.
pub trait ChannelHandler: Send + 'static {
    /// Handle an event
    ///
    /// # Returns
    /// * `None` - The event was consumed
    /// * `Some(event)` - Forward the event to the next handler stage
    fn handle(&mut self, ctx: &mut HandlerContext<'_>, event: ChannelEvent) -> Option<ChannelEvent>;
}
