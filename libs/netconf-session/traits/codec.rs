//! Wire-level stage traits
//!
//! A channel's pipeline holds one frame decoder, one message decoder and one
//! message encoder. Each is a trait object so it can be replaced by name at
//! runtime (framing swap at negotiation, alternate encoding upgrade later).
//! Frame decoders and message encoders are `tokio_util` codecs with a stage
//! name on top.

use crate::message::{HelloMessage, NetconfMessage};
use crate::traits::{NetconfError, Result};
use bytes::Bytes;
use tokio_util::codec::{Decoder, Encoder};

/// Splits the inbound byte stream into complete frames
///
/// [`Decoder::decode`] returns `Err` for malformed or oversize input; see
/// [`NetconfError::is_fatal`] for which errors close the channel.
pub trait FrameDecoder: Decoder<Item = Bytes, Error = NetconfError> + Send + 'static {
    /// Short identifier used in logs and pipeline assertions
    fn name(&self) -> &'static str;
}

/// Result of decoding one frame into a message
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Hello(HelloMessage),
    Message(NetconfMessage),
}

/// Turns one complete frame into a message
pub trait MessageDecoder: Send + 'static {
    fn name(&self) -> &'static str;

    fn decode(&mut self, frame: Bytes) -> Result<DecodedMessage>;
}

/// Serializes and frames one outbound message
pub trait MessageEncoder:
    for<'a> Encoder<&'a NetconfMessage, Error = NetconfError> + Send + 'static
{
    fn name(&self) -> &'static str;
}
