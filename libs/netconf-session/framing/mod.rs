//! Wire framing: end-of-message delimited and length-chunked frames
//!
//! Which mechanism a connection uses is decided once, from the two hello
//! messages, and never changes afterwards.

pub mod chunk;
pub mod encoder;
pub mod eom;

pub use chunk::ChunkAggregator;
pub use encoder::FramedMessageEncoder;
pub use eom::EomFrameDecoder;

use crate::message::CapabilitySet;
use std::fmt;

/// Terminator of an end-of-message framed document
pub const END_OF_MESSAGE: &[u8] = b"]]>]]>";

/// Default upper bound on the assembled size of an incoming frame (16 MiB)
pub const DEFAULT_MAXIMUM_INCOMING_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Default size of the chunks an outgoing document is split into
pub const DEFAULT_OUTGOING_CHUNK_SIZE: usize = 8192;

/// How one message is delimited from the next on the byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FramingMechanism {
    /// Documents terminated by `]]>]]>`
    EndOfMessage,
    /// Documents split into `\n#<len>\n` chunks, terminated by `\n##\n`
    Chunked,
}

impl fmt::Display for FramingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingMechanism::EndOfMessage => write!(f, "EOM"),
            FramingMechanism::Chunked => write!(f, "CHUNK"),
        }
    }
}

/// Choose the framing mechanism for a connection
///
/// Chunked framing is used iff both sides advertise base 1.1.
pub fn select_framing(local: &CapabilitySet, remote: &CapabilitySet) -> FramingMechanism {
    if local.supports_chunked_framing() && remote.supports_chunked_framing() {
        FramingMechanism::Chunked
    } else {
        FramingMechanism::EndOfMessage
    }
}
