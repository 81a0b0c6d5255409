use super::chunk::encode_chunks;
use super::{FramingMechanism, DEFAULT_OUTGOING_CHUNK_SIZE, END_OF_MESSAGE};
use crate::message::NetconfMessage;
use crate::traits::{MessageEncoder, NetconfError, Result};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

/// Document encoder writing messages in one of the two framing mechanisms
pub struct FramedMessageEncoder {
    framing: FramingMechanism,
    chunk_size: usize,
}

impl FramedMessageEncoder {
    /// Encoder used for the hello exchange and by base 1.0 sessions
    pub fn end_of_message() -> Self {
        Self {
            framing: FramingMechanism::EndOfMessage,
            chunk_size: DEFAULT_OUTGOING_CHUNK_SIZE,
        }
    }

    /// Encoder splitting documents into chunks of at most `chunk_size` bytes
    pub fn chunked(chunk_size: usize) -> Self {
        Self {
            framing: FramingMechanism::Chunked,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn for_framing(framing: FramingMechanism, chunk_size: usize) -> Self {
        match framing {
            FramingMechanism::EndOfMessage => Self::end_of_message(),
            FramingMechanism::Chunked => Self::chunked(chunk_size),
        }
    }

    pub fn framing(&self) -> FramingMechanism {
        self.framing
    }
}

impl MessageEncoder for FramedMessageEncoder {
    fn name(&self) -> &'static str {
        match self.framing {
            FramingMechanism::EndOfMessage => "eom-message-encoder",
            FramingMechanism::Chunked => "chunked-message-encoder",
        }
    }
}

impl<'a> Encoder<&'a NetconfMessage> for FramedMessageEncoder {
    type Error = NetconfError;

    fn encode(&mut self, message: &'a NetconfMessage, dst: &mut BytesMut) -> Result<()> {
        let payload = message.document().as_bytes();
        match self.framing {
            FramingMechanism::EndOfMessage => {
                dst.reserve(payload.len() + END_OF_MESSAGE.len());
                dst.put_slice(payload);
                dst.put_slice(END_OF_MESSAGE);
            }
            FramingMechanism::Chunked => encode_chunks(payload, self.chunk_size, dst),
        }
        Ok(())
    }
}
