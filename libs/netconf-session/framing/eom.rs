use super::END_OF_MESSAGE;
use crate::traits::{FrameDecoder, NetconfError, Result};
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;

/// Frame decoder for `]]>]]>` delimited documents
///
/// Bounded by a maximum frame size; input that cannot fit a frame within the
/// bound is rejected as [`NetconfError::FrameTooLarge`].
pub struct EomFrameDecoder {
    maximum: usize,
    /// Bytes already searched without finding the marker
    scanned: usize,
}

impl EomFrameDecoder {
    pub fn new(maximum: usize) -> Self {
        Self {
            maximum,
            scanned: 0,
        }
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }
}

fn find_marker(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(END_OF_MESSAGE.len())
        .position(|window| window == END_OF_MESSAGE)
}

impl FrameDecoder for EomFrameDecoder {
    fn name(&self) -> &'static str {
        "eom-frame-decoder"
    }
}

impl Decoder for EomFrameDecoder {
    type Item = Bytes;
    type Error = NetconfError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            let start = self.scanned.saturating_sub(END_OF_MESSAGE.len() - 1);
            let Some(offset) = find_marker(&src[start..]) else {
                self.scanned = src.len();
                if src.len() > self.maximum + END_OF_MESSAGE.len() - 1 {
                    return Err(NetconfError::FrameTooLarge {
                        size: src.len() as u64,
                        maximum: self.maximum,
                    });
                }
                return Ok(None);
            };

            let end = start + offset;
            self.scanned = 0;
            if end > self.maximum {
                return Err(NetconfError::FrameTooLarge {
                    size: end as u64,
                    maximum: self.maximum,
                });
            }

            let frame = src.split_to(end).freeze();
            src.advance(END_OF_MESSAGE.len());

            // Whitespace between documents is not a frame
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(frame));
        }
    }
}
