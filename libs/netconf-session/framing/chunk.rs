//! Length-chunked framing
//!
//! ```text
//! \n#<len>\n<len bytes>[\n#<len>\n<len bytes>...]\n##\n
//! ```
//!
//! `<len>` is a decimal number without leading zeros.

use crate::traits::{FrameDecoder, NetconfError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// `\n`
    HeaderOne,
    /// `#`
    HeaderTwo,
    /// `[1-9]`
    HeaderLengthFirst,
    /// `[0-9]*\n`
    HeaderLengthOther,
    Data,
    /// `\n`
    FooterOne,
    /// `#`
    FooterTwo,
    /// `#` (end of message) or `[1-9]` (next chunk)
    FooterThree,
    /// `\n`
    FooterFour,
    /// Discarding input until the next `\n`
    MalformedData,
}

enum Step {
    Continue,
    NeedMore,
    Frame(Bytes),
}

/// Frame decoder assembling chunked frames
///
/// Malformed headers or footers raise a recoverable
/// [`NetconfError::MalformedChunk`]; the decoder then skips to the next
/// newline and tries again. Errors are suppressed until a message has been
/// decoded successfully, and while recovering only a message that starts
/// with an RPC header is let through. Chunks or frames above the maximum are
/// fatal.
pub struct ChunkAggregator {
    maximum: usize,
    state: State,
    chunk_size: u64,
    frame: BytesMut,
    propagation_enabled: bool,
}

impl ChunkAggregator {
    pub fn new(maximum: usize) -> Self {
        Self {
            maximum,
            state: State::HeaderOne,
            chunk_size: 0,
            frame: BytesMut::new(),
            propagation_enabled: true,
        }
    }

    pub fn maximum(&self) -> usize {
        self.maximum
    }

    fn malformed(&mut self, message: &str, got: u8) -> NetconfError {
        if self.propagation_enabled {
            warn!(
                "[ChunkAggregator] {} (got byte {:#04x} in state {:?})",
                message, got, self.state
            );
        }
        self.state = State::MalformedData;
        NetconfError::MalformedChunk {
            message: message.to_string(),
            cached: self.frame.len(),
        }
    }

    fn expect(&mut self, got: u8, expected: u8, message: &str) -> Result<()> {
        if got == expected {
            Ok(())
        } else {
            Err(self.malformed(message, got))
        }
    }

    fn check_size(&mut self) -> Result<()> {
        let assembled = self.frame.len() as u64 + self.chunk_size;
        if self.chunk_size > self.maximum as u64 || assembled > self.maximum as u64 {
            self.state = State::MalformedData;
            return Err(NetconfError::FrameTooLarge {
                size: assembled,
                maximum: self.maximum,
            });
        }
        Ok(())
    }

    fn step(&mut self, src: &mut BytesMut) -> Result<Step> {
        if self.state == State::Data {
            let needed = self.chunk_size as usize;
            if src.len() < needed {
                debug!(
                    "[ChunkAggregator] Buffer has {} bytes, need {} to complete chunk",
                    src.len(),
                    needed
                );
                return Ok(Step::NeedMore);
            }
            let data = src.split_to(needed);
            self.frame.extend_from_slice(&data);
            self.state = State::FooterOne;
            return Ok(Step::Continue);
        }

        let byte = src[0];
        let _ = src.split_to(1);

        match self.state {
            State::HeaderOne => {
                self.expect(byte, b'\n', "Malformed chunk header encountered (byte 0)")?;
                self.frame.clear();
                self.state = State::HeaderTwo;
            }
            State::HeaderTwo => {
                self.expect(byte, b'#', "Malformed chunk header encountered (byte 1)")?;
                self.state = State::HeaderLengthFirst;
            }
            State::HeaderLengthFirst => {
                if !(b'1'..=b'9').contains(&byte) {
                    return Err(self.malformed("Invalid chunk size encountered (byte 0)", byte));
                }
                self.chunk_size = u64::from(byte - b'0');
                self.state = State::HeaderLengthOther;
                self.check_size()?;
            }
            State::HeaderLengthOther => {
                if byte == b'\n' {
                    self.state = State::Data;
                } else if byte.is_ascii_digit() {
                    self.chunk_size = self.chunk_size * 10 + u64::from(byte - b'0');
                    self.check_size()?;
                } else {
                    return Err(self.malformed("Invalid chunk size encountered", byte));
                }
            }
            State::FooterOne => {
                self.expect(byte, b'\n', "Malformed chunk footer encountered (byte 0)")?;
                self.chunk_size = 0;
                self.state = State::FooterTwo;
            }
            State::FooterTwo => {
                self.expect(byte, b'#', "Malformed chunk footer encountered (byte 1)")?;
                self.state = State::FooterThree;
            }
            State::FooterThree => {
                if (b'1'..=b'9').contains(&byte) {
                    self.chunk_size = u64::from(byte - b'0');
                    self.state = State::HeaderLengthOther;
                    self.check_size()?;
                } else if byte == b'#' {
                    self.state = State::FooterFour;
                } else {
                    return Err(self.malformed("Malformed chunk footer encountered (byte 2)", byte));
                }
            }
            State::FooterFour => {
                self.expect(byte, b'\n', "Malformed chunk footer encountered (byte 3)")?;
                self.state = State::HeaderOne;
                let frame = self.frame.split().freeze();
                let deliver = self.propagation_enabled || starts_with_rpc_header(&frame);
                self.propagation_enabled = true;
                if deliver {
                    return Ok(Step::Frame(frame));
                }
            }
            State::MalformedData => {
                if byte == b'\n' {
                    self.state = State::HeaderOne;
                }
                self.frame.clear();
            }
            State::Data => unreachable!("handled above"),
        }
        Ok(Step::Continue)
    }
}

/// Check whether a frame starts with an `<rpc ... message-id="...">` header
fn starts_with_rpc_header(frame: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(frame) else {
        return false;
    };
    let Some(rest) = text.trim_start().strip_prefix("<rpc") else {
        return false;
    };
    let header = rest.split('>').next().unwrap_or_default();
    header.contains("message-id=\"")
}

impl FrameDecoder for ChunkAggregator {
    fn name(&self) -> &'static str {
        "chunk-aggregator"
    }
}

impl Decoder for ChunkAggregator {
    type Item = Bytes;
    type Error = NetconfError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        while !src.is_empty() {
            match self.step(src) {
                Ok(Step::Continue) => {}
                Ok(Step::NeedMore) => return Ok(None),
                Ok(Step::Frame(frame)) => return Ok(Some(frame)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if self.propagation_enabled {
                        // Suppressed until the next complete message
                        self.propagation_enabled = false;
                        return Err(e);
                    }
                }
            }
        }
        Ok(None)
    }
}

/// Append `payload` to `dst` as a chunked frame of chunks at most
/// `chunk_size` bytes long
pub fn encode_chunks(payload: &[u8], chunk_size: usize, dst: &mut BytesMut) {
    let chunk_size = chunk_size.max(1);
    for chunk in payload.chunks(chunk_size) {
        dst.put_slice(format!("\n#{}\n", chunk.len()).as_bytes());
        dst.put_slice(chunk);
    }
    dst.put_slice(b"\n##\n");
}
