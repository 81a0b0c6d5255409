use std::time::Duration;
use thiserror::Error;

/// Main error type for netconf-session
///
/// Errors are `Clone` so that one cause can resolve both the per-attempt
/// completion handle and the reconnect controller's first-session handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetconfError {
    /// Transport-level failure (connect refused, I/O error on the stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The channel was closed before the operation could complete
    #[error("Channel closed: {0}")]
    ChannelClosed(String),

    /// The security handshake (e.g. TLS) preceding negotiation failed
    #[error("Security handshake failed: {0}")]
    SecurityHandshake(String),

    /// The peer violated the protocol (unexpected message, bad hello)
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// A document could not be parsed
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A chunk header or footer was malformed; the decoder resynchronises
    #[error("Malformed chunk: {message} ({cached} bytes cached)")]
    MalformedChunk { message: String, cached: usize },

    /// An incoming frame exceeded the configured maximum size
    #[error("Frame of {size} bytes exceeds maximum of {maximum} bytes")]
    FrameTooLarge { size: u64, maximum: usize },

    /// The negotiation was not completed within the configured timeout
    #[error("Session was not established after {0:?}")]
    NegotiationTimeout(Duration),

    /// The configured maximum number of connection attempts was reached
    #[error("Given up connecting after {attempts} attempts")]
    ConnectionAttemptsExhausted { attempts: u64 },

    /// The reconnect deadline has already passed
    #[error("Connection deadline has passed")]
    DeadlinePassed,

    /// Sleeping for the next delay would cross the reconnect deadline
    #[error("Next attempt in {delay:?} would cross the connection deadline")]
    DeadlineWouldBeCrossed { delay: Duration },

    /// Illegal state transition requested (programming error)
    #[error("Expected state {expected} does not match actual {actual}, cannot transition to {target}")]
    InvalidStateTransition {
        expected: String,
        actual: String,
        target: String,
    },

    /// A pipeline stage with the requested name does not exist
    #[error("No pipeline stage named '{0}'")]
    NoSuchStage(String),

    /// The operation was cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// A deferred encoder replacement is already waiting for the next message
    #[error("An encoder replacement is already pending")]
    EncoderReplacementPending,

    /// The session factory rejected the peer hello
    #[error("Session rejected: {0}")]
    SessionRejected(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl NetconfError {
    /// Fatal stream errors close the channel after being reported
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetconfError::FrameTooLarge { .. }
                | NetconfError::Transport(_)
                | NetconfError::NoSuchStage(_)
        )
    }

    /// Check if this error is the negotiation timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, NetconfError::NegotiationTimeout(_))
    }

    /// Check if this error is a backoff give-up cause
    pub fn is_give_up(&self) -> bool {
        matches!(
            self,
            NetconfError::ConnectionAttemptsExhausted { .. }
                | NetconfError::DeadlinePassed
                | NetconfError::DeadlineWouldBeCrossed { .. }
        )
    }
}

impl From<std::io::Error> for NetconfError {
    fn from(e: std::io::Error) -> Self {
        NetconfError::Transport(e.to_string())
    }
}

/// Result type for netconf-session operations
pub type Result<T> = std::result::Result<T, NetconfError>;
