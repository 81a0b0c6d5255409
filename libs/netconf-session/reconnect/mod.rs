//! Reconnection with backoff
//!
//! - [`BackoffCalculator`]: pure retry-delay computation with cap, attempt
//!   limit and deadline
//! - [`ReconnectController`]: keeps a client session to one peer alive

pub mod backoff;
pub mod controller;

pub use backoff::{connect_timeout, BackoffCalculator, BackoffDecision, BackoffState};
pub use controller::ReconnectController;
