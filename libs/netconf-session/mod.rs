//! # netconf-session
//!
//! Session establishment for NETCONF-style management protocols: hello
//! exchange, framing negotiation, timeout-bounded setup and reconnection
//! with backoff.
//!
//! ## Features
//!
//! - **Negotiation state machine**: IDLE, OPEN_WAIT, ESTABLISHED and FAILED,
//!   with exactly-once completion per connection attempt
//! - **Runtime codec hand-off**: the frame decoder and message encoder switch
//!   to chunked framing in place once both peers advertise base 1.1
//! - **Reconnect controller**: exponential backoff with cap, attempt limit
//!   and a deadline per reconnect cycle
//! - **Type-state builder**: connector and listener are required at compile time
//!
//! ## Example
//!
//! ```rust,ignore
//! use netconf_session::*;
//!
//! let controller = netconf_session::builder()
//!     .address("192.0.2.1:830")
//!     .listener(MyListener)
//!     .reconnect_config(ReconnectConfig {
//!         max_connection_attempts: Some(10),
//!         ..Default::default()
//!     })
//!     .start()?;
//!
//! let session = controller.first_session().await?;
//! ```

pub mod traits;
pub mod message;
pub mod framing;
pub mod core;
pub mod reconnect;

// Re-export all traits
pub use traits::*;

// Re-export core functionality
pub use crate::core::{
    builder::{states, ReconnectControllerBuilder},
    channel::{names, Channel, HandlerContext, Pipeline, Stage, StageKind, WriteFuture},
    config::{NegotiatorConfig, ReconnectConfig},
    connector::TcpConnector,
    dispatcher::{ClientDispatcher, ServerDispatcher},
    factory::{ClientSessionFactory, ServerSessionFactory},
    negotiator::{NegotiationState, NegotiationStateCell, SessionNegotiator},
    promise::{CompletionFuture, Promise},
    session::{Session, SessionHandler},
};
pub use framing::{
    select_framing, ChunkAggregator, EomFrameDecoder, FramedMessageEncoder, FramingMechanism,
};
pub use message::{CapabilitySet, HelloMessage, NetconfMessage, BASE_1_0, BASE_1_1};
pub use reconnect::{connect_timeout, BackoffCalculator, BackoffDecision, BackoffState, ReconnectController};

/// Start building a reconnect controller
pub fn builder() -> ReconnectControllerBuilder<states::NoConnector, states::NoListener> {
    ReconnectControllerBuilder::new()
}
