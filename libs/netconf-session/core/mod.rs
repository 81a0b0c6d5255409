//! # Session Core
//!
//! Connection plumbing and the negotiation that turns a byte stream into a
//! session.
//!
//! ## Example
//!
//! ```rust,ignore
//! use netconf_session::core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let controller = netconf_session::builder()
//!         .address("192.0.2.1:830")
//!         .listener(MyListener)
//!         .negotiation_timeout(Duration::from_secs(10))
//!         .start()?;
//!
//!     let session = controller.first_session().await?;
//!     println!("Negotiated {} with {}", session.framing(), session.channel().peer());
//!
//!     session.send(NetconfMessage::new(GET_CONFIG)).await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod channel;
pub mod config;
pub mod connector;
pub mod dispatcher;
pub mod factory;
pub mod negotiator;
pub mod promise;
pub mod session;

// Re-export main types
pub use builder::{states, ReconnectControllerBuilder};
pub use channel::{names, Channel, HandlerContext, Pipeline, Stage, StageKind, WriteFuture};
pub use config::{NegotiatorConfig, ReconnectConfig};
pub use connector::TcpConnector;
pub use dispatcher::{ClientDispatcher, ServerDispatcher};
pub use factory::{ClientSessionFactory, ServerSessionFactory};
pub use negotiator::{NegotiationState, NegotiationStateCell, SessionNegotiator};
pub use promise::{CompletionFuture, Promise};
pub use session::{Session, SessionHandler};

// Re-export traits for convenience
pub use crate::traits::*;
