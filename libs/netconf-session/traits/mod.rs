//! # Session Traits
//!
//! Core traits and types shared by every layer of the session library:
//!
//! - **NetconfError**: error taxonomy for transport, protocol, timeout and give-up failures
//! - **FrameDecoder / MessageDecoder / MessageEncoder**: replaceable wire stages
//! - **ChannelHandler**: handler stages receiving channel events
//! - **SessionListener**: consumer of established sessions
//! - **SessionFactory**: builds the session object at negotiation success
//! - **TransportConnector**: produces byte streams to a peer
//!
//! ## Example
//!
//! ```rust,ignore
//! use netconf_session::traits::*;
//!
//! struct Printer;
//!
//! impl SessionListener for Printer {
//!     fn on_session_down(&self, _: &Session, cause: &NetconfError) {
//!         println!("down: {}", cause);
//!     }
//!     fn on_session_terminated(&self, _: &Session, reason: &TerminationReason) {
//!         println!("terminated: {}", reason);
//!     }
//!     fn on_message(&self, _: &Session, message: NetconfMessage) {
//!         println!("{}", message);
//!     }
//! }
//! ```

pub mod codec;
pub mod connector;
pub mod error;
pub mod factory;
pub mod handler;
pub mod listener;

// Re-export commonly used types
pub use codec::{DecodedMessage, FrameDecoder, MessageDecoder, MessageEncoder};
pub use connector::{AsyncStream, SecurityHandshake, TransportConnector, TransportStream};
pub use error::{NetconfError, Result};
pub use factory::SessionFactory;
pub use handler::{ChannelEvent, ChannelHandler, InboundEvent};
pub use listener::{NoOpListener, SessionListener, TerminationReason};
