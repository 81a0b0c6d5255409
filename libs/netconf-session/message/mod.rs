//! Protocol messages: capability sets, hello messages and data messages

pub mod capability;
pub mod codec;
pub mod document;
pub mod hello;

pub use capability::{CapabilitySet, BASE_1_0, BASE_1_1, BASE_NAMESPACE};
pub use codec::{DocumentDecoder, HelloMessageDecoder};
pub use document::NetconfMessage;
pub use hello::HelloMessage;
