/// Type-state markers for the reconnect controller builder
///
/// A controller cannot be started until both a transport connector and a
/// session listener have been supplied; these markers enforce that at
/// compile time.

use std::marker::PhantomData;

/// Marker trait for connector state
pub trait ConnectorState {}

/// Connector has not been set
pub struct NoConnector;
impl ConnectorState for NoConnector {}

/// Connector has been set
pub struct HasConnector;
impl ConnectorState for HasConnector {}

/// Marker trait for listener state
pub trait ListenerState {}

/// Listener has not been set
pub struct NoListener;
impl ListenerState for NoListener {}

/// Listener has been set
pub struct HasListener;
impl ListenerState for HasListener {}

/// Phantom marker carrying both states
#[derive(Debug, Clone, Copy)]
pub struct TypeState<C, L> {
    _connector: PhantomData<C>,
    _listener: PhantomData<L>,
}

impl<C, L> TypeState<C, L> {
    pub(crate) fn new() -> Self {
        Self {
            _connector: PhantomData,
            _listener: PhantomData,
        }
    }
}

impl<C, L> Default for TypeState<C, L> {
    fn default() -> Self {
        Self::new()
    }
}
