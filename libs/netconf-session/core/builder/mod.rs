pub mod states;

use crate::core::config::{NegotiatorConfig, ReconnectConfig};
use crate::core::connector::TcpConnector;
use crate::core::dispatcher::ClientDispatcher;
use crate::message::CapabilitySet;
use crate::reconnect::ReconnectController;
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`ReconnectController`]
///
/// A connector (or address) and a session listener must be set before the
/// controller can be started. Everything else has defaults: base 1.0 and
/// 1.1 capabilities, [`NegotiatorConfig::default`] and
/// [`ReconnectConfig::default`].
pub struct ReconnectControllerBuilder<C, L>
where
    C: ConnectorState,
    L: ListenerState,
{
    _state: TypeState<C, L>,
    connector: Option<Arc<dyn TransportConnector>>,
    listener: Option<Arc<dyn SessionListener>>,
    capabilities: CapabilitySet,
    negotiator: NegotiatorConfig,
    reconnect: ReconnectConfig,
}

impl ReconnectControllerBuilder<NoConnector, NoListener> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            connector: None,
            listener: None,
            capabilities: CapabilitySet::base(),
            negotiator: NegotiatorConfig::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl Default for ReconnectControllerBuilder<NoConnector, NoListener> {
    fn default() -> Self {
        Self::new()
    }
}

// Connector setting
impl<L> ReconnectControllerBuilder<NoConnector, L>
where
    L: ListenerState,
{
    pub fn connector(
        self,
        connector: impl TransportConnector,
    ) -> ReconnectControllerBuilder<HasConnector, L> {
        self.shared_connector(Arc::new(connector))
    }

    pub fn shared_connector(
        self,
        connector: Arc<dyn TransportConnector>,
    ) -> ReconnectControllerBuilder<HasConnector, L> {
        ReconnectControllerBuilder {
            _state: TypeState::new(),
            connector: Some(connector),
            listener: self.listener,
            capabilities: self.capabilities,
            negotiator: self.negotiator,
            reconnect: self.reconnect,
        }
    }

    /// Connect over plain TCP
    pub fn address(self, address: impl Into<String>) -> ReconnectControllerBuilder<HasConnector, L> {
        self.connector(TcpConnector::new(address))
    }
}

// Listener setting
impl<C> ReconnectControllerBuilder<C, NoListener>
where
    C: ConnectorState,
{
    pub fn listener(self, listener: impl SessionListener) -> ReconnectControllerBuilder<C, HasListener> {
        self.shared_listener(Arc::new(listener))
    }

    pub fn shared_listener(
        self,
        listener: Arc<dyn SessionListener>,
    ) -> ReconnectControllerBuilder<C, HasListener> {
        ReconnectControllerBuilder {
            _state: TypeState::new(),
            connector: self.connector,
            listener: Some(listener),
            capabilities: self.capabilities,
            negotiator: self.negotiator,
            reconnect: self.reconnect,
        }
    }
}

// Optional settings, available in any state
impl<C, L> ReconnectControllerBuilder<C, L>
where
    C: ConnectorState,
    L: ListenerState,
{
    /// Capabilities advertised in our hello
    pub fn capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn negotiator_config(mut self, config: NegotiatorConfig) -> Self {
        self.negotiator = config;
        self
    }

    pub fn negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiator.negotiation_timeout = timeout;
        self
    }

    pub fn reconnect_config(mut self, config: ReconnectConfig) -> Self {
        self.reconnect = config;
        self
    }
}

impl ReconnectControllerBuilder<HasConnector, HasListener> {
    /// Build the single-attempt dispatcher without starting a controller
    pub fn build_dispatcher(self) -> Result<ClientDispatcher> {
        let connector = self
            .connector
            .ok_or_else(|| NetconfError::Configuration("connector not set".into()))?;
        let listener = self
            .listener
            .ok_or_else(|| NetconfError::Configuration("listener not set".into()))?;
        ClientDispatcher::new(connector, self.capabilities, listener, self.negotiator)
    }

    /// Start the reconnect loop
    pub fn start(self) -> Result<ReconnectController> {
        let reconnect = self.reconnect.clone();
        let dispatcher = self.build_dispatcher()?;
        ReconnectController::start(dispatcher, reconnect)
    }
}
