//! Keeps a NETCONF session to one peer alive and logs what happens on it.
//!
//! Usage: `netconf-monitor [--config <path>] [peer-address]`. The address
//! argument takes precedence over the configuration file.

use anyhow::{Context, Result};
use netconf_connector::bin_common::{
    load_config_from_env, wait_for_shutdown, BinaryRunner, CommandLine, RunConfig,
};
use netconf_connector::config::ConnectorConfig;
use netconf_connector::logging::init_tracing;
use netconf_connector::netconf_session::{
    self, NetconfError, NetconfMessage, ReconnectController, Session, SessionListener,
    TerminationReason,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct MonitorListener {
    sessions: AtomicU64,
    messages: AtomicU64,
}

impl SessionListener for MonitorListener {
    fn on_session_up(&self, session: &Session) {
        self.sessions.fetch_add(1, Ordering::Relaxed);
        info!(
            "[Monitor] {} up with {} framing",
            session,
            session.framing()
        );
        for capability in session.peer_capabilities().iter() {
            info!("[Monitor]   peer capability: {}", capability);
        }
    }

    fn on_session_down(&self, session: &Session, cause: &NetconfError) {
        warn!("[Monitor] {} down: {}", session, cause);
    }

    fn on_session_terminated(&self, session: &Session, reason: &TerminationReason) {
        info!("[Monitor] {} terminated: {}", session, reason);
    }

    fn on_message(&self, session: &Session, message: NetconfMessage) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        debug!("[Monitor] {} received: {}", session, message);
    }

    fn on_error(&self, session: &Session, error: &NetconfError) {
        warn!("[Monitor] {} reported: {}", session, error);
    }
}

struct MonitorApp {
    run_config: RunConfig,
    connector: ConnectorConfig,
    listener: Arc<MonitorListener>,
}

impl BinaryRunner for MonitorApp {
    async fn run(&mut self) -> Result<()> {
        let controller = netconf_session::builder()
            .address(self.connector.peer_address.clone())
            .shared_listener(Arc::clone(&self.listener) as Arc<dyn SessionListener>)
            .capabilities(self.connector.capability_set())
            .negotiator_config(self.connector.negotiator.clone())
            .reconnect_config(self.connector.reconnect.clone())
            .start()?;

        let result = self.supervise(&controller).await;
        controller.cancel();
        result
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }

    fn summary(&self) -> Option<String> {
        Some(format!(
            "{} sessions established, {} messages received",
            self.listener.sessions.load(Ordering::Relaxed),
            self.listener.messages.load(Ordering::Relaxed)
        ))
    }
}

impl MonitorApp {
    async fn supervise(&self, controller: &ReconnectController) -> Result<()> {
        let mut heartbeat = tokio::time::interval(self.run_config.heartbeat_interval);
        heartbeat.tick().await;
        let shutdown = wait_for_shutdown();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => return Ok(()),
                outcome = controller.reconnect_future().future() => {
                    return match outcome {
                        Err(NetconfError::Cancelled) | Ok(()) => Ok(()),
                        Err(cause) => Err(cause.into()),
                    };
                }
                _ = heartbeat.tick() => match controller.current_session() {
                    Some(session) => info!("Heartbeat: {} is up", session),
                    None => info!(
                        "Heartbeat: no session to {}, {} attempts since last success",
                        self.connector.peer_address,
                        controller.attempts()
                    ),
                },
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CommandLine::from_env()?;

    // Load config first (before logging is initialized)
    let config_path = load_config_from_env(cli.config_type());
    let mut connector = ConnectorConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(address) = cli.peer_address {
        connector.peer_address = address;
    }

    init_tracing(&connector.log_level);
    info!("Configuration from {}", config_path.display());
    connector.log();

    let mut app = MonitorApp {
        run_config: RunConfig::new("NETCONF Monitor").with_heartbeat(Duration::from_secs(60)),
        connector,
        listener: Arc::new(MonitorListener::default()),
    };
    app.execute().await
}
