//! Lifecycle of a long-running connector binary
//!
//! A binary implements [`BinaryRunner`]; `execute` logs start and stop
//! around its main loop and reports how it ended.

use std::time::Duration;
use tracing::{info, warn};

/// Settings shared by every long-running binary
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name used in lifecycle logs
    pub name: String,
    /// How often the main loop reports its status
    pub heartbeat_interval: Duration,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval: Duration::from_secs(300),
        }
    }

    pub fn with_heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }
}

pub trait BinaryRunner {
    /// Main loop; returns when asked to stop or when there is nothing left to do
    async fn run(&mut self) -> anyhow::Result<()>;

    fn config(&self) -> &RunConfig;

    /// One line describing what the run achieved, logged on exit
    fn summary(&self) -> Option<String> {
        None
    }

    async fn execute(&mut self) -> anyhow::Result<()> {
        let name = self.config().name.clone();
        info!("========================================");
        info!("Starting {} (Ctrl+C to stop)", name);
        info!("========================================");

        let result = self.run().await;

        match &result {
            Ok(()) => info!("{} stopped", name),
            Err(e) => warn!("{} stopped with error: {}", name, e),
        }
        if let Some(summary) = self.summary() {
            info!("{}", summary);
        }
        result
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = ctrl_c() => {}
                    _ = terminate.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!("Failed to listen for SIGTERM: {}", e),
        }
    }
    ctrl_c().await;
}

async fn ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
