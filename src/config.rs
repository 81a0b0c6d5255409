//! Connector configuration
//!
//! Loaded from YAML; the peer address can be overridden from the
//! environment (or a `.env` file) with `NETCONF_PEER_ADDRESS`.

use netconf_session::{CapabilitySet, NegotiatorConfig, ReconnectConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding [`ConnectorConfig::peer_address`]
pub const PEER_ADDRESS_ENV: &str = "NETCONF_PEER_ADDRESS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration of one managed peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// `host:port` of the peer
    #[serde(default)]
    pub peer_address: String,
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Capabilities advertised in our hello; base 1.0 and 1.1 when empty
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub negotiator: NegotiatorConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ConnectorConfig {
    /// Load configuration from a YAML file and `.env`
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config = Self::parse(&yaml_content)?;

        // Don't fail if .env doesn't exist
        dotenv::dotenv().ok();

        if let Ok(address) = std::env::var(PEER_ADDRESS_ENV) {
            info!("Overriding peer address from environment variable");
            config.peer_address = address;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation
    pub fn parse(yaml_content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml_content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.peer_address.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "peer_address cannot be empty (set it in the file or via {})",
                PEER_ADDRESS_ENV
            )));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }
        self.negotiator
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.reconnect
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        Ok(())
    }

    /// Capabilities to advertise
    pub fn capability_set(&self) -> CapabilitySet {
        if self.capabilities.is_empty() {
            CapabilitySet::base()
        } else {
            CapabilitySet::new(self.capabilities.iter().cloned())
        }
    }

    /// Log configuration summary
    pub fn log(&self) {
        info!("Configuration loaded:");
        info!("  Peer address: {}", self.peer_address);
        info!("  Capabilities: {}", self.capability_set());
        info!(
            "  Negotiation timeout: {:?}",
            self.negotiator.negotiation_timeout
        );
        info!(
            "  Reconnect: {:?} between attempts, factor {}, max delay {:?}, max attempts {:?}",
            self.reconnect.between_attempts_timeout,
            self.reconnect.sleep_factor,
            self.reconnect.max_delay,
            self.reconnect.max_connection_attempts
        );
        info!("  Log level: {}", self.log_level);
    }
}
