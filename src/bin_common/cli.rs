//! Command line handling for the connector binaries
//!
//! `netconf-monitor [--config <path>] [peer-address]`. An explicit
//! `--config` wins over `NETCONF_CONFIG_PATH`, which wins over the
//! shipped default.

use std::path::PathBuf;
use thiserror::Error;

/// Environment variable naming the connector configuration file
pub const CONFIG_PATH_ENV: &str = "NETCONF_CONFIG_PATH";

/// Where the connector configuration is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigType {
    /// `NETCONF_CONFIG_PATH`, else config/netconf.yaml
    Netconf,
    /// A file named on the command line
    Custom(String),
}

impl ConfigType {
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Netconf => "config/netconf.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Variable that may redirect this source; explicit paths have none
    pub fn env_var_name(&self) -> Option<&'static str> {
        match self {
            ConfigType::Netconf => Some(CONFIG_PATH_ENV),
            ConfigType::Custom(_) => None,
        }
    }
}

/// Resolve the configuration file for `config_type`
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    config_type
        .env_var_name()
        .and_then(|name| std::env::var(name).ok())
        .unwrap_or_else(|| config_type.default_path().to_string())
        .into()
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("{0} expects a value")]
    MissingValue(&'static str),

    #[error("Unknown option {0}")]
    UnknownOption(String),

    #[error("Unexpected argument {0}")]
    UnexpectedArgument(String),
}

/// Parsed command line of a connector binary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// Value of `--config`
    pub config: Option<String>,
    /// Positional `host:port`, overriding the configured peer
    pub peer_address: Option<String>,
}

impl CommandLine {
    /// Parse the arguments after the program name
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--config" || arg == "-c" {
                let path = args.next().ok_or(UsageError::MissingValue("--config"))?;
                parsed.config = Some(path);
            } else if let Some(path) = arg.strip_prefix("--config=") {
                parsed.config = Some(path.to_string());
            } else if arg.starts_with('-') {
                return Err(UsageError::UnknownOption(arg));
            } else if parsed.peer_address.is_none() {
                parsed.peer_address = Some(arg);
            } else {
                return Err(UsageError::UnexpectedArgument(arg));
            }
        }

        Ok(parsed)
    }

    /// Parse `std::env::args()`
    pub fn from_env() -> Result<Self, UsageError> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn config_type(&self) -> ConfigType {
        match &self.config {
            Some(path) => ConfigType::Custom(path.clone()),
            None => ConfigType::Netconf,
        }
    }
}
