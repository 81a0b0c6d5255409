//! NETCONF connector - Main Library
//!
//! Wires the session layer to a YAML configuration, logging and the
//! command line binaries.
//!
//! ## Architecture
//!
//! - **netconf_session**: Session establishment (re-exported from workspace)
//! - **config**: Connector configuration loaded from YAML and `.env`
//! - **logging**: Tracing subscriber setup
//! - **bin_common**: Common utilities for binary executables (CLI, runners)
//!
//! ## Usage in Binaries
//!
//! ```rust
//! use netconf_connector::bin_common::{load_config_from_env, CommandLine};
//! use netconf_connector::config::ConnectorConfig;
//! ```

// Re-export workspace libraries for convenience
pub use netconf_session;

pub mod config;
pub mod logging;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;
    pub mod runner;

    pub use cli::{load_config_from_env, CommandLine, ConfigType, UsageError, CONFIG_PATH_ENV};
    pub use runner::{wait_for_shutdown, BinaryRunner, RunConfig};
}
