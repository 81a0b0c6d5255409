//! Integration test: Configuration utilities
//!
//! Tests the bin_common path lookup and loading the connector configuration
//! from YAML files.

use netconf_connector::bin_common::{load_config_from_env, CommandLine, ConfigType, CONFIG_PATH_ENV};
use netconf_connector::config::{ConfigError, ConnectorConfig, PEER_ADDRESS_ENV};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

fn write_temp_config(name: &str, contents: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("netconf-{}-{}.yaml", std::process::id(), name));
    std::fs::write(&path, contents).unwrap();
    path
}

// Every test touching NETCONF_CONFIG_PATH lives here so none observes
// another's value.
#[test]
fn test_config_path_resolution() {
    env::remove_var(CONFIG_PATH_ENV);
    let config_path = load_config_from_env(ConfigType::Netconf);
    assert_eq!(config_path.to_str().unwrap(), "config/netconf.yaml");

    env::set_var(CONFIG_PATH_ENV, "from/env.yaml");
    assert_eq!(
        load_config_from_env(ConfigType::Netconf).to_str().unwrap(),
        "from/env.yaml"
    );

    // An explicit --config wins over the environment
    let custom = ConfigType::Custom("custom/path.yaml".to_string());
    assert_eq!(load_config_from_env(custom).to_str().unwrap(), "custom/path.yaml");
    env::remove_var(CONFIG_PATH_ENV);
}

#[test]
fn test_config_flag_selects_file() {
    let path = write_temp_config(
        "flag",
        r#"
peer_address: "203.0.113.5:830"
"#,
    );

    let cli = CommandLine::parse(["--config".to_string(), path.display().to_string()]).unwrap();
    let resolved = load_config_from_env(cli.config_type());
    assert_eq!(resolved, path);

    let config = ConnectorConfig::load(&resolved).unwrap();
    assert!(config.peer_address.ends_with(":830"));
    assert!(cli.peer_address.is_none());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_shipped_config_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config/netconf.yaml");
    let yaml = std::fs::read_to_string(path).unwrap();
    let config = ConnectorConfig::parse(&yaml).unwrap();

    assert!(config.validate().is_ok());
    assert!(config.capability_set().supports_chunked_framing());
    assert_eq!(config.reconnect.max_delay, Some(Duration::from_secs(60)));
}

// File loading and the environment override share one test so that the
// process-wide variable is never observed by a concurrent test.
#[test]
fn test_load_from_file_and_environment() {
    let path = write_temp_config(
        "load",
        r#"
peer_address: "192.0.2.10:830"
log_level: debug
capabilities:
  - "urn:ietf:params:netconf:base:1.0"
reconnect:
  between_attempts_timeout_ms: 500
  sleep_factor: 2.0
"#,
    );

    env::remove_var(PEER_ADDRESS_ENV);
    let config = ConnectorConfig::load(&path).unwrap();
    assert_eq!(config.peer_address, "192.0.2.10:830");
    assert_eq!(config.log_level, "debug");
    assert!(!config.capability_set().supports_chunked_framing());
    assert_eq!(
        config.reconnect.between_attempts_timeout,
        Duration::from_millis(500)
    );

    env::set_var(PEER_ADDRESS_ENV, "198.51.100.7:830");
    let overridden = ConnectorConfig::load(&path).unwrap();
    env::remove_var(PEER_ADDRESS_ENV);
    assert_eq!(overridden.peer_address, "198.51.100.7:830");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file_is_a_file_error() {
    let result = ConnectorConfig::load("does/not/exist.yaml");
    assert!(matches!(result, Err(ConfigError::FileError(_))));
}

#[test]
fn test_malformed_yaml_is_a_yaml_error() {
    let result = ConnectorConfig::parse("reconnect: [not, a, map");
    assert!(matches!(result, Err(ConfigError::YamlError(_))));
}
