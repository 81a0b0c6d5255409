use crate::framing::{DEFAULT_MAXIMUM_INCOMING_CHUNK_SIZE, DEFAULT_OUTGOING_CHUNK_SIZE};
use crate::traits::{NetconfError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-connection negotiation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiatorConfig {
    /// How long to wait for the peer hello after sending ours
    #[serde(rename = "negotiation_timeout_ms", with = "duration_millis")]
    pub negotiation_timeout: Duration,

    /// Upper bound on the assembled size of an incoming frame
    pub maximum_incoming_chunk_size: usize,

    /// Size of the chunks outgoing documents are split into
    pub outgoing_chunk_size: usize,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_millis(20_000),
            maximum_incoming_chunk_size: DEFAULT_MAXIMUM_INCOMING_CHUNK_SIZE,
            outgoing_chunk_size: DEFAULT_OUTGOING_CHUNK_SIZE,
        }
    }
}

impl NegotiatorConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.maximum_incoming_chunk_size == 0 {
            return Err(NetconfError::Configuration(
                "maximum_incoming_chunk_size must be positive".into(),
            ));
        }
        if self.outgoing_chunk_size == 0 {
            return Err(NetconfError::Configuration(
                "outgoing_chunk_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Reconnection settings for one peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay before the first retry
    #[serde(rename = "between_attempts_timeout_ms", with = "duration_millis")]
    pub between_attempts_timeout: Duration,

    /// Multiplier applied to the previous delay for each further retry
    pub sleep_factor: f64,

    /// Cap on the retry delay
    #[serde(rename = "max_delay_ms", with = "option_duration_millis")]
    pub max_delay: Option<Duration>,

    /// Give up after this many attempts; unlimited when unset
    pub max_connection_attempts: Option<u64>,

    /// Timeout of a single connect
    #[serde(rename = "connect_timeout_ms", with = "duration_millis")]
    pub connect_timeout: Duration,

    /// Give up once this much time has passed since the controller started
    #[serde(rename = "deadline_ms", with = "option_duration_millis")]
    pub deadline: Option<Duration>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            between_attempts_timeout: Duration::from_millis(2_000),
            sleep_factor: 1.5,
            max_delay: None,
            max_connection_attempts: None,
            connect_timeout: Duration::from_millis(20_000),
            deadline: None,
        }
    }
}

impl ReconnectConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.sleep_factor.is_finite() || self.sleep_factor < 1.0 {
            return Err(NetconfError::Configuration(format!(
                "sleep_factor must be at least 1.0, got {}",
                self.sleep_factor
            )));
        }
        if let Some(max) = self.max_delay {
            if max < self.between_attempts_timeout {
                return Err(NetconfError::Configuration(format!(
                    "max_delay {:?} is below between_attempts_timeout {:?}",
                    max, self.between_attempts_timeout
                )));
            }
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
