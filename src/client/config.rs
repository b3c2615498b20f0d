//! Client configuration
//!
//! Settings for the connecting side.

use serde::Deserialize;
use std::time::Duration;

use crate::utils::RetryPolicy;

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,

    /// Maximum bytes taken from the socket per read
    pub read_chunk_size: usize,

    /// Keep retrying while the server refuses connections
    pub retry_connect: bool,
    pub retry_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1337,
            read_chunk_size: 10124,
            retry_connect: true,
            retry_interval_ms: 4000,
        }
    }
}

impl ClientConfig {
    /// Get target host and port as an address string
    pub fn socket_addr_str(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry_interval_ms),
            self.retry_connect,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), config::ConfigError> {
        if self.host.is_empty() {
            return Err(config::ConfigError::Message(
                "client host cannot be empty".into(),
            ));
        }

        if self.read_chunk_size == 0 {
            return Err(config::ConfigError::Message(
                "client read_chunk_size must be greater than 0".into(),
            ));
        }

        if self.retry_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "client retry_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
