//! Server configuration
//!
//! Construction-time settings for the listening side.

use serde::Deserialize;
use std::time::Duration;

use crate::protocol::DispatchMode;
use crate::utils::RetryPolicy;

/// Server configuration structure
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Separates commands within one read (e.g. `"\n"`). Empty disables.
    pub command_delimiter: Option<String>,

    /// Separates arguments within one command (e.g. `" "`). Empty disables.
    pub argument_delimiter: Option<String>,

    /// Maximum bytes taken from the socket per read
    pub read_chunk_size: usize,

    /// Keep retrying when the address cannot be bound
    pub retry_address: bool,
    pub retry_interval_ms: u64,

    /// Close each connection after its first dispatched message
    pub auto_disconnect: bool,

    /// Sent to every client on accept. Empty disables.
    pub welcome: String,

    /// Pass the originating connection to the handler
    pub include_client: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1337,
            command_delimiter: None,
            argument_delimiter: None,
            read_chunk_size: 1024,
            retry_address: true,
            retry_interval_ms: 4000,
            auto_disconnect: false,
            welcome: "Valkommen".to_string(),
            include_client: false,
        }
    }
}

impl ServerConfig {
    /// Get host and port as an address string
    pub fn socket_addr_str(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn welcome_bytes(&self) -> Option<&[u8]> {
        Some(self.welcome.as_bytes()).filter(|w| !w.is_empty())
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        if self.include_client {
            DispatchMode::PerClient
        } else {
            DispatchMode::ClientAgnostic
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.retry_interval_ms),
            self.retry_address,
        )
    }

    pub(crate) fn validate(&self) -> Result<(), config::ConfigError> {
        if self.host.is_empty() {
            return Err(config::ConfigError::Message(
                "server host cannot be empty".into(),
            ));
        }

        if self.read_chunk_size == 0 {
            return Err(config::ConfigError::Message(
                "server read_chunk_size must be greater than 0".into(),
            ));
        }

        if self.retry_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "server retry_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.socket_addr_str(), "127.0.0.1:1337");
        assert_eq!(config.read_chunk_size, 1024);
        assert_eq!(config.welcome_bytes(), Some(&b"Valkommen"[..]));
        assert_eq!(config.dispatch_mode(), DispatchMode::ClientAgnostic);
        assert_eq!(config.retry_policy(), RetryPolicy::fixed(Duration::from_secs(4)));
        assert!(!config.auto_disconnect);
    }

    #[test]
    fn test_empty_welcome_is_disabled() {
        let config = ServerConfig {
            welcome: String::new(),
            ..ServerConfig::default()
        };
        assert_eq!(config.welcome_bytes(), None);
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = ServerConfig {
            read_chunk_size: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(ServerConfig::default().validate().is_ok());
    }
}
