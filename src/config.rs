//! Configuration management
//!
//! Loads server and client settings from an optional `config.toml` with
//! environment overrides.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::client::ClientConfig;
use crate::server::ServerConfig;

/// Environment prefix; `SIMPLE_SOCKET__SERVER__PORT=9000` overrides `server.port`
pub const ENV_PREFIX: &str = "SIMPLE_SOCKET";

/// Complete configuration: one section per role
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Settings {
    /// Load `config.toml` from the working directory (if present) with
    /// environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from("config")
    }

    /// Load from the given file stem, which may be missing
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validation for all configuration values
    fn validate(&self) -> Result<(), config::ConfigError> {
        self.server.validate()?;
        self.client.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Result<Settings, config::ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = Settings::load_from("no-such-config-file").unwrap();
        assert_eq!(settings.server.read_chunk_size, 1024);
        assert_eq!(settings.client.read_chunk_size, 10124);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let settings = parse(
            r#"
            [server]
            port = 9000
            command_delimiter = "\n"
            auto_disconnect = true

            [client]
            retry_connect = false
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.command_delimiter.as_deref(), Some("\n"));
        assert!(settings.server.auto_disconnect);
        assert_eq!(settings.server.welcome, "Valkommen");
        assert!(!settings.client.retry_connect);
        assert_eq!(settings.client.port, 1337);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = parse(
            r#"
            [server]
            read_chunk_size = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("read_chunk_size"));
    }
}
