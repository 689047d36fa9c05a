//! Configuration management for websh

mod client;
mod relay;
pub mod serde_utils;

pub use client::{ClientConfig, IceServerConfig};
pub use relay::{RelayConfig, TurnConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("websh")
}

/// Default path of the relay configuration file
pub fn default_relay_config_path() -> PathBuf {
    default_config_dir().join("relay.toml")
}

/// Default path of the client configuration file
pub fn default_client_config_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Load configuration, falling back to defaults when the file is absent
pub fn load_config_or_default<T>(path: &Path) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match load_config(path) {
        Err(ConfigError::NotFound(_)) => Ok(T::default()),
        other => other,
    }
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config::<RelayConfig>(&dir.path().join("relay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));

        let config: RelayConfig = load_config_or_default(&dir.path().join("relay.toml")).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8002");
    }

    #[test]
    fn test_client_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("client.toml");

        let config = ClientConfig {
            target: "srv1".to_string(),
            negotiation_timeout: Some(Duration::from_secs(20)),
            ..Default::default()
        };
        save_config(&path, &config).unwrap();

        let loaded: ClientConfig = load_config(&path).unwrap();
        assert_eq!(loaded.target, "srv1");
        assert_eq!(loaded.negotiation_timeout, Some(Duration::from_secs(20)));
        assert_eq!(loaded.resize_delay, Duration::from_secs(5));
        assert_eq!(loaded.ice_servers, config.ice_servers);
    }

    #[test]
    fn test_relay_config_with_turn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(
            &path,
            "bind_address = \"127.0.0.1:9000\"\n\n[turn]\nsecret = \"s3cret\"\nurls = [\"turn:turn.example.com:3478\"]\n",
        )
        .unwrap();

        let config: RelayConfig = load_config(&path).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        let turn = config.turn.unwrap();
        assert_eq!(turn.secret, "s3cret");
        assert_eq!(turn.ttl, Duration::from_secs(86400));
    }
}
