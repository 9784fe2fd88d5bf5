//! Server configuration, loadable from TOML

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::protocol::{Expansion, DELIMITER};
use crate::DEFAULT_PORT;

/// Server settings. Every field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listening port; 0 picks an ephemeral port
    pub port: u16,
    pub bind: IpAddr,
    /// Sent to clients in the HELLO reply
    pub description: String,
    /// Advertised expansions
    pub expansions: Vec<Expansion>,
    /// Filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            description: "Pentago server".to_string(),
            expansions: Vec::new(),
            log_filter: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Parse TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ServerConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load a TOML file, falling back to defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.description.contains(DELIMITER) || self.description.contains('\n') {
            return Err(Error::Config(format!(
                "description must not contain {DELIMITER:?} or a line break"
            )));
        }
        Ok(())
    }

    /// Address to bind the listener to
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uses_defaults() {
        let config = ServerConfig::from_toml("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 7331);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:7331");
    }

    #[test]
    fn test_partial_override() {
        let config = ServerConfig::from_toml(
            r#"
            port = 0
            bind = "127.0.0.1"
            expansions = ["CHAT", "RANK"]
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 0);
        assert_eq!(config.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.expansions, vec![Expansion::Chat, Expansion::Rank]);
        assert_eq!(config.description, "Pentago server");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ServerConfig::from_toml("port = \"seven\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml("expansions = [\"TELEPORT\"]"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            ServerConfig::from_toml("description = \"a~b\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = Path::new("/nonexistent/pentago/server.toml");
        assert!(ServerConfig::load(path).is_err());
        assert_eq!(
            ServerConfig::load_or_default(path).unwrap(),
            ServerConfig::default()
        );
    }
}
