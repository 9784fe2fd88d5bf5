//! Locating the server configuration file

use std::path::PathBuf;

use directories::ProjectDirs;
use pentago_net::{Result, ServerConfig};
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "PENTAGO_CONFIG";

/// `server.toml` in the platform config directory
fn default_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("dev", "pentago", "pentago")?;
    Some(dirs.config_dir().join("server.toml"))
}

/// Load from `PENTAGO_CONFIG`, else the platform config directory, else
/// defaults.
pub fn load() -> Result<ServerConfig> {
    load_from(std::env::var_os(CONFIG_ENV).map(PathBuf::from))
}

/// An explicit path must exist; the platform default may be missing.
fn load_from(explicit: Option<PathBuf>) -> Result<ServerConfig> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "Loading config");
        return ServerConfig::load(&path);
    }
    match default_path() {
        Some(path) => ServerConfig::load_or_default(&path),
        None => Ok(ServerConfig::default()),
    }
}
