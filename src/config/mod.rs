//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::models::Identity;

/// Hosted service endpoint used when none is configured.
const DEFAULT_SERVER: &str = "https://api.unsaidthoughts.com";

/// Which backend the client runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// The deployed service over HTTP + WebSocket.
    #[default]
    Remote,
    /// In-process sandbox; nothing survives exit.
    Memory,
}

/// Session persisted between runs (remote backend only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub token: String,
    pub identity: Identity,
}

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service endpoint; `UNSAID_SERVER` overrides, then the default.
    pub server_url: Option<String>,
    /// Backend mode for this client.
    #[serde(default)]
    pub backend: BackendKind,
    /// Stored session from the last login, if any.
    pub session: Option<StoredSession>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "unsaid-cli", "unsaid-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the session token)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Effective service endpoint.
    pub fn server_url(&self) -> String {
        std::env::var("UNSAID_SERVER")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string())
    }

    pub fn set_session(&mut self, token: String, identity: Identity) {
        self.session = Some(StoredSession { token, identity });
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parses() {
        let config: Config = toml::from_str("backend = \"memory\"").unwrap();
        assert_eq!(config.backend, BackendKind::Memory);

        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.backend, BackendKind::Remote);
    }

    #[test]
    fn test_session_roundtrip() {
        let mut config = Config::default();
        config.set_session(
            "tok".into(),
            Identity {
                id: "u1".into(),
                display_name: None,
                avatar_url: None,
                email: Some("a@x.com".into()),
            },
        );
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.session.unwrap().token, "tok");
    }
}
