//! Configuration management for channel-remote
//!
//! Handles config file loading/saving and the persisted session code.
//! Config is stored at ~/.config/channel-remote/config.toml

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::remote::session::{SessionId, SessionStore};

/// Default TCP port for hosts
pub const DEFAULT_PORT: u16 = 7878;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persisted host session code, generated on first share
    pub session_id: Option<String>,
    /// Default playlist path or URL
    pub playlist: Option<String>,
    /// TCP port the host listens on
    pub listen_port: Option<u16>,
    /// Volume step for volume-up / volume-down (0.0 - 1.0)
    pub volume_step: Option<f64>,
    /// Ceiling on consecutive network reloads (unset = unlimited)
    pub network_retry_limit: Option<u32>,
    /// Origin used in share links, e.g. "http://tv.local:7878"
    pub share_origin: Option<String>,

    /// Where this config was loaded from
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Config {
    /// Get config file path (~/.config/channel-remote/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("channel-remote").join("config.toml"))
    }

    /// Load config from the default location, or defaults if not found
    pub fn load() -> Self {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load config from a specific file, or defaults if missing/invalid
    pub fn load_from(path: &Path) -> Self {
        let mut config: Config = std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match toml::from_str(&s) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring invalid config");
                    None
                }
            })
            .unwrap_or_default();
        config.path = Some(path.to_path_buf());
        config
    }

    /// Save config to the file it was loaded from
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .clone()
            .or_else(Self::path)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config path"))?;

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_PORT)
    }

    pub fn volume_step(&self) -> f64 {
        self.volume_step
            .filter(|s| s.is_finite() && *s > 0.0 && *s <= 1.0)
            .unwrap_or(crate::app::DEFAULT_VOLUME_STEP)
    }

    /// Share-link origin: configured value, else this machine's LAN address
    pub fn share_origin(&self) -> String {
        self.share_origin_on(self.port())
    }

    /// Share-link origin for a host listening on `port`
    pub fn share_origin_on(&self, port: u16) -> String {
        if let Some(origin) = &self.share_origin {
            return origin.clone();
        }
        let host = local_ip_address::local_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|_| "localhost".to_string());
        format!("http://{}:{}", host, port)
    }

    /// Forget the persisted session code
    pub fn reset_session_id(&mut self) -> Result<()> {
        self.session_id = None;
        self.save()
    }
}

impl SessionStore for Config {
    fn load_session_id(&self) -> Option<String> {
        self.session_id.clone()
    }

    fn save_session_id(&mut self, id: &SessionId) {
        self.session_id = Some(id.to_string());
        if let Err(e) = self.save() {
            // Best effort: the session still works, the code just won't stick
            warn!(error = %e, "could not persist session code");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::session::load_or_create;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("channel-remote-test-{}-{}", name, uuid::Uuid::new_v4()))
            .join("config.toml")
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.session_id.is_none());
        assert_eq!(config.port(), DEFAULT_PORT);
        assert_eq!(config.volume_step(), 0.1);
    }

    #[test]
    fn test_invalid_volume_step_falls_back() {
        let config = Config {
            volume_step: Some(5.0),
            ..Config::default()
        };
        assert_eq!(config.volume_step(), 0.1);
    }

    #[test]
    fn test_session_id_persists_across_loads() {
        let path = temp_path("persist");
        let mut config = Config::load_from(&path);
        let id = load_or_create(&mut config);

        let mut reloaded = Config::load_from(&path);
        assert_eq!(load_or_create(&mut reloaded), id);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_configured_share_origin_wins() {
        let config = Config {
            share_origin: Some("http://tv.local".into()),
            ..Config::default()
        };
        assert_eq!(config.share_origin(), "http://tv.local");
    }
}
