// Client configuration.
// Defaults, overridden by an optional JSON file, overridden by environment variables.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8001";

/// Polling faster or slower than this window is clamped.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Connection and caching settings for [`crate::api::ApiClient`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Backend origin, without the `/api` suffix.
    pub base_url: String,
    pub request_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// TTL for cached list responses.
    pub list_ttl_secs: u64,
    /// TTL for cached single-resource responses.
    pub detail_ttl_secs: u64,
    pub default_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 30_000,
            poll_interval_ms: 3_000,
            list_ttl_secs: 120,
            detail_ttl_secs: 180,
            default_ttl_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

/// Per-resource cache lifetimes handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub list: Duration,
    pub detail: Duration,
    pub default: Duration,
}

impl ClientConfig {
    /// Load configuration: defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_path(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ApiError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| ApiError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply `NATIVIWEB_*` overrides using the given variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("NATIVIWEB_API_URL").filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(ms) = lookup("NATIVIWEB_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.request_timeout_ms = ms;
        }
        if let Some(ms) = lookup("NATIVIWEB_POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ApiError::Config("base_url must not be empty".to_string()));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::Config(format!(
                "base_url must start with http:// or https://, got {}",
                self.base_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ApiError::Config("request_timeout_ms must be > 0".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ApiError::Config("poll_interval_ms must be > 0".to_string()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ApiError::Config("sweep_interval_secs must be > 0".to_string()));
        }
        Ok(())
    }

    /// The REST root all resource paths hang off.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.base_url.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Build polling interval, clamped to the 2-5 second window.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn cache_ttls(&self) -> CacheTtls {
        CacheTtls {
            list: Duration::from_secs(self.list_ttl_secs),
            detail: Duration::from_secs(self.detail_ttl_secs),
            default: Duration::from_secs(self.default_ttl_secs),
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "nativiweb")
}

/// Default config file (~/.config/nativiweb/config.json on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
}

/// Default directory for downloaded build artifacts.
pub fn downloads_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("downloads"))
}

/// Log file used while the terminal monitor owns the screen.
pub fn log_file_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.data_dir().join("nativiweb.log"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api_base(), "http://localhost:8001/api");
        assert_eq!(config.cache_ttls().list, Duration::from_secs(120));
        assert_eq!(config.cache_ttls().detail, Duration::from_secs(180));
        assert_eq!(config.cache_ttls().default, Duration::from_secs(300));
    }

    #[test]
    fn test_api_base_trims_trailing_slash() {
        let config = ClientConfig {
            base_url: "https://studio.example.com/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.api_base(), "https://studio.example.com/api");
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let mut config = ClientConfig {
            poll_interval_ms: 500,
            ..ClientConfig::default()
        };
        assert_eq!(config.poll_interval(), MIN_POLL_INTERVAL);

        config.poll_interval_ms = 60_000;
        assert_eq!(config.poll_interval(), MAX_POLL_INTERVAL);

        config.poll_interval_ms = 4_000;
        assert_eq!(config.poll_interval(), Duration::from_secs(4));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NATIVIWEB_API_URL", "https://api.example.com"),
            ("NATIVIWEB_TIMEOUT_MS", "1500"),
            ("NATIVIWEB_POLL_INTERVAL_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.request_timeout_ms, 1500);
        // Unparseable values are ignored
        assert_eq!(config.poll_interval_ms, 3_000);
    }

    #[test]
    fn test_from_path_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "base_url": "http://10.0.0.5:9000", "list_ttl_secs": 30 }"#).unwrap();

        let config = ClientConfig::from_path(&path).unwrap();
        assert_eq!(config.base_url, "http://10.0.0.5:9000");
        assert_eq!(config.list_ttl_secs, 30);
        assert_eq!(config.detail_ttl_secs, 180);
    }

    #[test]
    fn test_from_path_rejects_unknown_fields() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "base_uri": "http://localhost" }"#).unwrap();

        assert!(matches!(
            ClientConfig::from_path(&path),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");
        assert!(ClientConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let empty_url = ClientConfig {
            base_url: " ".to_string(),
            ..ClientConfig::default()
        };
        assert!(empty_url.validate().is_err());

        let no_scheme = ClientConfig {
            base_url: "localhost:8001".to_string(),
            ..ClientConfig::default()
        };
        assert!(no_scheme.validate().is_err());

        let zero_timeout = ClientConfig {
            request_timeout_ms: 0,
            ..ClientConfig::default()
        };
        assert!(zero_timeout.validate().is_err());
    }
}
