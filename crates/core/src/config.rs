//! Client configuration
//!
//! Values come from, in increasing priority: built-in defaults, an optional
//! TOML/YAML file, and `POSADMIN_*` environment variables (nested keys use a
//! double underscore, e.g. `POSADMIN_REFRESH__MAX_QUEUE`).

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "POSADMIN";
pub const STORAGE_FILE: &str = "storage.json";

/// Main client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.example.com/api/v1`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    pub user_agent: String,

    /// Token refresh coordination
    pub refresh: RefreshSettings,

    /// Local list caches
    pub cache: CacheSettings,

    /// Directory holding local storage and logs
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSettings {
    /// Callers allowed to wait on an in-flight refresh
    pub max_queue: usize,

    /// How long a waiting caller is kept before it is rejected
    pub entry_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    pub plans_ttl_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1".to_string(),
            timeout_secs: 30,
            user_agent: format!("posadmin-client/{}", env!("CARGO_PKG_VERSION")),
            refresh: RefreshSettings::default(),
            cache: CacheSettings::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            max_queue: 50,
            entry_timeout_ms: 10_000,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { plans_ttl_secs: 300 }
    }
}

/// `$POSADMIN_DATA_DIR`, else the platform data directory
pub fn default_data_dir() -> PathBuf {
    std::env::var("POSADMIN_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("posadmin")
        })
}

impl ClientConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value cannot be parsed,
    /// or the result fails validation
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("user_agent", defaults.user_agent)?
            .set_default("refresh.max_queue", defaults.refresh.max_queue as u64)?
            .set_default("refresh.entry_timeout_ms", defaults.refresh.entry_timeout_ms)?
            .set_default("cache.plans_ttl_secs", defaults.cache.plans_ttl_secs)?
            .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error when the base URL is not an absolute http(s) URL or a
    /// limit is zero
    pub fn validate(&self) -> CoreResult<()> {
        let url = url::Url::parse(&self.base_url)
            .map_err(|e| CoreError::invalid_config(format!("base_url {}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CoreError::invalid_config(format!(
                "base_url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.refresh.max_queue == 0 {
            return Err(CoreError::invalid_config("refresh.max_queue must be positive"));
        }
        if self.refresh.entry_timeout_ms == 0 {
            return Err(CoreError::invalid_config(
                "refresh.entry_timeout_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn entry_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh.entry_timeout_ms)
    }

    pub fn plans_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.plans_ttl_secs)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.data_dir.join(STORAGE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.entry_timeout(), Duration::from_secs(10));
        assert_eq!(config.refresh.max_queue, 50);
        assert!(config.storage_path().ends_with(STORAGE_FILE));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posadmin.toml");
        std::fs::write(
            &path,
            r#"
base_url = "https://admin.example.com/api/v1"
timeout_secs = 5

[refresh]
max_queue = 8
entry_timeout_ms = 2500
"#,
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "https://admin.example.com/api/v1");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.refresh.max_queue, 8);
        assert_eq!(config.entry_timeout(), Duration::from_millis(2500));
        assert_eq!(config.cache.plans_ttl_secs, 300);
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let config = ClientConfig {
            base_url: "ftp://files.example.com".into(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_queue() {
        let mut config = ClientConfig::default();
        config.refresh.max_queue = 0;
        assert!(config.validate().is_err());
    }
}
