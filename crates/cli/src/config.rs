//! CLI configuration utilities

use anyhow::{Context, Result};
use posadmin_core::ClientConfig;
use posadmin_core::config::default_data_dir;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";

/// Load client configuration, letting `--data-dir` override the loaded value
///
/// Without an explicit path, `config.toml` in the data directory is used when
/// it exists.
pub fn load(path: Option<&Path>, data_dir: Option<PathBuf>) -> Result<ClientConfig> {
    let fallback = data_dir
        .clone()
        .unwrap_or_else(default_data_dir)
        .join(CONFIG_FILE);
    let path = path.or_else(|| fallback.is_file().then_some(fallback.as_path()));

    let mut config = ClientConfig::load(path).context("Failed to load configuration")?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    save_config(&ClientConfig::default(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generated_config_loads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = ClientConfig::default();
        config.base_url = "https://admin.example.com/api/v1".into();
        config.refresh.max_queue = 7;
        save_config(&config, &path).unwrap();

        let loaded = load(Some(&path), Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(loaded.base_url, "https://admin.example.com/api/v1");
        assert_eq!(loaded.refresh.max_queue, 7);
        assert_eq!(loaded.data_dir, dir.path());
    }

    #[test]
    fn test_config_in_data_dir_is_picked_up() {
        let dir = TempDir::new().unwrap();
        let mut config = ClientConfig::default();
        config.cache.plans_ttl_secs = 42;
        save_config(&config, dir.path().join(CONFIG_FILE)).unwrap();

        let loaded = load(None, Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(loaded.cache.plans_ttl_secs, 42);
    }

    #[test]
    fn test_default_config_is_valid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        generate_default_config(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[refresh]"));
        assert!(content.contains("plans_ttl_secs = 300"));
    }
}
