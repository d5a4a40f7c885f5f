use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const ENV_API_ENDPOINT: &str = "MINERSTATS_API_ENDPOINT";
pub const ENV_DATABASE: &str = "MINERSTATS_DATABASE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the balance API, with a trailing slash
    pub api_endpoint: String,

    /// SQLite file holding the realtime tree
    pub database_path: PathBuf,

    /// Rows per page of the profitability table
    pub page_size: usize,

    /// Quiet period before a typed filter is applied (milliseconds)
    pub filter_debounce_ms: u64,

    /// How often row ages are recomputed (seconds)
    pub age_refresh_secs: u64,

    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "http://localhost:3000/".to_string(),
            database_path: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("minerstats")
                .join("minerstats.db"),
            page_size: 10,
            filter_debounce_ms: 500,
            age_refresh_secs: 10,
            request_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Loads the config file at the default location, creating it when absent,
    /// then applies environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        } else {
            let default_config = Self::default();
            default_config.save_to(path)?;
            default_config
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("minerstats").join("config.toml"))
    }

    /// Overrides values from the environment; `lookup` is normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup(ENV_API_ENDPOINT).filter(|v| !v.is_empty()) {
            self.api_endpoint = endpoint;
        }
        if let Some(database) = lookup(ENV_DATABASE).filter(|v| !v.is_empty()) {
            self.database_path = PathBuf::from(database);
        }
        if !self.api_endpoint.ends_with('/') {
            self.api_endpoint.push('/');
        }
    }

    pub fn filter_debounce(&self) -> Duration {
        Duration::from_millis(self.filter_debounce_ms)
    }

    pub fn age_refresh(&self) -> Duration {
        Duration::from_secs(self.age_refresh_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minerstats").join("config.toml");

        let config = AppConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.page_size, 10);
        assert_eq!(config.filter_debounce(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "page_size = 25\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.age_refresh_secs, 10);
    }

    #[test]
    fn test_environment_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_ENDPOINT, "https://balances.example.com/dev"),
            (ENV_DATABASE, "/tmp/stats.db"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_endpoint, "https://balances.example.com/dev/");
        assert_eq!(config.database_path, PathBuf::from("/tmp/stats.db"));
    }
}
