use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Path to the government CSV export.
    pub csv_path: String,
    /// State whose rows are aggregated; everything else is dropped.
    pub state_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// SQLite database backing the persistent cache.
    pub database_path: String,
    /// Applied when callers do not pass an explicit TTL.
    pub default_ttl_secs: u64,
    /// Interval of the expiry sweep over the in-memory backend.
    pub sweep_interval_secs: u64,
    /// When false the persistent backend is never probed.
    pub persistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            csv_path: "data/mgnrega_data.csv".to_string(),
            state_name: "Andhra Pradesh".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            database_path: "cache.db".to_string(),
            default_ttl_secs: 1800, // 30 minutes, CSV exports change rarely
            sweep_interval_secs: 60,
            persistent: true,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            cache: CacheSettings::default(),
            general: GeneralConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let raw = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path.as_ref(), raw)
            .with_context(|| format!("Failed to write config file {}", path.as_ref().display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load("does-not-exist.toml").unwrap();
        assert_eq!(config.data.state_name, "Andhra Pradesh");
        assert_eq!(config.cache.default_ttl_secs, 1800);
        assert!(config.cache.persistent);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.data.state_name = "Telangana".to_string();
        config.cache.default_ttl_secs = 60;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.data.state_name, "Telangana");
        assert_eq!(loaded.cache.default_ttl_secs, 60);
    }
}
