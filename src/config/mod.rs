use serde::{Deserialize, Serialize};
use std::path::Path;
use std::fs;
use std::time::Duration;
use log::{info, warn};
use crate::error::{Error, Result};

pub const API_URL_ENV: &str = "DASHBOARD_API_URL";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub poller: PollerConfig,
    pub server: ServerConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the dashboard API, without the `/api` suffix.
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PollerConfig {
    pub interval_ms: u64,
    /// Points kept per symbol in the rolling chart buffer.
    pub capacity: usize,
    pub selected_symbol: String,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 3_000,
            capacity: crate::series::DEFAULT_CAPACITY,
            selected_symbol: "BTC/USDT".to_string(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How often the demo engine moves its simulated prices.
    pub tick_ms: u64,
    pub initial_cash: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            tick_ms: 3_000,
            initial_cash: 10_000.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub order_delay_ms: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { order_delay_ms: 1_000 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// When set, records go to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {:?}", path);
            Self::load(path)
        } else {
            warn!("Configuration file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        fs::write(path, config_str)?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                info!("Using API base URL from {}", API_URL_ENV);
                self.api.base_url = url.trim().to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_ms == 0 {
            return Err(Error::ConfigError("poller.interval_ms must be positive".to_string()));
        }
        if self.poller.capacity == 0 {
            return Err(Error::ConfigError("poller.capacity must be at least 1".to_string()));
        }
        if self.server.tick_ms == 0 {
            return Err(Error::ConfigError("server.tick_ms must be positive".to_string()));
        }
        if !self.server.initial_cash.is_finite() || self.server.initial_cash < 0.0 {
            return Err(Error::ConfigError("server.initial_cash must be a non-negative number".to_string()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(Error::ConfigError(format!("api.base_url is not an http(s) URL: {}", self.api.base_url)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_behaviour() {
        let config = Config::default();
        assert_eq!(config.poller.interval(), Duration::from_secs(3));
        assert_eq!(config.poller.capacity, 30);
        assert_eq!(config.simulation.order_delay_ms, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [poller]
            interval_ms = 500

            [server]
            port = 8088
            "#,
        )
        .unwrap();
        assert_eq!(config.poller.interval_ms, 500);
        assert_eq!(config.poller.capacity, 30);
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.poller.interval_ms = 0;
        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("dashboard-config-{}.toml", std::process::id()));
        let mut config = Config::default();
        config.api.base_url = "http://localhost:9000".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_or_default(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(config, Config::default());
    }
}
