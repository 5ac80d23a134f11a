//! Configuration for the ingestion service.

use serde::{Deserialize, Serialize};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/hkrace.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Scraper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Per-request timeout; a timed-out fixture is skipped for the cycle
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    /// Politeness delay between page fetches
    #[serde(default = "default_fetch_delay_secs")]
    pub fetch_delay_secs: f64,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_fetch_delay_secs() -> f64 {
    0.35
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
            fetch_delay_secs: default_fetch_delay_secs(),
        }
    }
}

/// Watch-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Seconds between scheduler invocations in `watch` mode; this is also
    /// the effective close-watch polling resolution
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_interval_secs() -> u64 {
    60
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub watch: WatchConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables (HKRACE_DATABASE_PATH, etc.)
            .add_source(
                config::Environment::with_prefix("HKRACE")
                    .separator("_")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.database.path, "data/hkrace.db");
        assert_eq!(cfg.scraper.timeout_secs, 15);
        assert_eq!(cfg.watch.interval_secs, 60);
    }
}
