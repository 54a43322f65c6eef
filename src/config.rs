use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_MIN_CONNECTIONS: u32 = 1;
/// Effective duration assumed for allocations scheduled without an end time.
const DEFAULT_ALLOCATION_MINUTES: i64 = 60;
/// Fixed per-day capacity a work center is measured against.
const DEFAULT_DAILY_CAPACITY_MINUTES: i64 = 480;

/// Scheduling knobs consumed by the conflict detector.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SchedulingConfig {
    /// Minutes assumed for an allocation whose scheduled end is absent.
    #[serde(default = "default_allocation_minutes")]
    #[validate(range(min = 1))]
    pub default_allocation_minutes: i64,

    /// Fixed daily capacity in minutes used by utilization reporting.
    #[serde(default = "default_daily_capacity_minutes")]
    #[validate(range(min = 1))]
    pub daily_capacity_minutes: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_allocation_minutes: default_allocation_minutes(),
            daily_capacity_minutes: default_daily_capacity_minutes(),
        }
    }
}

/// Application configuration, loaded from `config/` files layered with
/// `APP__`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    /// Minimum number of pooled connections
    #[serde(default = "default_min_connections")]
    pub db_min_connections: u32,

    /// Log level filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON instead of human-readable lines
    #[serde(default)]
    pub log_json: bool,

    /// Deployment environment name (development, test, production)
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    #[validate]
    pub scheduling: SchedulingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            db_max_connections: default_max_connections(),
            db_min_connections: default_min_connections(),
            log_level: default_log_level(),
            log_json: false,
            environment: default_environment(),
            scheduling: SchedulingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `config/default`, `config/{environment}` and
    /// `APP__`-prefixed environment variables, in increasing precedence.
    pub fn load() -> Result<Self, ConfigError> {
        let run_env = env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

        let config: AppConfig = Config::builder()
            .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
            .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?
            .try_deserialize()?;

        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(config)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_min_connections() -> u32 {
    DEFAULT_MIN_CONNECTIONS
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_allocation_minutes() -> i64 {
    DEFAULT_ALLOCATION_MINUTES
}

fn default_daily_capacity_minutes() -> i64 {
    DEFAULT_DAILY_CAPACITY_MINUTES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduling.default_allocation_minutes, 60);
        assert_eq!(config.scheduling.daily_capacity_minutes, 480);
    }
}
