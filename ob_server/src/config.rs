//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use open_bracket::db::DatabaseConfig;
use open_bracket::tournament::ScheduleSettings;
use std::time::Duration;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Period of the date-driven status recompute
    pub recompute_interval: Duration,
    /// Match spacing for tournaments created without their own
    pub default_schedule: ScheduleSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `interval_override` - Optional recompute interval in seconds (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        database_url_override: Option<String>,
        interval_override: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let database_url = database_url_override
            .or_else(|| std::env::var("DATABASE_URL").ok())
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "DATABASE_URL".to_string(),
                hint: "Pass --db-url or set it in .env".to_string(),
            })?;

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", 20)?,
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", 5)?,
            connection_timeout_secs: parse_env_or("DB_CONNECTION_TIMEOUT", 10)?,
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT", 600)?,
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME", 1800)?,
        };

        let interval_secs = match interval_override {
            Some(secs) => secs,
            None => parse_env_or("STATUS_RECOMPUTE_INTERVAL_SECS", 60)?,
        };

        let defaults = ScheduleSettings::default();
        let default_schedule = ScheduleSettings {
            match_duration_mins: parse_env_or(
                "MATCH_DURATION_MINS",
                defaults.match_duration_mins,
            )?,
            break_between_matches_mins: parse_env_or(
                "MATCH_BREAK_MINS",
                defaults.break_between_matches_mins,
            )?,
        };

        Ok(ServerConfig {
            database,
            recompute_interval: Duration::from_secs(interval_secs),
            default_schedule,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recompute_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "STATUS_RECOMPUTE_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.default_schedule.match_duration_mins <= 0 {
            return Err(ConfigError::Invalid {
                var: "MATCH_DURATION_MINS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.default_schedule.break_between_matches_mins < 0 {
            return Err(ConfigError::Invalid {
                var: "MATCH_BREAK_MINS".to_string(),
                reason: "Must not be negative".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Parse an environment variable, falling back to `default` when unset
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {value:?}"),
        }),
        Err(_) => Ok(default),
    }
}
