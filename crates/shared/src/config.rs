//! Application configuration management.

use std::time::Duration;

use chrono::{NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Scheduling configuration.
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    /// Upper bound for a single repository operation, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_operation_timeout() -> u64 {
    10
}

impl DatabaseConfig {
    /// Pool acquire timeout.
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Per-operation timeout applied at the repository boundary.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Scheduling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// IANA timezone used to decide what "today" is (e.g. `America/Chicago`).
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Seconds a ticketless work order claim is honoured before it may be
    /// taken over.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

const fn default_claim_lease() -> u64 {
    300
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            claim_lease_secs: default_claim_lease(),
        }
    }
}

impl SchedulingConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known IANA timezone.
    pub fn tz(&self) -> Result<Tz, config::ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| {
            config::ConfigError::Message(format!("invalid timezone {:?}: {e}", self.timezone))
        })
    }

    /// Claim lease as a signed duration, saturating on overflow.
    #[must_use]
    pub fn claim_lease(&self) -> TimeDelta {
        i64::try_from(self.claim_lease_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }

    /// The current calendar date in the configured timezone.
    ///
    /// # Errors
    ///
    /// Returns an error if the timezone is invalid.
    pub fn today(&self) -> Result<NaiveDate, config::ConfigError> {
        let tz = self.tz()?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("UPKEEP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: Self = config.try_deserialize()?;
        app.scheduling.tz()?;
        Ok(app)
    }
}
