//! Configuration management
//!
//! Every value has a fixed default matching the deployment the pipeline was
//! written for; `USERPIPE_*` environment variables (or a `.env` file) override
//! them.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use userpipe_common::{PipelineError, Result};

// ============================================================================
// Defaults
// ============================================================================

/// Upstream random user generator endpoint.
pub const DEFAULT_SOURCE_URL: &str = "https://randomuser.me/api/";

/// Records requested per run (one page).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

pub const DEFAULT_DB_HOST: &str = "postgres";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "airflow";
pub const DEFAULT_DB_USER: &str = "airflow";
pub const DEFAULT_DB_PASSWORD: &str = "airflow";

/// Extra attempts per failed stage.
pub const DEFAULT_RETRIES: u32 = 1;

/// Pause before a stage is retried (5 minutes).
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 300;

/// Full pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PipelineConfig {
    pub source: SourceConfig,
    pub database: DatabaseConfig,
    pub retry: RetryPolicy,
}

/// Upstream API configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Endpoint queried with `?results={page_size}`
    pub url: String,
    pub page_size: u32,
}

/// Destination PostgreSQL connection settings
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

// Keep the password out of logs.
impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// How often, and after how long, a failed stage is re-run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            database: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build from the current environment only (no `.env` lookup)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            source: SourceConfig {
                url: env_or("USERPIPE_SOURCE_URL", defaults.source.url),
                page_size: env_parse("USERPIPE_PAGE_SIZE", defaults.source.page_size)?,
            },
            database: DatabaseConfig {
                host: env_or("USERPIPE_DB_HOST", defaults.database.host),
                port: env_parse("USERPIPE_DB_PORT", defaults.database.port)?,
                database: env_or("USERPIPE_DB_NAME", defaults.database.database),
                user: env_or("USERPIPE_DB_USER", defaults.database.user),
                password: env_or("USERPIPE_DB_PASSWORD", defaults.database.password),
            },
            retry: RetryPolicy {
                retries: env_parse("USERPIPE_RETRIES", defaults.retry.retries)?,
                delay: Duration::from_secs(env_parse(
                    "USERPIPE_RETRY_DELAY_SECS",
                    defaults.retry.delay.as_secs(),
                )?),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.source.url.trim().is_empty() {
            return Err(PipelineError::Config("Source URL cannot be empty".to_string()));
        }

        if self.source.page_size == 0 {
            return Err(PipelineError::Config(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.database.host.trim().is_empty() {
            return Err(PipelineError::Config("Database host cannot be empty".to_string()));
        }

        if self.database.port == 0 {
            return Err(PipelineError::Config(
                "Database port must be greater than 0".to_string(),
            ));
        }

        if self.database.database.trim().is_empty() {
            return Err(PipelineError::Config("Database name cannot be empty".to_string()));
        }

        if self.database.user.trim().is_empty() {
            return Err(PipelineError::Config("Database user cannot be empty".to_string()));
        }

        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::Config(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
