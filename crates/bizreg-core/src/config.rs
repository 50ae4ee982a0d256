//! # Process Configuration
//!
//! Loaded once at startup and shared immutably afterwards. Durations are
//! written the way operators are used to (`"15m"`, `"3s"`, `"1h30m"`,
//! `"500ms"`).

use std::time::Duration;

use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Configuration errors detected at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A duration string could not be parsed.
    #[error("invalid duration \"{0}\" (expected e.g. 500ms, 3s, 15m, 1h30m)")]
    InvalidDuration(String),

    /// A value is outside its permitted range.
    #[error("invalid {field}: {reason}")]
    OutOfRange {
        /// Offending setting.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Admission-control settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LimiterConfig {
    /// When false every request is admitted.
    pub enabled: bool,
    /// Token refill rate.
    pub requests_per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2.0,
            burst: 4,
        }
    }
}

/// Connection-pool and statement settings for the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DbConfig {
    /// Postgres connection string. Empty means in-memory mode.
    pub dsn: String,
    /// Upper bound on open connections.
    pub max_open_conns: u32,
    /// Upper bound on connections kept warm while idle.
    pub max_idle_conns: u32,
    /// Idle connections older than this are closed.
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_idle_time: Duration,
    /// Bound on every begin/statement/commit issued by the store.
    #[serde(deserialize_with = "deserialize_duration")]
    pub statement_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_open_conns: 25,
            max_idle_conns: 25,
            max_idle_time: Duration::from_secs(15 * 60),
            statement_timeout: Duration::from_secs(3),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Deployment environment label (`development`, `staging`, `production`).
    pub env: String,
    /// Admission control.
    pub rate_limiter: LimiterConfig,
    /// Backing store.
    pub db: DbConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            env: "development".to_string(),
            rate_limiter: LimiterConfig::default(),
            db: DbConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let limiter = &self.rate_limiter;
        if limiter.enabled {
            if !(limiter.requests_per_second.is_finite() && limiter.requests_per_second > 0.0) {
                return Err(ConfigError::OutOfRange {
                    field: "rateLimiter.requestsPerSecond",
                    reason: "must be a positive number when the limiter is enabled",
                });
            }
            if limiter.burst == 0 {
                return Err(ConfigError::OutOfRange {
                    field: "rateLimiter.burst",
                    reason: "must be at least 1 when the limiter is enabled",
                });
            }
        }
        if self.db.max_open_conns == 0 {
            return Err(ConfigError::OutOfRange {
                field: "db.maxOpenConns",
                reason: "must be at least 1",
            });
        }
        if self.db.max_idle_conns > self.db.max_open_conns {
            return Err(ConfigError::OutOfRange {
                field: "db.maxIdleConns",
                reason: "must not exceed db.maxOpenConns",
            });
        }
        if self.db.statement_timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                field: "db.statementTimeout",
                reason: "must be greater than zero",
            });
        }
        Ok(())
    }
}

/// Parse a duration such as `"15m"`, `"1h30m"`, `"2.5s"`, or `"250ms"`.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let err = || ConfigError::InvalidDuration(input.to_string());
    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(err());
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(err)?;
        if number_len == 0 {
            return Err(err());
        }
        let value: f64 = rest[..number_len].parse().map_err(|_| err())?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ms" => 0.001,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(err()),
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }
    Ok(Duration::from_secs_f64(total))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}
