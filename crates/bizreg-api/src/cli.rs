//! # Command-Line Configuration
//!
//! Every setting has a flag and, where operators expect one, an
//! environment variable. Durations accept `500ms`, `3s`, `15m`, `1h30m`.

use std::time::Duration;

use bizreg_core::config::parse_duration;
use bizreg_core::{AppConfig, DbConfig, LimiterConfig};
use clap::{ArgAction, Parser};

/// Business registry API server.
#[derive(Parser, Debug)]
#[command(name = "bizreg-api", version, about, long_about = None)]
pub struct Cli {
    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// Environment label (development|staging|production).
    #[arg(long, env = "BIZREG_ENV", default_value = "development")]
    pub env: String,

    /// Postgres DSN. When empty the server runs on an in-memory store.
    #[arg(long, env = "DATABASE_URL", default_value = "")]
    pub db_dsn: String,

    /// Maximum open connections.
    #[arg(long, default_value_t = 25)]
    pub db_max_open_conns: u32,

    /// Maximum idle connections.
    #[arg(long, default_value_t = 25)]
    pub db_max_idle_conns: u32,

    /// Close connections idle for longer than this.
    #[arg(long, default_value = "15m", value_parser = parse_duration)]
    pub db_max_idle_time: Duration,

    /// Bound on every store statement.
    #[arg(long, default_value = "3s", value_parser = parse_duration)]
    pub db_statement_timeout: Duration,

    /// Token refill rate per client.
    #[arg(long, default_value_t = 2.0)]
    pub limiter_rps: f64,

    /// Token bucket capacity per client.
    #[arg(long, default_value_t = 4)]
    pub limiter_burst: u32,

    /// Enable per-client rate limiting.
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    pub limiter_enabled: bool,

    /// How often idle clients are evicted.
    #[arg(long, default_value = "60s", value_parser = parse_duration)]
    pub sweep_interval: Duration,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Collapse the flags into the process configuration.
    pub fn into_config(self) -> AppConfig {
        AppConfig {
            port: self.port,
            env: self.env,
            rate_limiter: LimiterConfig {
                enabled: self.limiter_enabled,
                requests_per_second: self.limiter_rps,
                burst: self.limiter_burst,
            },
            db: DbConfig {
                dsn: self.db_dsn,
                max_open_conns: self.db_max_open_conns,
                max_idle_conns: self.db_max_idle_conns,
                max_idle_time: self.db_max_idle_time,
                statement_timeout: self.db_statement_timeout,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["bizreg-api"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).expect("arguments should parse")
    }

    #[test]
    fn defaults_match_config_defaults() {
        let cli = Cli::try_parse_from([
            "bizreg-api",
            "--port",
            "4000",
            "--env",
            "development",
            "--db-dsn",
            "",
        ])
        .unwrap();
        assert_eq!(cli.into_config(), AppConfig::default());
    }

    #[test]
    fn durations_and_limiter_flags() {
        let config = parse(&[
            "--db-dsn",
            "",
            "--db-max-idle-time",
            "1h30m",
            "--db-statement-timeout",
            "500ms",
            "--limiter-rps",
            "0.5",
            "--limiter-burst",
            "1",
            "--limiter-enabled",
            "false",
        ])
        .into_config();

        assert_eq!(config.db.max_idle_time, Duration::from_secs(90 * 60));
        assert_eq!(config.db.statement_timeout, Duration::from_millis(500));
        assert!(!config.rate_limiter.enabled);
        assert_eq!(config.rate_limiter.burst, 1);
        assert!((config.rate_limiter.requests_per_second - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn bad_duration_is_rejected() {
        let result = Cli::try_parse_from(["bizreg-api", "--db-statement-timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn sweep_interval_parses() {
        let cli = parse(&["--db-dsn", "", "--sweep-interval", "2m"]);
        assert_eq!(cli.sweep_interval, Duration::from_secs(120));
        assert!(!cli.log_json);
    }
}
