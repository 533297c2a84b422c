//! Service configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `DATABASE_URL` | `postgres://localhost/dropnote` |
//! | `HOST` / `PORT` | `0.0.0.0` / `5000` |
//! | `MAX_NOTES` | `50` |
//! | `WRITE_LIMIT_PER_DAY` | `50` |
//! | `RATE_LIMIT_ENABLED` | `true` |
//! | `TRUST_FORWARDED_FOR` | `false` |
//! | `ALLOWED_ORIGINS` | `http://127.0.0.1:5333` (`*` allows any) |
//! | `DB_MAX_CONNECTIONS` | `10` |
//! | `RUN_MIGRATIONS` | `true` |
//! | `LOG_FORMAT` / `LOG_FILE` / `LOG_ANSI` | `text` / stdout / auto |
//!
//! Empty values count as unset. Malformed numbers and booleans are startup
//! errors rather than silent defaults.

use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use dropnote_core::defaults;
use dropnote_core::{Error, Result};

/// Default database URL when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/dropnote";

/// Default pool size when `DB_MAX_CONNECTIONS` is unset.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

/// CORS origin policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<String>),
}

impl AllowedOrigins {
    fn parse(raw: &str) -> Self {
        if raw.trim() == "*" {
            return AllowedOrigins::Any;
        }
        AllowedOrigins::List(
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging settings shared by the server and the seeding tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Log to this file (rotated daily) instead of stdout.
    pub file: Option<PathBuf>,
    /// Force ANSI colors on or off; auto-detected when `None`.
    pub ansi: Option<bool>,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            format: match get("LOG_FORMAT").as_deref().map(str::trim) {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            file: get("LOG_FILE").map(PathBuf::from),
            ansi: get("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Total note cap enforced on create.
    pub max_notes: i64,
    /// Write requests per client IP per day.
    pub write_limit_per_day: u32,
    pub rate_limit_enabled: bool,
    /// Key the write quota on the first `X-Forwarded-For` entry instead of
    /// the peer address. Only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,
    pub allowed_origins: AllowedOrigins,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub log: LogConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_notes: i64 = parse_var(&get, "MAX_NOTES", defaults::MAX_NOTES)?;
        if max_notes < 0 {
            return Err(Error::Config("MAX_NOTES must not be negative".to_string()));
        }

        let write_limit_per_day: u32 =
            parse_var(&get, "WRITE_LIMIT_PER_DAY", defaults::WRITE_LIMIT_PER_DAY)?;
        let rate_limit_enabled = parse_bool(&get, "RATE_LIMIT_ENABLED", true)?;
        if rate_limit_enabled && write_limit_per_day == 0 {
            return Err(Error::Config(
                "WRITE_LIMIT_PER_DAY must be positive when rate limiting is enabled".to_string(),
            ));
        }

        let db_max_connections: u32 =
            parse_var(&get, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?;
        if db_max_connections == 0 {
            return Err(Error::Config(
                "DB_MAX_CONNECTIONS must be positive".to_string(),
            ));
        }

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            host: get("HOST").unwrap_or_else(|| defaults::HOST.to_string()),
            port: parse_var(&get, "PORT", defaults::PORT)?,
            max_notes,
            write_limit_per_day,
            rate_limit_enabled,
            trust_forwarded_for: parse_bool(&get, "TRUST_FORWARDED_FOR", false)?,
            allowed_origins: AllowedOrigins::parse(
                &get("ALLOWED_ORIGINS").unwrap_or_else(|| defaults::ALLOWED_ORIGINS.to_string()),
            ),
            db_max_connections,
            run_migrations: parse_bool(&get, "RUN_MIGRATIONS", true)?,
            log: LogConfig::from_lookup(&get),
        })
    }

    /// Socket address to bind.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("Invalid HOST/PORT: {}", e)))
    }
}

fn parse_var<T, F>(get: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} must be a number: {}", key, e))),
        None => Ok(default),
    }
}

fn parse_bool<F>(get: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.trim().to_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_notes, 50);
        assert_eq!(config.write_limit_per_day, 50);
        assert!(config.rate_limit_enabled);
        assert!(!config.trust_forwarded_for);
        assert!(config.run_migrations);
        assert_eq!(
            config.allowed_origins,
            AllowedOrigins::List(vec!["http://127.0.0.1:5333".to_string()])
        );
        assert_eq!(config.log, LogConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("MAX_NOTES", "500"),
            ("RATE_LIMIT_ENABLED", "false"),
            ("ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("LOG_FORMAT", "json"),
            ("LOG_ANSI", "false"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.max_notes, 500);
        assert!(!config.rate_limit_enabled);
        assert_eq!(
            config.allowed_origins,
            AllowedOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.ansi, Some(false));
    }

    #[test]
    fn test_wildcard_origin() {
        let config = config_from(&[("ALLOWED_ORIGINS", "*")]).unwrap();
        assert_eq!(config.allowed_origins, AllowedOrigins::Any);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = config_from(&[("PORT", ""), ("ALLOWED_ORIGINS", " ")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(
            config.allowed_origins,
            AllowedOrigins::List(vec!["http://127.0.0.1:5333".to_string()])
        );
    }

    #[test]
    fn test_invalid_number_is_config_error() {
        let err = config_from(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.starts_with("PORT")));

        assert!(config_from(&[("MAX_NOTES", "-1")]).is_err());
        assert!(config_from(&[("DB_MAX_CONNECTIONS", "0")]).is_err());
    }

    #[test]
    fn test_invalid_bool_is_config_error() {
        let err = config_from(&[("RUN_MIGRATIONS", "maybe")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zero_write_limit_needs_rate_limit_disabled() {
        assert!(config_from(&[("WRITE_LIMIT_PER_DAY", "0")]).is_err());
        assert!(config_from(&[
            ("WRITE_LIMIT_PER_DAY", "0"),
            ("RATE_LIMIT_ENABLED", "false")
        ])
        .is_ok());
    }

    #[test]
    fn test_bind_addr() {
        let config = config_from(&[("HOST", "127.0.0.1"), ("PORT", "5001")]).unwrap();
        assert_eq!(config.bind_addr().unwrap().to_string(), "127.0.0.1:5001");
    }
}
