//! Environment configuration for the database pool.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `TABULA_DATABASE_PATH` | `./tabula.db` |
//! | `TABULA_MAX_CONNECTIONS` | `5` |
//! | `TABULA_MIN_CONNECTIONS` | `1` |
//! | `TABULA_CONNECT_TIMEOUT_SECS` | `30` |
//! | `TABULA_IDLE_TIMEOUT_SECS` | `600` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::pool::DbConfig;

pub const ENV_DATABASE_PATH: &str = "TABULA_DATABASE_PATH";
pub const ENV_MAX_CONNECTIONS: &str = "TABULA_MAX_CONNECTIONS";
pub const ENV_MIN_CONNECTIONS: &str = "TABULA_MIN_CONNECTIONS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "TABULA_CONNECT_TIMEOUT_SECS";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "TABULA_IDLE_TIMEOUT_SECS";

const DEFAULT_DATABASE_PATH: &str = "./tabula.db";

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(ENV_DATABASE_PATH).unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());
        let defaults = DbConfig::new(path);

        let config = DbConfig {
            max_connections: parse_or(&lookup, ENV_MAX_CONNECTIONS, defaults.max_connections)?,
            min_connections: parse_or(&lookup, ENV_MIN_CONNECTIONS, defaults.min_connections)?,
            connect_timeout: Duration::from_secs(parse_or(
                &lookup,
                ENV_CONNECT_TIMEOUT_SECS,
                defaults.connect_timeout.as_secs(),
            )?),
            idle_timeout: Duration::from_secs(parse_or(
                &lookup,
                ENV_IDLE_TIMEOUT_SECS,
                defaults.idle_timeout.as_secs(),
            )?),
            ..defaults
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(ENV_MAX_CONNECTIONS.to_string()));
        }
        if config.min_connections > config.max_connections {
            return Err(ConfigError::InvalidValue(ENV_MIN_CONNECTIONS.to_string()));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = DbConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.database_path.to_str(), Some(DEFAULT_DATABASE_PATH));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = DbConfig::from_lookup(lookup(&[
            (ENV_DATABASE_PATH, "/var/lib/app.db"),
            (ENV_MAX_CONNECTIONS, "12"),
            (ENV_IDLE_TIMEOUT_SECS, " 90 "),
        ]))
        .unwrap();
        assert_eq!(config.database_path.to_str(), Some("/var/lib/app.db"));
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_invalid_number() {
        let err = DbConfig::from_lookup(lookup(&[(ENV_MAX_CONNECTIONS, "lots")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for TABULA_MAX_CONNECTIONS");
    }

    #[test]
    fn test_min_above_max_rejected() {
        let err = DbConfig::from_lookup(lookup(&[
            (ENV_MAX_CONNECTIONS, "2"),
            (ENV_MIN_CONNECTIONS, "3"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(k) if k == ENV_MIN_CONNECTIONS));
    }
}
