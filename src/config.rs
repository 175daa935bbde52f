//! Process configuration read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which store adapter backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_addr: SocketAddr,
    pub storage: StorageKind,
    /// SQLite database file. Ignored for the memory store.
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// Deadline applied to every request.
    pub request_timeout: Duration,
    /// Seeds reviewer selection for reproducible runs.
    pub selection_seed: Option<u64>,
}

impl Config {
    /// Read configuration from the process environment. The binary loads
    /// `.env` before calling this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let http_addr = parse("HTTP_ADDR", get("HTTP_ADDR"), "0.0.0.0:8080")?;

        let storage = match get("DB_TYPE").as_deref().unwrap_or("sqlite") {
            "sqlite" => StorageKind::Sqlite,
            "memory" => StorageKind::Memory,
            other => {
                return Err(ConfigError::Invalid {
                    key: "DB_TYPE",
                    value: other.to_string(),
                    reason: "expected 'sqlite' or 'memory'".to_string(),
                })
            }
        };

        let database_path = get("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("reviewers.db"));

        let max_connections = parse("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), "5")?;
        let timeout_secs: u64 = parse("REQUEST_TIMEOUT_SECS", get("REQUEST_TIMEOUT_SECS"), "5")?;

        let selection_seed = match get("SELECTION_SEED") {
            Some(raw) => Some(parse("SELECTION_SEED", Some(raw), "0")?),
            None => None,
        };

        Ok(Self {
            http_addr,
            storage,
            database_path,
            max_connections,
            request_timeout: Duration::from_secs(timeout_secs),
            selection_seed,
        })
    }
}

fn parse<T>(key: &'static str, raw: Option<String>, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = raw.unwrap_or_else(|| default.to_string());
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.database_path, PathBuf::from("reviewers.db"));
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.selection_seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DB_TYPE", "memory"),
            ("REQUEST_TIMEOUT_SECS", "2"),
            ("SELECTION_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(config.http_addr.port(), 9000);
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.request_timeout, Duration::from_secs(2));
        assert_eq!(config.selection_seed, Some(42));
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = config_from(&[("DB_TYPE", "  "), ("DB_PATH", "")]).unwrap();
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.database_path, PathBuf::from("reviewers.db"));
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = config_from(&[("DB_TYPE", "postgres")]).unwrap_err();
        assert!(err.to_string().contains("DB_TYPE"));

        let err = config_from(&[("REQUEST_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));
    }
}
