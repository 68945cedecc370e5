//! Service settings read from the environment.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use metacatalog_repository::config::{DEFAULT_CONTEXT, DEFAULT_REGISTRY_INDEX};
use metacatalog_repository::{CallPolicy, CatalogConfig};
use tracing::warn;

use crate::errors::AppError;

/// Default search engine URL.
const DEFAULT_ELASTIC_NODE: &str = "http://localhost:9200";

/// Default HTTP bind address.
const DEFAULT_LISTEN: &str = "127.0.0.1:5000";

/// Default per-call engine timeout in milliseconds.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default retries on transient engine faults.
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Connection mode for the search engine at start-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry connection at a fixed interval until successful.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if invalid.
    fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            _ => {
                warn!(value = %value, "Invalid METACATALOG_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Everything the service reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine_url: String,
    pub listen: SocketAddr,
    pub registry_index: String,
    pub default_context: String,
    pub definitions_dir: Option<PathBuf>,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    pub log_format: LogFormat,
}

impl Settings {
    /// Read settings from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `ELASTIC_NODE`: Search engine URL (default: http://localhost:9200)
    /// - `METACATALOG_LISTEN`: HTTP bind address (default: 127.0.0.1:5000)
    /// - `METACATALOG_REGISTRY_INDEX`: Registry index (default: index_list_v1)
    /// - `METACATALOG_DEFAULT_CONTEXT`: Global default context (default: meta)
    /// - `METACATALOG_DEFINITIONS_DIR`: Directory of `<name>.json` mapping definitions (optional)
    /// - `METACATALOG_REQUEST_TIMEOUT_MS`: Per engine call timeout (default: 10000)
    /// - `METACATALOG_MAX_RETRIES`: Retries on transient engine faults (default: 2)
    /// - `METACATALOG_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `METACATALOG_RETRY_INTERVAL_SECS`: Connection retry interval (default: 15)
    /// - `LOG_FORMAT`: "pretty" or "json" (default: pretty)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let listen_raw = var("METACATALOG_LISTEN").unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = listen_raw.parse::<SocketAddr>().map_err(|e| {
            AppError::config(format!("invalid METACATALOG_LISTEN '{}': {}", listen_raw, e))
        })?;

        let request_timeout_ms = match var("METACATALOG_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                AppError::config(format!(
                    "invalid METACATALOG_REQUEST_TIMEOUT_MS '{}': {}",
                    raw, e
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };
        let max_retries = match var("METACATALOG_MAX_RETRIES") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                AppError::config(format!("invalid METACATALOG_MAX_RETRIES '{}': {}", raw, e))
            })?,
            None => DEFAULT_MAX_RETRIES,
        };
        let retry_interval = match var("METACATALOG_RETRY_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|e| {
                AppError::config(format!(
                    "invalid METACATALOG_RETRY_INTERVAL_SECS '{}': {}",
                    raw, e
                ))
            })?,
            None => DEFAULT_RETRY_INTERVAL_SECS,
        };

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            engine_url: var("ELASTIC_NODE").unwrap_or_else(|| DEFAULT_ELASTIC_NODE.to_string()),
            listen,
            registry_index: var("METACATALOG_REGISTRY_INDEX")
                .unwrap_or_else(|| DEFAULT_REGISTRY_INDEX.to_string()),
            default_context: var("METACATALOG_DEFAULT_CONTEXT")
                .unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            definitions_dir: var("METACATALOG_DEFINITIONS_DIR").map(PathBuf::from),
            request_timeout: Duration::from_millis(request_timeout_ms),
            max_retries,
            connection_mode: var("METACATALOG_CONNECTION_MODE")
                .map(|mode| ConnectionMode::parse(&mode))
                .unwrap_or(ConnectionMode::Retry),
            retry_interval: Duration::from_secs(retry_interval),
            log_format,
        })
    }

    /// Timeout and retry policy for engine calls.
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy::new(self.request_timeout, self.max_retries)
    }

    /// Component configuration for the catalog.
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::default()
            .with_registry_index(self.registry_index.clone())
            .with_default_context(self.default_context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.engine_url, "http://localhost:9200");
        assert_eq!(s.listen, "127.0.0.1:5000".parse().unwrap());
        assert_eq!(s.registry_index, "index_list_v1");
        assert_eq!(s.default_context, "meta");
        assert_eq!(s.definitions_dir, None);
        assert_eq!(s.request_timeout, Duration::from_secs(10));
        assert_eq!(s.max_retries, 2);
        assert_eq!(s.connection_mode, ConnectionMode::Retry);
        assert_eq!(s.retry_interval, Duration::from_secs(15));
        assert_eq!(s.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("ELASTIC_NODE", "http://search:9200"),
            ("METACATALOG_LISTEN", "0.0.0.0:8080"),
            ("METACATALOG_DEFAULT_CONTEXT", "hydro"),
            ("METACATALOG_DEFINITIONS_DIR", "/etc/metacatalog/definitions"),
            ("METACATALOG_REQUEST_TIMEOUT_MS", "2500"),
            ("METACATALOG_MAX_RETRIES", "0"),
            ("METACATALOG_CONNECTION_MODE", "Fail-Fast"),
            ("METACATALOG_RETRY_INTERVAL_SECS", "3"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(s.engine_url, "http://search:9200");
        assert_eq!(s.listen.port(), 8080);
        assert_eq!(s.catalog_config().default_context, "hydro");
        assert_eq!(
            s.definitions_dir,
            Some(PathBuf::from("/etc/metacatalog/definitions"))
        );
        assert_eq!(s.call_policy().request_timeout, Duration::from_millis(2500));
        assert_eq!(s.call_policy().max_retries, 0);
        assert_eq!(s.connection_mode, ConnectionMode::FailFast);
        assert_eq!(s.retry_interval, Duration::from_secs(3));
        assert_eq!(s.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            settings(&[("METACATALOG_LISTEN", "not-an-address")]),
            Err(AppError::ConfigError(_))
        ));
        assert!(matches!(
            settings(&[("METACATALOG_MAX_RETRIES", "many")]),
            Err(AppError::ConfigError(_))
        ));
        for raw in ["soon", "-5", "1.5"] {
            let err = settings(&[("METACATALOG_RETRY_INTERVAL_SECS", raw)]).unwrap_err();
            assert!(matches!(err, AppError::ConfigError(_)), "{}", err);
            assert!(err.to_string().contains("METACATALOG_RETRY_INTERVAL_SECS"));
        }
    }

    #[test]
    fn test_unknown_connection_mode_falls_back_to_retry() {
        let s = settings(&[("METACATALOG_CONNECTION_MODE", "sometimes")]).unwrap();
        assert_eq!(s.connection_mode, ConnectionMode::Retry);
    }
}
