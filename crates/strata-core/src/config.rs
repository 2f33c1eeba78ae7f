//! Runtime configuration.
//!
//! Values come from `Default`, then from `STRATA_*` environment variables.
//! Binaries may layer command-line flags on top.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::observability::LogFormat;

/// Default caller identity sent in `X-User-Id`.
pub const DEFAULT_CALLER_IDENTITY: &str = "strata";

/// Configuration shared by the sync engine, query service and CLI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Identity sent to the remote service with every request.
    #[serde(default = "default_caller_identity")]
    pub caller_identity: String,

    /// Per-request timeout for remote calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of cubes synced concurrently within one registry.
    #[serde(default = "default_sync_concurrency")]
    pub sync_concurrency: usize,

    /// Lookback applied when a cube has no `SyncRequest` policy for the grain.
    #[serde(default = "default_max_days")]
    pub max_days_lookback_sync: u32,

    /// Window applied when a cube has no `SyncRequest` policy for the grain.
    #[serde(default = "default_max_days")]
    pub max_days_window_sync: u32,

    /// Hard ceiling on the number of rows a single query may request.
    #[serde(default = "default_row_limit_ceiling")]
    pub row_limit_ceiling: u32,

    /// Cubes whose `Hour` column is passed through without timestamp synthesis.
    #[serde(default)]
    pub hour_passthrough_cubes: Vec<String>,

    /// Location of the catalog snapshot.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Development mode (pretty logs).
    #[serde(default)]
    pub debug: bool,
}

fn default_caller_identity() -> String {
    DEFAULT_CALLER_IDENTITY.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_sync_concurrency() -> usize {
    4
}

const fn default_max_days() -> u32 {
    30
}

const fn default_row_limit_ceiling() -> u32 {
    1000
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("strata-catalog.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            caller_identity: default_caller_identity(),
            request_timeout_secs: default_request_timeout_secs(),
            sync_concurrency: default_sync_concurrency(),
            max_days_lookback_sync: default_max_days(),
            max_days_window_sync: default_max_days(),
            row_limit_ceiling: default_row_limit_ceiling(),
            hour_passthrough_cubes: Vec::new(),
            catalog_path: default_catalog_path(),
            debug: false,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables over the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to a value that cannot be parsed
    /// or violates a bound.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(identity) = env_string("STRATA_CALLER_IDENTITY") {
            config.caller_identity = identity;
        }
        if let Some(timeout) = env_u64("STRATA_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = timeout;
        }
        if let Some(concurrency) = env_u64("STRATA_SYNC_CONCURRENCY")? {
            config.sync_concurrency = usize::try_from(concurrency).map_err(|_| {
                Error::InvalidInput("STRATA_SYNC_CONCURRENCY is out of range".to_string())
            })?;
        }
        if let Some(days) = env_u32("STRATA_MAX_DAYS_LOOKBACK_SYNC")? {
            config.max_days_lookback_sync = days;
        }
        if let Some(days) = env_u32("STRATA_MAX_DAYS_WINDOW_SYNC")? {
            config.max_days_window_sync = days;
        }
        if let Some(ceiling) = env_u32("STRATA_ROW_LIMIT_CEILING")? {
            config.row_limit_ceiling = ceiling;
        }
        if let Some(cubes) = env_string("STRATA_HOUR_PASSTHROUGH_CUBES") {
            config.hour_passthrough_cubes = split_list(&cubes);
        }
        if let Some(path) = env_string("STRATA_CATALOG_PATH") {
            config.catalog_path = PathBuf::from(path);
        }
        if let Some(debug) = env_bool("STRATA_DEBUG")? {
            config.debug = debug;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates bounds that the defaults always satisfy.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric setting is zero where that makes no sense.
    pub fn validate(&self) -> Result<()> {
        if self.sync_concurrency == 0 {
            return Err(Error::InvalidInput(
                "STRATA_SYNC_CONCURRENCY must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "STRATA_REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }
        if self.row_limit_ceiling == 0 {
            return Err(Error::InvalidInput(
                "STRATA_ROW_LIMIT_CEILING must be greater than 0".to_string(),
            ));
        }
        if self.caller_identity.trim().is_empty() {
            return Err(Error::InvalidInput(
                "STRATA_CALLER_IDENTITY cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Log format implied by the debug flag.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        if self.debug {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn env_u32(name: &str) -> Result<Option<u32>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u32>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u32: {e}")))
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    v.parse::<u64>()
        .map(Some)
        .map_err(|e| Error::InvalidInput(format!("{name} must be a u64: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    let value = value.trim().to_ascii_lowercase();
    match value.as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        _ => Err(Error::InvalidInput(format!(
            "{name} must be a boolean (true/false/1/0)"
        ))),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    let Some(v) = env_string(name) else {
        return Ok(None);
    };
    parse_bool(name, &v).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.row_limit_ceiling, 1000);
        assert_eq!(config.caller_identity, "strata");
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = Config {
            sync_concurrency: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn split_list_trims_and_drops_blanks() {
        assert_eq!(
            split_list(" a, b ,,c "),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn deserializes_partial_documents_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"caller_identity":"analyst","debug":true}"#).unwrap();
        assert_eq!(config.caller_identity, "analyst");
        assert_eq!(config.sync_concurrency, 4);
        assert_eq!(config.log_format(), LogFormat::Pretty);
    }
}
