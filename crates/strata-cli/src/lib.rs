//! # strata-cli
//!
//! Command-line interface for the strata cube catalog.
//!
//! ## Commands
//!
//! - `strata registry add|list|remove` - Manage registry definitions
//! - `strata refresh` - Sync cube metadata from the remote registries
//! - `strata health` - Probe a registry or one of its cubes
//! - `strata cubes` - List catalogued cubes
//! - `strata compile` - Print the document a query would post
//! - `strata query` - Run a query and print its rows
//!
//! ## Configuration
//!
//! Settings come from `STRATA_*` environment variables (see
//! [`strata_core::Config`]); the flags below override them:
//!
//! - `STRATA_CATALOG_PATH` / `--catalog` - Catalog snapshot file
//! - `STRATA_CALLER_IDENTITY` / `--identity` - Identity sent as `X-User-Id`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use strata_core::Config;

pub use session::Session;

/// Strata CLI - cube catalog sync and policy-checked queries.
#[derive(Debug, Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Catalog snapshot file.
    #[arg(long, env = "STRATA_CATALOG_PATH")]
    pub catalog: Option<PathBuf>,

    /// Caller identity sent with every remote request.
    #[arg(long, env = "STRATA_CALLER_IDENTITY")]
    pub identity: Option<String>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Environment configuration with the flags applied on top.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment variable is malformed or the
    /// resulting configuration is invalid.
    pub fn config(&self) -> Result<Config> {
        let mut config = Config::from_env()?;
        if let Some(path) = &self.catalog {
            config.catalog_path.clone_from(path);
        }
        if let Some(identity) = &self.identity {
            config.caller_identity.clone_from(identity);
        }
        config.validate()?;
        Ok(config)
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage registry definitions.
    Registry(commands::registry::RegistryArgs),
    /// Sync cube metadata from the remote registries.
    Refresh(commands::refresh::RefreshArgs),
    /// Probe a registry or one of its cubes.
    Health(commands::health::HealthArgs),
    /// List catalogued cubes.
    Cubes(commands::cubes::CubesArgs),
    /// Print the document a query would post, without sending it.
    Compile(commands::query::QueryArgs),
    /// Run a query and print its rows.
    Query(commands::query::QueryArgs),
}

/// Runs one subcommand against an open session.
///
/// # Errors
///
/// Returns whatever the subcommand returns.
pub async fn dispatch(command: Commands, session: &Session) -> Result<()> {
    use commands::{cubes, health, query, refresh, registry};

    match command {
        Commands::Registry(args) => registry::execute(args, session),
        Commands::Refresh(args) => refresh::execute(args, session).await,
        Commands::Health(args) => health::execute(args, session).await,
        Commands::Cubes(args) => cubes::execute(&args, session),
        Commands::Compile(args) => query::compile(&args, session),
        Commands::Query(args) => query::execute(&args, session).await,
    }
}

/// Describes every metric the sync engine and query service record.
///
/// Descriptions reach whichever recorder is installed at the time of the call.
pub fn register_metrics() {
    strata_sync::metrics::register_metrics();
    strata_query::metrics::register_metrics();
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };

    #[derive(Default)]
    struct DescribedNames(Mutex<Vec<String>>);

    impl DescribedNames {
        fn push(&self, key: &KeyName) {
            self.0.lock().unwrap().push(key.as_str().to_string());
        }
    }

    impl Recorder for DescribedNames {
        fn describe_counter(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.push(&key);
        }
        fn describe_gauge(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.push(&key);
        }
        fn describe_histogram(&self, key: KeyName, _: Option<Unit>, _: SharedString) {
            self.push(&key);
        }
        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }
        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }
        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn every_recorded_metric_is_described() {
        let recorder = DescribedNames::default();
        metrics::with_local_recorder(&recorder, register_metrics);

        let described = recorder.0.lock().unwrap();
        for name in [
            strata_sync::metrics::CUBES_SYNCED,
            strata_sync::metrics::CUBES_PRUNED,
            strata_sync::metrics::REGISTRY_REFRESH_DURATION,
            strata_query::metrics::QUERY_REJECTIONS,
            strata_query::metrics::QUERY_NO_DATA,
            strata_query::metrics::QUERY_DURATION,
        ] {
            assert!(described.iter().any(|d| d == name), "{name} not described");
        }
    }

    #[test]
    fn flags_override_environment_defaults() {
        let cli = Cli::parse_from([
            "strata",
            "--catalog",
            "/tmp/catalog.json",
            "--identity",
            "analyst",
            "--format",
            "json",
            "cubes",
        ]);

        let config = cli.config().unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/catalog.json"));
        assert_eq!(config.caller_identity, "analyst");
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Cubes(_)));
    }
}
