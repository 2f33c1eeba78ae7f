//! Refresh command - sync cube metadata from the remote registries.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::json;

use strata_sync::{CubeOutcome, RefreshReport, RegistryRefresh};

use crate::{OutputFormat, Session};

/// Arguments for the refresh command.
#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Refresh only this registry (default: all registries).
    #[arg(long, short = 'r')]
    pub registry: Option<String>,

    /// List every cube, not just failures.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Execute the refresh command.
///
/// The catalog is written back even when some registries fail, so the
/// cubes that did sync are kept.
///
/// # Errors
///
/// Returns an error if the registry is unknown, any registry pass fails as
/// a whole, or the catalog cannot be written.
pub async fn execute(args: RefreshArgs, session: &Session) -> Result<()> {
    let engine = session.sync_engine();

    let refreshes = match &args.registry {
        Some(name) => {
            let id = session.registry_id(name)?;
            vec![RegistryRefresh {
                registry: name.clone(),
                result: engine.refresh_registry(id).await,
            }]
        }
        None => engine.refresh_all().await?,
    };
    session.persist()?;

    match session.format() {
        OutputFormat::Json => {
            let entries: Vec<_> = refreshes
                .iter()
                .map(|r| match &r.result {
                    Ok(report) => json!({"registry": r.registry, "report": report}),
                    Err(e) => json!({"registry": r.registry, "error": e.to_string()}),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if refreshes.is_empty() {
                println!("No registries defined");
            }
            for refresh in &refreshes {
                match &refresh.result {
                    Ok(report) => print_report(report, args.verbose),
                    Err(e) => println!("{} {}: {}", "FAILED".red(), refresh.registry.bold(), e),
                }
            }
        }
    }

    let failed: Vec<&str> = refreshes
        .iter()
        .filter(|r| r.result.is_err())
        .map(|r| r.registry.as_str())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("Refresh failed for: {}", failed.join(", "));
    }
    Ok(())
}

fn print_report(report: &RefreshReport, verbose: bool) {
    let failures = report.failures().len();
    let synced = report.cubes.len() - failures;
    let status = if failures == 0 {
        "OK".green().to_string()
    } else {
        "PARTIAL".yellow().to_string()
    };
    println!(
        "{status} {}: {synced} synced, {failures} failed, {} pruned",
        report.registry.bold(),
        report.pruned.len()
    );

    for warning in &report.exposed.warnings {
        println!("  {} {warning}", "warning:".yellow());
    }
    for removal in &report.pruned {
        println!("  - {} (no longer exposed)", removal.cube_name.dimmed());
    }
    for outcome in &report.cubes {
        match outcome {
            CubeOutcome::Synced(summary) if verbose => {
                println!(
                    "  {} {} ({} columns, {} new metrics, {} policy rows)",
                    "+".green(),
                    summary.cube,
                    summary.columns,
                    summary.metrics_created,
                    summary.lookbacks
                );
            }
            CubeOutcome::Synced(_) => {}
            CubeOutcome::Failed {
                cube,
                error,
                retryable,
            } => {
                let hint = if *retryable { " (retryable)" } else { "" };
                println!("  {} {cube}: {}{hint}", "x".red(), error.red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RefreshArgs,
    }

    #[test]
    fn registry_is_optional() {
        let cli = TestCli::parse_from(["test"]);
        assert!(cli.args.registry.is_none());

        let cli = TestCli::parse_from(["test", "--registry", "prod", "-v"]);
        assert_eq!(cli.args.registry.as_deref(), Some("prod"));
        assert!(cli.args.verbose);
    }
}
