//! Cubes command - list catalogued cubes.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::{Value, json};

use strata_catalog::{CatalogTables, Cube, Lookback};

use crate::{OutputFormat, Session};

/// Arguments for the cubes command.
#[derive(Debug, Args)]
pub struct CubesArgs {
    /// Only list cubes of this registry.
    #[arg(long, short = 'r')]
    pub registry: Option<String>,

    /// Show each cube's lookback and window policy.
    #[arg(long, short = 'p')]
    pub policy: bool,
}

struct CubeListing {
    full_name: String,
    cube: Cube,
    columns: usize,
    metrics: usize,
    policy: Vec<Lookback>,
}

impl CubeListing {
    fn collect(tables: &CatalogTables, cube: &Cube) -> Self {
        let registry_name = tables
            .registry(cube.registry_id)
            .map_or("?", |r| r.name.as_str());
        Self {
            full_name: cube.full_name(registry_name),
            cube: cube.clone(),
            columns: tables.columns_for_cube(cube.id).count(),
            metrics: tables.metrics_for_cube(cube.id).count(),
            policy: tables.lookbacks_for_cube(cube.id).cloned().collect(),
        }
    }

    fn to_json(&self) -> Value {
        json!({
            "name": self.full_name,
            "cube": self.cube,
            "columns": self.columns,
            "metrics": self.metrics,
            "policy": self.policy,
        })
    }
}

/// Execute the cubes command.
///
/// # Errors
///
/// Returns an error if the registry filter names an unknown registry.
pub fn execute(args: &CubesArgs, session: &Session) -> Result<()> {
    let registry_filter = args
        .registry
        .as_deref()
        .map(|name| session.registry_id(name))
        .transpose()?;

    let listings: Vec<CubeListing> = session.catalog().read(|t| {
        t.cubes()
            .filter(|c| registry_filter.is_none_or(|id| c.registry_id == id))
            .map(|c| CubeListing::collect(t, c))
            .collect()
    })?;

    match session.format() {
        OutputFormat::Json => {
            let entries: Vec<Value> = listings.iter().map(CubeListing::to_json).collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            if listings.is_empty() {
                println!("No cubes found");
                return Ok(());
            }
            for listing in &listings {
                println!(
                    "  {} v{} {} columns, {} metrics",
                    listing.full_name.bold(),
                    listing.cube.cube_version,
                    listing.columns,
                    listing.metrics
                );
                if args.policy {
                    print_policy(&listing.policy);
                }
            }
        }
    }
    Ok(())
}

fn print_policy(policy: &[Lookback]) {
    if policy.is_empty() {
        println!("    {}", "no policy rows".dimmed());
        return;
    }
    for row in policy {
        let days = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |d| d.to_string());
        println!(
            "    {:?} {}: lookback {} days, window {} days",
            row.request_type,
            row.grain,
            days(row.lookback_days),
            days(row.max_window)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CubesArgs,
    }

    #[test]
    fn filters_parse() {
        let cli = TestCli::parse_from(["test", "-r", "prod", "--policy"]);
        assert_eq!(cli.args.registry.as_deref(), Some("prod"));
        assert!(cli.args.policy);
    }
}
