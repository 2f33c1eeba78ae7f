//! Health command - probe a registry or one of its cubes.

use anyhow::Result;
use clap::Args;
use owo_colors::OwoColorize;
use serde_json::json;

use strata_sync::STATUS_OK;

use crate::{OutputFormat, Session};

/// Arguments for the health command.
#[derive(Debug, Args)]
pub struct HealthArgs {
    /// Registry name.
    #[arg()]
    pub registry: String,

    /// Probe this cube instead of the registry.
    #[arg(long, short = 'c')]
    pub cube: Option<String>,
}

/// Execute the health command.
///
/// # Errors
///
/// Returns an error if the registry is unknown or the probe does not
/// report OK.
pub async fn execute(args: HealthArgs, session: &Session) -> Result<()> {
    let registry_id = session.registry_id(&args.registry)?;
    let status = match &args.cube {
        Some(cube) => {
            session
                .query_service()
                .cube_status(&session.context(), registry_id, cube)
                .await?
        }
        None => session.sync_engine().registry_status(registry_id).await?,
    };
    let healthy = status == STATUS_OK;

    match session.format() {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "registry": args.registry,
                    "cube": args.cube,
                    "status": status,
                    "healthy": healthy,
                }))?
            );
        }
        OutputFormat::Text => {
            let target = args
                .cube
                .as_ref()
                .map_or_else(|| args.registry.clone(), |c| format!("{}.{c}", args.registry));
            if healthy {
                println!("{target}: {}", status.green());
            } else {
                println!("{target}: {}", status.red());
            }
        }
    }

    if !healthy {
        anyhow::bail!("{} is unhealthy", args.registry);
    }
    Ok(())
}
