//! Registry command - manage registry definitions.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;

use strata_catalog::{DEFAULT_EXPOSED_SCHEMA, NoDependentReports, Registry, RegistrySpec};

use crate::{OutputFormat, Session};

/// Arguments for the registry command.
#[derive(Debug, Args)]
pub struct RegistryArgs {
    /// Registry operation.
    #[command(subcommand)]
    pub command: RegistryCommand,
}

/// Registry operations.
#[derive(Debug, Subcommand)]
pub enum RegistryCommand {
    /// Add a registry definition.
    Add(AddArgs),
    /// List registry definitions.
    List,
    /// Remove a registry and every cube it owns.
    Remove(RemoveArgs),
}

/// Arguments for `registry add`.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Unique registry name.
    #[arg()]
    pub name: String,

    /// Remote host name.
    #[arg(long)]
    pub host: String,

    /// Remote port.
    #[arg(long)]
    pub port: u16,

    /// API base path below the host.
    #[arg(long)]
    pub base_path: String,

    /// Cube-list document path below the base path.
    #[arg(long)]
    pub domain_endpoint: String,

    /// Synchronous query endpoint path below the base path.
    #[arg(long)]
    pub sync_endpoint: String,

    /// Key of the cube list in the remote schema document.
    #[arg(long, default_value = DEFAULT_EXPOSED_SCHEMA)]
    pub schema: String,

    /// Comma-separated cubes to expose (exclusive with --deny).
    #[arg(long)]
    pub allow: Option<String>,

    /// Comma-separated cubes to hide (exclusive with --allow).
    #[arg(long)]
    pub deny: Option<String>,

    /// Result cache timeout in seconds.
    #[arg(long)]
    pub cache_timeout: Option<u32>,
}

impl AddArgs {
    /// The registry definition these flags describe.
    #[must_use]
    pub fn to_spec(&self) -> RegistrySpec {
        RegistrySpec {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            base_path: self.base_path.clone(),
            domain_endpoint: self.domain_endpoint.clone(),
            sync_request_endpoint: self.sync_endpoint.clone(),
            exposed_schema: self.schema.clone(),
            allow_list: self.allow.clone(),
            deny_list: self.deny.clone(),
            cache_timeout: self.cache_timeout,
        }
    }
}

/// Arguments for `registry remove`.
#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Registry name.
    #[arg()]
    pub name: String,
}

/// Execute the registry command.
///
/// # Errors
///
/// Returns an error if the definition is rejected, the registry is unknown,
/// or the catalog cannot be written.
pub fn execute(args: RegistryArgs, session: &Session) -> Result<()> {
    match args.command {
        RegistryCommand::Add(add) => add_registry(&add, session),
        RegistryCommand::List => list_registries(session),
        RegistryCommand::Remove(remove) => remove_registry(&remove.name, session),
    }
}

fn add_registry(args: &AddArgs, session: &Session) -> Result<()> {
    let spec = args.to_spec();
    let id = session
        .catalog()
        .transaction(|t| t.insert_registry(spec))
        .with_context(|| format!("Failed to add registry '{}'", args.name))?;
    session.persist()?;

    let registry = session
        .catalog()
        .read(|t| t.registry(id).cloned())?
        .context("registry vanished after insert")?;
    match session.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry)?),
        OutputFormat::Text => {
            println!("Registry {} added ({})", registry.name.green(), registry.domain_url());
        }
    }
    Ok(())
}

fn list_registries(session: &Session) -> Result<()> {
    let registries: Vec<Registry> = session
        .catalog()
        .read(|t| t.registries().cloned().collect())?;

    match session.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registries)?),
        OutputFormat::Text => {
            if registries.is_empty() {
                println!("No registries defined");
                return Ok(());
            }
            for registry in &registries {
                let refreshed = registry
                    .metadata_last_refreshed
                    .map_or_else(|| "never".to_string(), |at| at.to_rfc3339());
                println!("  {} {}", registry.name.bold(), registry.domain_url().dimmed());
                println!("    Exposure:  {:?}", registry.exposure);
                println!("    Refreshed: {refreshed}");
            }
        }
    }
    Ok(())
}

fn remove_registry(name: &str, session: &Session) -> Result<()> {
    let id = session.registry_id(name)?;
    // Report definitions live outside this tool, so nothing can block the delete here.
    let removed = session
        .catalog()
        .transaction(|t| t.delete_registry(id, &NoDependentReports))
        .with_context(|| format!("Failed to remove registry '{name}'"))?;
    session.persist()?;

    match session.format() {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&removed)?),
        OutputFormat::Text => {
            println!("Registry {name} removed with {} cube(s)", removed.len());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RegistryArgs,
    }

    #[test]
    fn add_args_build_a_spec() {
        let cli = TestCli::parse_from([
            "test",
            "add",
            "prod",
            "--host",
            "olap.internal",
            "--port",
            "4080",
            "--base-path",
            "reporting_ws/api/v2",
            "--domain-endpoint",
            "async/flattenDomain",
            "--sync-endpoint",
            "schemas/reporting/irsync",
            "--deny",
            "raw_events",
        ]);
        let RegistryCommand::Add(add) = cli.args.command else {
            panic!("expected add");
        };
        let spec = add.to_spec();
        assert_eq!(spec.name, "prod");
        assert_eq!(spec.port, 4080);
        assert_eq!(spec.exposed_schema, "reporting");
        assert_eq!(spec.deny_list.as_deref(), Some("raw_events"));
        assert!(spec.allow_list.is_none());
    }

    #[test]
    fn remove_takes_a_name() {
        let cli = TestCli::parse_from(["test", "remove", "prod"]);
        assert!(matches!(cli.args.command, RegistryCommand::Remove(RemoveArgs { name }) if name == "prod"));
    }
}
