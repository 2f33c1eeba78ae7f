//! Strata CLI - the `strata` binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_cli::{Cli, Session, dispatch, register_metrics};
use strata_core::init_logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config()?;

    // Logs go to stderr so command output stays parseable
    if config.debug {
        init_logging(config.log_format());
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }
    register_metrics();
    let session = Session::open(config, cli.format)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(dispatch(cli.command, &session))
}
