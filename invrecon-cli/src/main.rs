//! Inventory reconciliation runner.
//!
//! Usage:
//!   invrecon merge puppet.json snmp.json --only-multiple
//!   invrecon apply --db inventory.db scan.json --config reconcile.toml
//!   invrecon export --db inventory.db 0192f0c4-...
//!
//! Results are printed to stdout as JSON, logs go to stderr.

use anyhow::Result;
use clap::Parser;
use invrecon_cli::{execute, Cli};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let output = execute(&cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
