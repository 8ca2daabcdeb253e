//! Commands of the `invrecon` runner.
//!
//! Scan-result files hold one JSON object keyed by plugin name, each value
//! shaped `{"device": {...}, "results_priority": {...}}`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use invrecon_model::ScanResults;
use invrecon_reconcile::{merge, InventoryEngine, ReconcileConfig};
use invrecon_storage::{InventoryStore, StoreOptions};
use invrecon_types::DeviceId;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "invrecon")]
#[command(about = "Reconcile hardware inventory scans into a device database")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the merged payload of one or more scan-result files
    Merge {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Drop fields every source agrees on
        #[arg(long)]
        only_multiple: bool,
    },

    /// Print the ids of the devices a scan matches
    Candidates {
        /// Path to the inventory database
        #[arg(long)]
        db: PathBuf,
        file: PathBuf,
    },

    /// Select the best values of a scan and save them
    Apply {
        /// Path to the inventory database
        #[arg(long)]
        db: PathBuf,
        file: PathBuf,

        /// The scanned address is a management address
        #[arg(long)]
        management: bool,

        /// TOML file with save and plugin priorities
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the snapshot of a stored device
    Export {
        /// Path to the inventory database
        #[arg(long)]
        db: PathBuf,
        device_id: DeviceId,
    },
}

/// Reads a scan-result file.
pub fn load_results(path: &Path) -> Result<ScanResults> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let results: ScanResults = serde_json::from_str(&contents)
        .with_context(|| format!("parsing scan results in {}", path.display()))?;
    debug!("loaded {} plugin results from {}", results.len(), path.display());
    Ok(results)
}

fn open_engine(db: &Path, config: Option<&Path>) -> Result<InventoryEngine> {
    let store = InventoryStore::open(db, &StoreOptions::default())
        .with_context(|| format!("opening database {}", db.display()))?;
    let config = match config {
        Some(path) => ReconcileConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ReconcileConfig::default(),
    };
    Ok(InventoryEngine::new(store, config))
}

/// Runs a command and returns the JSON document it prints.
pub fn execute(command: &Command) -> Result<Value> {
    match command {
        Command::Merge {
            files,
            only_multiple,
        } => {
            let scans = files
                .iter()
                .map(|path| load_results(path))
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&ScanResults> = scans.iter().collect();
            Ok(serde_json::to_value(merge(&refs, *only_multiple))?)
        }
        Command::Candidates { db, file } => {
            let results = load_results(file)?;
            let engine = open_engine(db, None)?;
            let ids = engine.find_candidates(&[&results])?;
            Ok(serde_json::to_value(ids)?)
        }
        Command::Apply {
            db,
            file,
            management,
            config,
        } => {
            let results = load_results(file)?;
            let engine = open_engine(db, config.as_deref())?;
            let outcome = engine
                .automerge(&results, *management)
                .with_context(|| format!("saving {}", file.display()))?;
            Ok(serde_json::to_value(outcome)?)
        }
        Command::Export { db, device_id } => {
            let engine = open_engine(db, None)?;
            let snapshot = engine
                .export(*device_id)
                .with_context(|| format!("exporting device {device_id}"))?;
            Ok(json!({ "device": snapshot }))
        }
    }
}
