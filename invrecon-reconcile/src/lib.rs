//! Inventory reconciliation.
//!
//! Turns scan snapshots into persisted devices:
//!
//! - [`merge()`] combines the payloads of several plugins, grouping values the
//!   sources agree on
//! - [`find_candidates`] resolves a scan to persisted devices by id, serial
//!   number or MAC address
//! - [`DeviceReconciler`] applies a snapshot to a device; per component class
//!   it delegates to [`ComponentReconciler`], which matches rows through the
//!   class's unique-key groups ([`matcher`]) and shares models through
//!   [`resolve_model`]
//! - [`export_device`] is the inverse, producing the snapshot a device would
//!   be reconciled from
//! - [`Automerger`] picks one value per field and saves a scan end to end
//!
//! [`InventoryEngine`] wraps each device pass in one store transaction, so a
//! failed pass leaves no partial state behind.

mod automerge;
mod candidates;
mod component;
mod config;
mod device;
mod error;
mod export;
pub mod matcher;
mod merge;
mod outcome;
mod registry;

pub use automerge::{external_priorities, Automerger, ExternalPriorities, DATABASE_SOURCE, MERGED_SOURCE};
pub use candidates::{find_candidates, single_candidate, Lookup};
pub use component::ComponentReconciler;
pub use config::{PluginConfig, ReconcileConfig, SavePolicy};
pub use device::DeviceReconciler;
pub use error::{ModelError, ModelResult, ReconcileError, ReconcileResult};
pub use export::export_device;
pub use merge::{merge, MergedData, MergedField, SourceSet};
pub use outcome::{Outcome, Warnings};
pub use registry::resolve_model;

use invrecon_model::{Device, ScanResults, Snapshot};
use invrecon_storage::InventoryStore;
use invrecon_types::{DeviceId, Priority};
use std::collections::BTreeSet;
use tracing::info;

/// Entry point tying the store and configuration together.
pub struct InventoryEngine {
    store: InventoryStore,
    config: ReconcileConfig,
}

impl InventoryEngine {
    pub fn new(store: InventoryStore, config: ReconcileConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &InventoryStore {
        &self.store
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconciles a snapshot into an existing device, or into a new one when
    /// `device` is `None`, as one transaction.
    pub fn reconcile(
        &self,
        device: Option<DeviceId>,
        snapshot: &Snapshot,
        priority: Priority,
    ) -> ReconcileResult<Outcome> {
        let policy = self.config.policy(priority);
        self.store.transaction(|tx| {
            let current = match device {
                Some(id) => tx.get_device(id)?.ok_or(ReconcileError::DeviceNotFound(id))?,
                None => Device::new(),
            };
            let mut warnings = Warnings::new();
            let saved = DeviceReconciler::new(tx, policy).reconcile_device(current, snapshot, &mut warnings)?;
            info!(
                "reconciled device {} at priority {} ({} warnings)",
                saved.id,
                priority,
                warnings.len()
            );
            Ok(Outcome {
                device_id: Some(saved.id),
                warnings,
            })
        })
    }

    /// Persisted devices the scans may describe.
    pub fn find_candidates(&self, sources: &[&ScanResults]) -> ReconcileResult<BTreeSet<DeviceId>> {
        self.store.read(|tx| find_candidates(tx, sources))
    }

    /// Exports a persisted device as a snapshot.
    pub fn export(&self, id: DeviceId) -> ReconcileResult<Snapshot> {
        self.store.read(|tx| export_device(tx, id))
    }

    /// Runs the automerger on one scan.
    pub fn automerge(&self, results: &ScanResults, is_management: bool) -> ReconcileResult<Outcome> {
        Automerger::new(&self.store, &self.config).save(results, is_management)
    }
}
