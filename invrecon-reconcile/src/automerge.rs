//! Choosing one value per field from merged scan results, and saving them.

use crate::candidates::{find_candidates, single_candidate};
use crate::config::ReconcileConfig;
use crate::device::DeviceReconciler;
use crate::error::ReconcileResult;
use crate::export::export_device;
use crate::merge::{merge, MergedData, MergedField};
use crate::outcome::{Outcome, Warnings};
use invrecon_model::{keys, Device, PluginResult, ScanResults, Snapshot};
use invrecon_storage::{InventoryStore, StoreTx};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Pseudo-source holding a reviewed proposition; always preferred.
pub const MERGED_SOURCE: &str = "merged";

/// Pseudo-source holding the persisted state of the matched device.
pub const DATABASE_SOURCE: &str = "database";

/// Per-plugin, per-field priorities plugins sent along with their results.
pub type ExternalPriorities = BTreeMap<String, BTreeMap<String, i32>>;

/// Collects the `results_priority` maps plugins attached to their results.
#[must_use]
pub fn external_priorities(results: &ScanResults) -> ExternalPriorities {
    results
        .iter()
        .filter_map(|(plugin, result)| {
            result
                .results_priority
                .as_ref()
                .map(|p| (plugin.clone(), p.clone()))
        })
        .collect()
}

/// Selects values from merged results and saves them to the inventory.
pub struct Automerger<'a> {
    store: &'a InventoryStore,
    config: &'a ReconcileConfig,
}

impl<'a> Automerger<'a> {
    pub fn new(store: &'a InventoryStore, config: &'a ReconcileConfig) -> Self {
        Self { store, config }
    }

    /// Picks the source whose value wins for `field`.
    ///
    /// A `merged` proposition always wins. Otherwise the plugin with the
    /// highest positive priority for the field, configured or sent by the
    /// plugin itself, wins; with no such plugin the persisted value is kept.
    /// Hostnames reported for a management address are never trusted.
    #[must_use]
    pub fn best_source(
        &self,
        field: &str,
        sources: &BTreeSet<&str>,
        external: &ExternalPriorities,
        is_management: bool,
    ) -> String {
        if sources.contains(MERGED_SOURCE) {
            return MERGED_SOURCE.to_string();
        }
        let mut top: Option<&str> = None;
        let mut top_priority = 0;
        for plugin in sources {
            let priority = self.config.plugin_priority(plugin, field);
            if priority > top_priority {
                top_priority = priority;
                top = Some(*plugin);
            }
        }
        for plugin in sources {
            let priority = external
                .get(*plugin)
                .and_then(|p| p.get(field))
                .copied()
                .unwrap_or(0);
            if priority > top_priority {
                top_priority = priority;
                top = Some(*plugin);
            }
        }
        match top {
            Some(plugin) if !(field == keys::HOSTNAME && is_management) => plugin.to_string(),
            _ => DATABASE_SOURCE.to_string(),
        }
    }

    /// Builds a snapshot holding the winning value of every merged field.
    /// Fields whose winning source reported nothing are left out.
    #[must_use]
    pub fn select(
        &self,
        merged: &MergedData,
        external: &ExternalPriorities,
        is_management: bool,
    ) -> Snapshot {
        let mut selected = Snapshot::new();
        for (field, values) in merged {
            let sources: BTreeSet<&str> = values.keys().flat_map(|set| set.iter()).collect();
            let best = self.best_source(field, &sources, external, is_management);
            if let Some(value) = value_from(values, &best) {
                debug!("{}: taking the value reported by {}", field, best);
                selected.insert(field.clone(), value.clone());
            }
        }
        selected
    }

    /// Saves one scan's results in a single transaction.
    ///
    /// A scan matching one persisted device updates it with the values that
    /// differ from what is stored. A scan matching none creates a device,
    /// provided the selected values identify it (serial number or MACs) and
    /// describe it (model name or type). A scan matching several devices is
    /// refused.
    pub fn save(&self, results: &ScanResults, is_management: bool) -> ReconcileResult<Outcome> {
        self.store.transaction(|tx| self.save_in(tx, results, is_management))
    }

    fn save_in(
        &self,
        tx: &StoreTx<'_>,
        results: &ScanResults,
        is_management: bool,
    ) -> ReconcileResult<Outcome> {
        let external = external_priorities(results);
        let policy = self.config.policy(self.config.save_priority);
        let reconciler = DeviceReconciler::new(tx, policy);
        let mut warnings = Warnings::new();

        if let Some(id) = single_candidate(find_candidates(tx, &[results])?)? {
            let current = tx.require_device(id)?;
            let mut database = ScanResults::new();
            database.insert(
                DATABASE_SOURCE.to_string(),
                PluginResult::with_device(export_device(tx, id)?),
            );
            let merged = merge(&[results, &database], true);
            let selected = self.select(&merged, &external, is_management);
            let device = reconciler.reconcile_device(current, &selected, &mut warnings)?;
            info!(
                "automerge updated device {} ({} fields, {} warnings)",
                device.id,
                selected.len(),
                warnings.len()
            );
            return Ok(Outcome {
                device_id: Some(device.id),
                warnings,
            });
        }

        let garbage: ScanResults = results
            .iter()
            .filter(|(_, result)| result.device.as_ref().is_some_and(identifies))
            .map(|(plugin, result)| (plugin.clone(), result.clone()))
            .collect();
        if garbage.is_empty() {
            debug!("no plugin identified a device, nothing to save");
            return Ok(Outcome::default());
        }
        let selected = self.select(&merge(&[&garbage], false), &external, false);
        if !(identifies(&selected) && describes(&selected)) {
            debug!("selected values do not describe a device, not creating one");
            return Ok(Outcome {
                device_id: None,
                warnings,
            });
        }
        let device = reconciler.reconcile_device(Device::new(), &selected, &mut warnings)?;
        info!(
            "automerge created device {} ({} warnings)",
            device.id,
            warnings.len()
        );
        Ok(Outcome {
            device_id: Some(device.id),
            warnings,
        })
    }
}

fn value_from<'m>(values: &'m MergedField, source: &str) -> Option<&'m Value> {
    values
        .iter()
        .find(|(sources, _)| sources.contains(source))
        .map(|(_, value)| value)
}

fn truthy(snapshot: &Snapshot, key: &str) -> bool {
    match snapshot.get(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(_) => true,
    }
}

/// True if the payload carries a serial number or MAC addresses.
fn identifies(snapshot: &Snapshot) -> bool {
    truthy(snapshot, keys::SERIAL_NUMBER) || truthy(snapshot, keys::MAC_ADDRESSES)
}

fn describes(snapshot: &Snapshot) -> bool {
    truthy(snapshot, keys::MODEL_NAME) || truthy(snapshot, keys::TYPE)
}
