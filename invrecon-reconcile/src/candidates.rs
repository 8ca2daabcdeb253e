//! Finding the persisted devices a scan may belong to.

use crate::error::{ReconcileError, ReconcileResult};
use invrecon_model::{keys, value_to_string, ScanResults, Snapshot};
use invrecon_storage::StoreTx;
use invrecon_types::{clean_serial, DeviceId, MacAddress};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::debug;

/// Identity keys collected from device payloads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Lookup {
    pub ids: BTreeSet<DeviceId>,
    pub serials: BTreeSet<String>,
    pub macs: BTreeSet<MacAddress>,
}

impl Lookup {
    /// Adds the identity keys of one device payload.
    pub fn add_snapshot(&mut self, snapshot: &Snapshot) {
        if let Some(raw) = snapshot.get(keys::ID).filter(|v| !v.is_null()) {
            match DeviceId::parse(&value_to_string(raw)) {
                Ok(id) => {
                    self.ids.insert(id);
                }
                Err(err) => debug!("ignoring device id {}: {}", raw, err),
            }
        }
        if let Some(sn) = snapshot
            .get(keys::SERIAL_NUMBER)
            .filter(|v| !v.is_null())
            .and_then(|v| clean_serial(&value_to_string(v)))
        {
            self.serials.insert(sn);
        }
        if let Some(Value::Array(macs)) = snapshot.get(keys::MAC_ADDRESSES) {
            for raw in macs {
                let Some(text) = raw.as_str() else { continue };
                match MacAddress::parse(text) {
                    Ok(mac) if !mac.is_blacklisted() => {
                        self.macs.insert(mac);
                    }
                    Ok(mac) => debug!("ignoring blacklisted MAC {}", mac),
                    Err(err) => debug!("ignoring {}", err),
                }
            }
        }
    }

    /// Adds every plugin's device payload of a scan.
    pub fn add_results(&mut self, results: &ScanResults) {
        for result in results.values() {
            if let Some(device) = &result.device {
                self.add_snapshot(device);
            }
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.serials.is_empty() && self.macs.is_empty()
    }

    /// Devices matching any collected id, serial number or MAC.
    pub fn resolve(&self, tx: &StoreTx<'_>) -> ReconcileResult<BTreeSet<DeviceId>> {
        let mut found = BTreeSet::new();
        for id in &self.ids {
            if tx.get_device(*id)?.is_some() {
                found.insert(*id);
            }
        }
        for sn in &self.serials {
            if let Some(device) = tx.find_device_by_sn(sn)? {
                found.insert(device.id);
            }
        }
        for mac in &self.macs {
            found.extend(tx.find_device_ids_by_mac(mac.as_str())?);
        }
        Ok(found)
    }
}

/// Devices any of the given scans may describe, matched by explicit id,
/// serial number or MAC address.
///
/// More than one candidate is an ambiguous match; the caller decides what
/// to do with it (see [`single_candidate`]).
pub fn find_candidates(
    tx: &StoreTx<'_>,
    sources: &[&ScanResults],
) -> ReconcileResult<BTreeSet<DeviceId>> {
    let mut lookup = Lookup::default();
    for results in sources {
        lookup.add_results(results);
    }
    lookup.resolve(tx)
}

/// Narrows a candidate set to at most one device, refusing to guess.
pub fn single_candidate(candidates: BTreeSet<DeviceId>) -> ReconcileResult<Option<DeviceId>> {
    if candidates.len() > 1 {
        return Err(ReconcileError::MultipleCandidates(
            candidates.into_iter().collect(),
        ));
    }
    Ok(candidates.into_iter().next())
}
