//! Payload shapes exchanged with probes.
//!
//! A probe reports `{"device": {...}}`; a scan collects one such result per
//! plugin. The exporter emits the same [`Snapshot`] shape, so its output can
//! be fed back through reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One device payload: scalar fields, address lists and component lists.
pub type Snapshot = Map<String, Value>;

/// One flat row of a component list.
pub type Row = Map<String, Value>;

/// Everything one plugin reported for a scanned address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Snapshot>,
    /// Per-field trust the plugin asks for, overriding configured priorities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_priority: Option<BTreeMap<String, i32>>,
}

impl PluginResult {
    #[must_use]
    pub fn with_device(device: Snapshot) -> Self {
        Self {
            device: Some(device),
            results_priority: None,
        }
    }
}

/// Plugin results keyed by plugin name.
pub type ScanResults = BTreeMap<String, PluginResult>;

/// Snapshot keys.
pub mod keys {
    pub const ID: &str = "id";
    pub const SERIAL_NUMBER: &str = "serial_number";
    pub const HOSTNAME: &str = "hostname";
    pub const DATA_CENTER: &str = "data_center";
    pub const RACK: &str = "rack";
    pub const BARCODE: &str = "barcode";
    pub const CHASSIS_POSITION: &str = "chassis_position";
    pub const MODEL_NAME: &str = "model_name";
    pub const TYPE: &str = "type";
    pub const FAMILY: &str = "family";
    pub const MAC_ADDRESSES: &str = "mac_addresses";
    pub const MANAGEMENT_IP_ADDRESSES: &str = "management_ip_addresses";
    pub const SYSTEM_IP_ADDRESSES: &str = "system_ip_addresses";
    pub const SUBDEVICES: &str = "subdevices";

    pub const DISKS: &str = "disks";
    pub const MEMORY: &str = "memory";
    pub const PROCESSORS: &str = "processors";
    pub const FIBRECHANNEL_CARDS: &str = "fibrechannel_cards";
    pub const PARTS: &str = "parts";
    pub const DISK_EXPORTS: &str = "disk_exports";
    pub const DISK_SHARES: &str = "disk_shares";
    pub const INSTALLED_SOFTWARE: &str = "installed_software";

    /// Fields the merger keeps even when only one source reported them.
    pub const ALWAYS_MERGED: &[&str] = &[MODEL_NAME, TYPE];
}

/// String form of a payload value used to compare values across sources.
///
/// Strings map to themselves, everything else to its JSON text, so `12` and
/// `"12"` agree.
#[must_use]
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
