use invrecon_types::{
    AddressId, ComponentClass, ComponentId, ComponentKind, DeviceId, DeviceKind, ModelId,
    Priority,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Name given to devices no probe has reported a hostname for.
pub const UNKNOWN_DEVICE_NAME: &str = "unknown";

/// The priority each field of a record was last written at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPriorities(BTreeMap<String, Priority>);

impl FieldPriorities {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Priority the field was last written at, if it was ever written.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Priority> {
        self.0.get(field).copied()
    }

    /// Claims a field for a write at `priority`.
    ///
    /// Returns false, recording nothing, when the field was last written at a
    /// higher priority and `force` is not set.
    pub fn claim(&mut self, field: &str, priority: Priority, force: bool) -> bool {
        match self.0.get(field) {
            Some(existing) if !force && !priority.may_overwrite(*existing) => false,
            _ => {
                self.0.insert(field.to_string(), priority);
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Priority)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// A device: the root of the inventory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub sn: Option<String>,
    pub barcode: Option<String>,
    pub model_id: Option<ModelId>,
    pub parent_id: Option<DeviceId>,
    pub logical_parent_id: Option<DeviceId>,
    pub dc: Option<String>,
    pub rack: Option<String>,
    pub chassis_position: Option<i64>,
    #[serde(default)]
    pub priorities: FieldPriorities,
}

impl Device {
    /// Creates an unsaved device with no identity fields set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: DeviceId::new(),
            name: UNKNOWN_DEVICE_NAME.to_string(),
            sn: None,
            barcode: None,
            model_id: None,
            parent_id: None,
            logical_parent_id: None,
            dc: None,
            rack: None,
            chassis_position: None,
            priorities: FieldPriorities::new(),
        }
    }

    /// True if the device is attached to `parent` through either relation.
    #[must_use]
    pub fn is_child_of(&self, parent: DeviceId) -> bool {
        self.parent_id == Some(parent) || self.logical_parent_id == Some(parent)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared descriptor of a device's hardware model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceModel {
    pub id: ModelId,
    pub name: String,
    pub kind: DeviceKind,
}

/// Shared descriptor referenced by many components of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentModel {
    pub id: ModelId,
    pub name: String,
    pub family: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub priority: Priority,
}

/// A sub-record owned by exactly one device.
///
/// `data` holds the class's writable columns (see [`crate::ComponentSchema`]);
/// references to other records are stored as id strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub class: ComponentClass,
    pub device_id: DeviceId,
    pub model_id: Option<ModelId>,
    pub data: Map<String, Value>,
    #[serde(default)]
    pub priorities: FieldPriorities,
}

impl Component {
    /// Creates an unsaved, unmodeled component.
    #[must_use]
    pub fn new(class: ComponentClass, device_id: DeviceId) -> Self {
        Self {
            id: ComponentId::new(),
            class,
            device_id,
            model_id: None,
            data: Map::new(),
            priorities: FieldPriorities::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.data.get(column).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, column: &str) -> Option<&str> {
        self.data.get(column).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.data.get(column).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.data.get(column).and_then(|v| v.as_bool())
    }
}

/// An IP address, optionally attached to a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub id: AddressId,
    pub address: String,
    pub device_id: Option<DeviceId>,
    pub is_management: bool,
}

impl IpAddress {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            id: AddressId::new(),
            address: address.into(),
            device_id: None,
            is_management: false,
        }
    }
}
