//! Inventory data model.
//!
//! Defines the types every other layer depends on:
//! - [`Device`], [`DeviceModel`], [`Component`], [`ComponentModel`],
//!   [`IpAddress`]: the persisted records
//! - [`ComponentSchema`]: the closed per-class table of writable fields,
//!   unique-key groups and model semantics
//! - [`Snapshot`] / [`ScanResults`]: the payload shapes probes produce and
//!   the exporter emits

mod record;
mod schema;
mod snapshot;

pub use record::{
    Component, ComponentModel, Device, DeviceModel, FieldPriorities, IpAddress,
    UNKNOWN_DEVICE_NAME,
};
pub use schema::{
    schema_for, truncate_family, ComponentSchema, FieldMapping, FieldType, ModelSpec,
    DEVICE_COLUMN, INDEX_COLUMN, MAX_FAMILY_LEN,
};
pub use snapshot::{keys, value_to_string, PluginResult, Row, ScanResults, Snapshot};
