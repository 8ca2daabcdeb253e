//! Reconciliation of a whole device snapshot.

use crate::candidates::{single_candidate, Lookup};
use crate::component::ComponentReconciler;
use crate::config::SavePolicy;
use crate::error::ReconcileResult;
use crate::outcome::Warnings;
use invrecon_model::{
    keys, value_to_string, ComponentSchema, Device, DeviceModel, FieldPriorities, FieldType,
    IpAddress, Row, Snapshot,
};
use invrecon_storage::StoreTx;
use invrecon_types::{
    clean_serial, ComponentClass, DeviceId, DeviceKind, MacAddress, ModelId,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Mount row keys resolved into references before matching.
const MOUNT_SHARE: &str = "share";
const MOUNT_ADDRESS: &str = "address";
const MOUNT_SERVER: &str = "server";

fn present<'s>(snapshot: &'s Snapshot, key: &str) -> Option<&'s Value> {
    snapshot.get(key).filter(|v| !v.is_null())
}

fn text(snapshot: &Snapshot, key: &str) -> Option<String> {
    present(snapshot, key)
        .map(value_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Applies a snapshot to a device: identity fields, model, addresses,
/// every component class and, recursively, its subdevices.
pub struct DeviceReconciler<'t, 'c> {
    tx: &'t StoreTx<'c>,
    policy: SavePolicy,
}

impl<'t, 'c> DeviceReconciler<'t, 'c> {
    pub fn new(tx: &'t StoreTx<'c>, policy: SavePolicy) -> Self {
        Self { tx, policy }
    }

    /// Reconciles `snapshot` into `device` and returns the saved device.
    ///
    /// Keys absent from the snapshot leave the matching state untouched; a
    /// present list (even an empty one) replaces it.
    pub fn reconcile_device(
        &self,
        mut device: Device,
        snapshot: &Snapshot,
        warnings: &mut Warnings,
    ) -> ReconcileResult<Device> {
        self.set_identity(&mut device, snapshot, warnings)?;
        self.resolve_device_model(&mut device, snapshot)?;
        self.tx.save_device(&device)?;

        for (key, is_management) in [
            (keys::MANAGEMENT_IP_ADDRESSES, true),
            (keys::SYSTEM_IP_ADDRESSES, false),
        ] {
            if let Some(items) = list(snapshot, key, warnings) {
                self.update_addresses(device.id, items, is_management, warnings)?;
            }
        }

        let components = ComponentReconciler::new(self.tx, self.policy);
        for schema in ComponentSchema::all() {
            if let Some(rows) = self.rows_for(schema, snapshot, warnings)? {
                components.reconcile(device.id, schema, rows)?;
            }
        }

        if let Some(items) = list(snapshot, keys::SUBDEVICES, warnings) {
            self.reconcile_subdevices(&device, items, warnings)?;
        }
        debug!("device {} reconciled", device.id);
        Ok(device)
    }

    fn write<T>(&self, priorities: &mut FieldPriorities, field: &str, slot: &mut T, value: T) {
        if priorities.claim(field, self.policy.priority, self.policy.force) {
            *slot = value;
        } else {
            debug!("keeping device {} written at higher priority", field);
        }
    }

    fn set_identity(
        &self,
        device: &mut Device,
        snapshot: &Snapshot,
        warnings: &mut Warnings,
    ) -> ReconcileResult<()> {
        if let Some(raw) = present(snapshot, keys::SERIAL_NUMBER) {
            match clean_serial(&value_to_string(raw)) {
                Some(sn) => {
                    let owner = self.tx.find_device_by_sn(&sn)?.filter(|d| d.id != device.id);
                    match owner {
                        Some(owner) => warnings.push(format!(
                            "serial number {sn} already belongs to device {}, not assigning it to {}",
                            owner.id, device.id
                        )),
                        None => self.write(&mut device.priorities, "sn", &mut device.sn, Some(sn)),
                    }
                }
                None => debug!("ignoring placeholder serial number {}", raw),
            }
        }
        if let Some(barcode) = text(snapshot, keys::BARCODE) {
            let owner = self
                .tx
                .find_device_by_barcode(&barcode)?
                .filter(|d| d.id != device.id);
            match owner {
                Some(owner) => warnings.push(format!(
                    "barcode {barcode} already belongs to device {}, not assigning it to {}",
                    owner.id, device.id
                )),
                None => self.write(
                    &mut device.priorities,
                    "barcode",
                    &mut device.barcode,
                    Some(barcode),
                ),
            }
        }
        if let Some(name) = text(snapshot, keys::HOSTNAME) {
            self.write(&mut device.priorities, "name", &mut device.name, name);
        }
        if let Some(dc) = text(snapshot, keys::DATA_CENTER) {
            self.write(&mut device.priorities, "dc", &mut device.dc, Some(dc));
        }
        if let Some(rack) = text(snapshot, keys::RACK) {
            self.write(&mut device.priorities, "rack", &mut device.rack, Some(rack));
        }
        if let Some(raw) = present(snapshot, keys::CHASSIS_POSITION) {
            match FieldType::Integer.coerce(raw).and_then(|v| v.as_i64()) {
                Some(pos) => self.write(
                    &mut device.priorities,
                    "chassis_position",
                    &mut device.chassis_position,
                    Some(pos),
                ),
                None => warnings.push(format!("invalid chassis position {raw}")),
            }
        }
        Ok(())
    }

    fn resolve_device_model(&self, device: &mut Device, snapshot: &Snapshot) -> ReconcileResult<()> {
        let Some(name) = text(snapshot, keys::MODEL_NAME) else {
            return Ok(());
        };
        let kind = text(snapshot, keys::TYPE).map_or(DeviceKind::Unknown, |t| DeviceKind::classify(&t));
        let model = match self.tx.find_device_model_by_name(&name)? {
            Some(mut model) => {
                if kind != DeviceKind::Unknown && model.kind != kind {
                    debug!("device model {:?}: {} -> {}", model.name, model.kind, kind);
                    self.tx.update_device_model_kind(model.id, kind)?;
                    model.kind = kind;
                }
                Some(model)
            }
            None => self.create_device_model(&name, kind)?,
        };
        if let Some(model) = model {
            self.write(&mut device.priorities, "model", &mut device.model_id, Some(model.id));
        }
        Ok(())
    }

    /// Inserts a device model, recovering from name collisions the same way
    /// component models do.
    fn create_device_model(
        &self,
        name: &str,
        kind: DeviceKind,
    ) -> ReconcileResult<Option<DeviceModel>> {
        if let Some(model) = self.try_insert_device_model(name, kind)? {
            return Ok(Some(model));
        }
        if let Some(model) = self.tx.find_device_model_by_name(name)? {
            return Ok(Some(model));
        }
        if kind == DeviceKind::Unknown {
            warn!("device model name {:?} is taken, leaving device unmodeled", name);
            return Ok(None);
        }
        let renamed = format!("{name} ({kind})");
        if let Some(model) = self.tx.find_device_model_by_name(&renamed)? {
            return Ok(Some(model));
        }
        if let Some(model) = self.try_insert_device_model(&renamed, kind)? {
            return Ok(Some(model));
        }
        let model = self.tx.find_device_model_by_name(&renamed)?;
        if model.is_none() {
            warn!("device model name {:?} is taken, leaving device unmodeled", renamed);
        }
        Ok(model)
    }

    fn try_insert_device_model(
        &self,
        name: &str,
        kind: DeviceKind,
    ) -> ReconcileResult<Option<DeviceModel>> {
        let model = DeviceModel {
            id: ModelId::new(),
            name: name.to_string(),
            kind,
        };
        match self.tx.insert_device_model(&model) {
            Ok(()) => Ok(Some(model)),
            Err(err) if err.is_conflict() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn is_logical_container(&self, device: &Device) -> ReconcileResult<bool> {
        let Some(model_id) = device.model_id else {
            return Ok(false);
        };
        Ok(self
            .tx
            .get_device_model(model_id)?
            .is_some_and(|m| m.kind.is_logical_container()))
    }

    /// Marks every listed address as belonging to the device with the given
    /// role and detaches addresses of that role it no longer reports.
    fn update_addresses(
        &self,
        device: DeviceId,
        items: &[Value],
        is_management: bool,
        warnings: &mut Warnings,
    ) -> ReconcileResult<()> {
        let mut kept = HashSet::new();
        for raw in items {
            let Some(ip) = raw
                .as_str()
                .map(str::trim)
                .filter(|s| s.parse::<IpAddr>().is_ok())
            else {
                warnings.push(format!("invalid IP address {raw}, skipping"));
                continue;
            };
            let mut address = self
                .tx
                .find_address(ip)?
                .unwrap_or_else(|| IpAddress::new(ip));
            address.device_id = Some(device);
            address.is_management = is_management;
            self.tx.save_address(&address)?;
            kept.insert(address.id);
        }
        for mut stale in self.tx.addresses_of(device, is_management)? {
            if !kept.contains(&stale.id) {
                debug!("detaching address {} from device {}", stale.address, device);
                stale.device_id = None;
                self.tx.save_address(&stale)?;
            }
        }
        Ok(())
    }

    /// Rows to reconcile for one component class, or `None` when the
    /// snapshot does not mention the class at all.
    fn rows_for(
        &self,
        schema: &ComponentSchema,
        snapshot: &Snapshot,
        warnings: &mut Warnings,
    ) -> ReconcileResult<Option<Vec<Row>>> {
        let Some(key) = schema.payload_key else {
            return Ok(schema.mentioned_by(snapshot).then(|| vec![snapshot.clone()]));
        };
        let Some(items) = list(snapshot, key, warnings) else {
            return Ok(None);
        };
        let rows = match schema.class {
            ComponentClass::Ethernet => mac_rows(items, warnings),
            ComponentClass::DiskShareMount => {
                let mut rows = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(row) = as_row(key, item, warnings) {
                        if let Some(row) = self.resolve_mount(row, warnings)? {
                            rows.push(row);
                        }
                    }
                }
                rows
            }
            _ => items
                .iter()
                .filter_map(|item| as_row(key, item, warnings))
                .collect(),
        };
        Ok(Some(rows))
    }

    /// Replaces a mount row's share serial, address and server with the ids
    /// of the records they name. Rows with a reference that cannot be
    /// resolved are dropped with a warning.
    fn resolve_mount(&self, mut row: Row, warnings: &mut Warnings) -> ReconcileResult<Option<Row>> {
        let Some(wwn) = text(&row, keys::SERIAL_NUMBER) else {
            warnings.push("disk share mount without a share serial number, skipping");
            return Ok(None);
        };
        let wwn_value = Value::String(wwn.clone());
        let share = self
            .tx
            .find_components(ComponentClass::DiskShare, None, &[("wwn", &wwn_value)])?
            .into_iter()
            .next();
        let Some(share) = share else {
            warnings.push(format!("no disk share with WWN {wwn}, skipping its mount"));
            return Ok(None);
        };
        row.insert(MOUNT_SHARE.to_string(), Value::String(share.id.to_string()));

        let address = match text(&row, MOUNT_ADDRESS) {
            None => Value::Null,
            Some(address) => match self.tx.find_address(&address)? {
                Some(found) => Value::String(found.id.to_string()),
                None => {
                    warnings.push(format!(
                        "no IP address {address} for mount of share {wwn}, skipping it"
                    ));
                    return Ok(None);
                }
            },
        };
        row.insert(MOUNT_ADDRESS.to_string(), address);

        let server = match row.get(MOUNT_SERVER) {
            None | Some(Value::Null) => Value::Null,
            Some(reference) => {
                let mut lookup = Lookup::default();
                match reference {
                    Value::Object(fields) => lookup.add_snapshot(fields),
                    other => {
                        let mut fields = Map::new();
                        fields.insert(keys::SERIAL_NUMBER.to_string(), other.clone());
                        lookup.add_snapshot(&fields);
                    }
                }
                let found = lookup.resolve(self.tx)?;
                if found.len() != 1 {
                    warnings.push(format!(
                        "{} servers match {reference} for mount of share {wwn}, skipping it",
                        found.len()
                    ));
                    return Ok(None);
                }
                found
                    .into_iter()
                    .next()
                    .map_or(Value::Null, |id| Value::String(id.to_string()))
            }
        };
        row.insert(MOUNT_SERVER.to_string(), server);
        Ok(Some(row))
    }

    fn reconcile_subdevices(
        &self,
        parent: &Device,
        items: &[Value],
        warnings: &mut Warnings,
    ) -> ReconcileResult<()> {
        let logical = self.is_logical_container(parent)?;
        let mut kept = HashSet::new();
        for item in items {
            let Some(sub) = as_row(keys::SUBDEVICES, item, warnings) else {
                continue;
            };
            let Some(child) = self.locate_subdevice(parent, &sub, warnings)? else {
                continue;
            };
            let mut child = self.reconcile_device(child, &sub, warnings)?;
            if logical {
                child.logical_parent_id = Some(parent.id);
            } else {
                child.parent_id = Some(parent.id);
            }
            self.tx.save_device(&child)?;
            kept.insert(child.id);
        }
        // Only the relation the list describes is detached; children held
        // through the other one are not part of this snapshot.
        for mut child in self.tx.children_of(parent.id)? {
            if kept.contains(&child.id) {
                continue;
            }
            let slot = if logical {
                &mut child.logical_parent_id
            } else {
                &mut child.parent_id
            };
            if *slot != Some(parent.id) {
                continue;
            }
            debug!("detaching device {} from {}", child.id, parent.id);
            *slot = None;
            self.tx.save_device(&child)?;
        }
        Ok(())
    }

    /// Finds the persisted device a subdevice entry describes, or a new one.
    fn locate_subdevice(
        &self,
        parent: &Device,
        sub: &Snapshot,
        warnings: &mut Warnings,
    ) -> ReconcileResult<Option<Device>> {
        let found = if let Some(raw) = present(sub, keys::ID) {
            let device = match DeviceId::parse(&value_to_string(raw)) {
                Ok(id) => self.tx.get_device(id)?,
                Err(_) => None,
            };
            if device.is_none() {
                warnings.push(format!("subdevice {raw} not found, skipping it"));
                return Ok(None);
            }
            device
        } else {
            let mut lookup = Lookup::default();
            lookup.add_snapshot(sub);
            if lookup.is_empty() {
                warnings.push(format!(
                    "subdevice of {} has no serial number or MAC address, skipping it",
                    parent.id
                ));
                return Ok(None);
            }
            match single_candidate(lookup.resolve(self.tx)?)? {
                Some(id) => Some(self.tx.require_device(id)?),
                None => Some(Device::new()),
            }
        };
        Ok(found.filter(|child| {
            let is_parent = child.id == parent.id;
            if is_parent {
                warnings.push(format!("device {} lists itself as a subdevice", parent.id));
            }
            !is_parent
        }))
    }
}

fn list<'s>(snapshot: &'s Snapshot, key: &str, warnings: &mut Warnings) -> Option<&'s [Value]> {
    match snapshot.get(key)? {
        Value::Array(items) => Some(items),
        Value::Null => None,
        other => {
            warnings.push(format!("{key} must be a list, got {other}"));
            None
        }
    }
}

fn as_row(key: &str, item: &Value, warnings: &mut Warnings) -> Option<Row> {
    match item {
        Value::Object(row) => Some(row.clone()),
        other => {
            warnings.push(format!("{key} entry {other} is not an object, skipping it"));
            None
        }
    }
}

/// MAC addresses arrive as bare strings; each becomes a one-column row.
fn mac_rows(items: &[Value], warnings: &mut Warnings) -> Vec<Row> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(items.len());
    for raw in items {
        let mac = raw.as_str().map(MacAddress::parse);
        match mac {
            Some(Ok(mac)) => {
                if seen.insert(mac.clone()) {
                    let mut row = Map::new();
                    row.insert("mac".to_string(), Value::String(mac.into()));
                    rows.push(row);
                }
            }
            _ => warnings.push(format!("invalid MAC address {raw}, skipping it")),
        }
    }
    rows
}
