//! Serializing persisted devices back into the probe payload shape.

use crate::error::{ReconcileError, ReconcileResult};
use invrecon_model::{keys, value_to_string, Component, Device, DeviceModel, Snapshot, UNKNOWN_DEVICE_NAME};
use invrecon_storage::StoreTx;
use invrecon_types::{AddressId, ComponentClass, ComponentId, DeviceId, DeviceKind, ModelId};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;

/// Builds the snapshot of a persisted device, its components and,
/// recursively, its subdevices.
///
/// Lists are ordered deterministically, so exporting twice yields identical
/// output, and feeding the result back through reconciliation leaves the
/// device unchanged.
pub fn export_device(tx: &StoreTx<'_>, id: DeviceId) -> ReconcileResult<Snapshot> {
    let device = tx.get_device(id)?.ok_or(ReconcileError::DeviceNotFound(id))?;
    Exporter { tx }.device(&device)
}

struct Exporter<'t, 'c> {
    tx: &'t StoreTx<'c>,
}

/// Copies a component column into an export row under `key`, if set.
fn put(row: &mut Map<String, Value>, key: &str, component: &Component, column: &str) {
    if let Some(value) = component.get(column) {
        row.insert(key.to_string(), value.clone());
    }
}

/// Parses a reference column holding a record id.
fn reference<T: FromStr>(component: &Component, column: &str) -> Option<T> {
    component.get_str(column).and_then(|raw| raw.parse().ok())
}

fn by_columns(a: &Component, b: &Component, columns: &[&str]) -> Ordering {
    columns
        .iter()
        .map(|c| compare_values(a.get(c), b.get(c)))
        .find(|o| o.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Orders absent values first, numbers numerically, everything else by text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(x), Some(y)) => value_to_string(x).cmp(&value_to_string(y)),
    }
}

impl Exporter<'_, '_> {
    fn device(&self, device: &Device) -> ReconcileResult<Snapshot> {
        let mut data = Snapshot::new();
        data.insert(keys::ID.into(), Value::String(device.id.to_string()));
        data.insert(
            keys::SYSTEM_IP_ADDRESSES.into(),
            self.addresses(device.id, false)?,
        );
        data.insert(
            keys::MANAGEMENT_IP_ADDRESSES.into(),
            self.addresses(device.id, true)?,
        );
        let mut macs: Vec<String> = self
            .tx
            .components_of(device.id, ComponentClass::Ethernet)?
            .iter()
            .filter_map(|c| c.get_str("mac").map(str::to_string))
            .collect();
        macs.sort();
        data.insert(keys::MAC_ADDRESSES.into(), Value::from(macs));

        if device.name != UNKNOWN_DEVICE_NAME {
            data.insert(keys::HOSTNAME.into(), Value::String(device.name.clone()));
        }
        let mut logical = false;
        if let Some(model) = self.device_model(device.model_id)? {
            data.insert(keys::MODEL_NAME.into(), Value::String(model.name));
            if model.kind != DeviceKind::Unknown {
                data.insert(keys::TYPE.into(), Value::String(model.kind.name().into()));
            }
            logical = model.kind.is_logical_container();
        }
        let scalars = [
            (keys::SERIAL_NUMBER, device.sn.clone().map(Value::String)),
            (keys::BARCODE, device.barcode.clone().map(Value::String)),
            (keys::CHASSIS_POSITION, device.chassis_position.map(Value::from)),
            (keys::DATA_CENTER, device.dc.clone().map(Value::String)),
            (keys::RACK, device.rack.clone().map(Value::String)),
        ];
        for (key, value) in scalars {
            if let Some(value) = value {
                data.insert(key.into(), value);
            }
        }

        data.insert(keys::MEMORY.into(), self.memory(device.id)?);
        data.insert(keys::PROCESSORS.into(), self.processors(device.id)?);
        data.insert(keys::DISKS.into(), self.disks(device.id)?);
        data.insert(keys::DISK_EXPORTS.into(), self.disk_exports(device.id)?);
        data.insert(keys::DISK_SHARES.into(), self.disk_shares(device.id)?);
        data.insert(keys::INSTALLED_SOFTWARE.into(), self.software(device.id)?);
        data.insert(keys::FIBRECHANNEL_CARDS.into(), self.fibre_channel(device.id)?);
        data.insert(keys::PARTS.into(), self.parts(device.id)?);
        self.operating_system(device.id, &mut data)?;

        let mut subdevices = Vec::new();
        for child in self.tx.children_of(device.id)? {
            let attached = if logical {
                child.logical_parent_id == Some(device.id)
            } else {
                child.parent_id == Some(device.id)
            };
            if attached {
                subdevices.push(Value::Object(self.device(&child)?));
            }
        }
        data.insert(keys::SUBDEVICES.into(), Value::Array(subdevices));
        Ok(data)
    }

    fn addresses(&self, device: DeviceId, is_management: bool) -> ReconcileResult<Value> {
        let addresses: Vec<String> = self
            .tx
            .addresses_of(device, is_management)?
            .into_iter()
            .map(|a| a.address)
            .collect();
        Ok(Value::from(addresses))
    }

    fn device_model(&self, id: Option<ModelId>) -> ReconcileResult<Option<DeviceModel>> {
        Ok(match id {
            Some(id) => self.tx.get_device_model(id)?,
            None => None,
        })
    }

    /// Components of a class, sorted by the given columns.
    fn sorted(
        &self,
        device: DeviceId,
        class: ComponentClass,
        columns: &[&str],
    ) -> ReconcileResult<Vec<Component>> {
        let mut components = self.tx.components_of(device, class)?;
        components.sort_by(|a, b| by_columns(a, b, columns));
        Ok(components)
    }

    /// Adds `model_name` (and `family` when requested) of a component's model.
    fn put_model(
        &self,
        row: &mut Map<String, Value>,
        component: &Component,
        with_family: bool,
    ) -> ReconcileResult<()> {
        let Some(id) = component.model_id else {
            return Ok(());
        };
        if let Some(model) = self.tx.get_component_model(id)? {
            row.insert(keys::MODEL_NAME.into(), Value::String(model.name));
            if with_family && !model.family.is_empty() {
                row.insert(keys::FAMILY.into(), Value::String(model.family));
            }
        }
        Ok(())
    }

    fn memory(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for m in self.sorted(device, ComponentClass::Memory, &["index"])? {
            let mut row = Map::new();
            for column in ["label", "size", "speed", "index"] {
                put(&mut row, column, &m, column);
            }
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn processors(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for p in self.sorted(device, ComponentClass::Processor, &["index"])? {
            let mut row = Map::new();
            for column in ["label", "speed", "cores", "index"] {
                put(&mut row, column, &p, column);
            }
            self.put_model(&mut row, &p, true)?;
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn disks(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for disk in self.sorted(device, ComponentClass::Disk, &["sn", "mount_point"])? {
            let mut row = Map::new();
            put(&mut row, "label", &disk, "label");
            put(&mut row, "size", &disk, "size");
            put(&mut row, "speed", &disk, "speed");
            put(&mut row, keys::SERIAL_NUMBER, &disk, "sn");
            put(&mut row, "mount_point", &disk, "mount_point");
            self.put_model(&mut row, &disk, true)?;
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn disk_exports(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for share in self.sorted(device, ComponentClass::DiskShare, &["wwn"])? {
            let mut row = Map::new();
            put(&mut row, keys::SERIAL_NUMBER, &share, "wwn");
            for column in ["full", "size", "snapshot_size", "label", "share_id"] {
                put(&mut row, column, &share, column);
            }
            self.put_model(&mut row, &share, false)?;
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn disk_shares(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut mounts = Vec::new();
        for mount in self.tx.components_of(device, ComponentClass::DiskShareMount)? {
            let mut row = Map::new();
            if let Some(share) = reference::<ComponentId>(&mount, "share") {
                if let Some(wwn) = self
                    .tx
                    .get_component(share)?
                    .and_then(|s| s.get("wwn").cloned())
                {
                    row.insert(keys::SERIAL_NUMBER.into(), wwn);
                }
            }
            if let Some(address) = reference::<AddressId>(&mount, "address") {
                if let Some(found) = self.tx.get_address(address)? {
                    row.insert("address".into(), Value::String(found.address));
                }
            }
            if let Some(server) = reference::<DeviceId>(&mount, "server") {
                if let Some(found) = self.tx.get_device(server)? {
                    let mut reference = Map::new();
                    match found.sn {
                        Some(sn) => reference.insert(keys::SERIAL_NUMBER.into(), Value::String(sn)),
                        None => reference.insert(keys::ID.into(), Value::String(found.id.to_string())),
                    };
                    row.insert("server".into(), Value::Object(reference));
                }
            }
            for column in ["size", "is_virtual", "volume"] {
                put(&mut row, column, &mount, column);
            }
            mounts.push(row);
        }
        mounts.sort_by(|a, b| {
            compare_values(a.get("volume"), b.get("volume"))
                .then_with(|| compare_values(a.get("address"), b.get("address")))
        });
        Ok(Value::Array(mounts.into_iter().map(Value::Object).collect()))
    }

    fn software(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for soft in self.sorted(device, ComponentClass::Software, &["label", "version"])? {
            let mut row = Map::new();
            for column in ["label", "version", "path"] {
                put(&mut row, column, &soft, column);
            }
            put(&mut row, keys::SERIAL_NUMBER, &soft, "sn");
            self.put_model(&mut row, &soft, false)?;
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn fibre_channel(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for fc in self.sorted(device, ComponentClass::FibreChannelCard, &["label"])? {
            let mut row = Map::new();
            put(&mut row, "physical_id", &fc, "physical_id");
            put(&mut row, "label", &fc, "label");
            self.put_model(&mut row, &fc, false)?;
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn parts(&self, device: DeviceId) -> ReconcileResult<Value> {
        let mut rows = Vec::new();
        for part in self.sorted(device, ComponentClass::GenericPart, &["sn"])? {
            let mut row = Map::new();
            put(&mut row, keys::SERIAL_NUMBER, &part, "sn");
            for column in ["label", "boot_firmware", "hard_firmware", "diag_firmware", "mgmt_firmware"] {
                put(&mut row, column, &part, column);
            }
            if let Some(id) = part.model_id {
                if let Some(model) = self.tx.get_component_model(id)? {
                    row.insert(keys::MODEL_NAME.into(), Value::String(model.name));
                    row.insert(keys::TYPE.into(), Value::String(model.kind.name().into()));
                }
            }
            rows.push(Value::Object(row));
        }
        Ok(Value::Array(rows))
    }

    fn operating_system(&self, device: DeviceId, data: &mut Snapshot) -> ReconcileResult<()> {
        let Some(system) = self
            .tx
            .components_of(device, ComponentClass::OperatingSystem)?
            .into_iter()
            .next()
        else {
            return Ok(());
        };
        put(data, "system_label", &system, "label");
        put(data, "system_memory", &system, "memory");
        put(data, "system_storage", &system, "storage");
        put(data, "system_cores_count", &system, "cores_count");
        if let Some(id) = system.model_id {
            if let Some(model) = self.tx.get_component_model(id)? {
                data.insert("system_model_name".into(), Value::String(model.name));
                if !model.family.is_empty() {
                    data.insert("system_family".into(), Value::String(model.family));
                }
            }
        }
        Ok(())
    }
}
