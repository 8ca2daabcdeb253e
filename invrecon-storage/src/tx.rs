//! Queries executed inside one store transaction.

use crate::error::{StorageError, StorageResult};
use invrecon_model::{Component, ComponentModel, Device, DeviceModel, IpAddress};
use invrecon_types::{ComponentClass, ComponentId, ComponentKind, DeviceId, DeviceKind, ModelId};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde_json::Value;
use std::fmt::Display;
use std::str::FromStr;

const DEVICE_COLUMNS: &str = "id, name, sn, barcode, model_id, parent_id, logical_parent_id, \
     dc, rack, chassis_position, priorities";
const COMPONENT_COLUMNS: &str = "id, class, device_id, model_id, data, priorities";
const COMPONENT_MODEL_COLUMNS: &str = "id, name, family, kind, attributes, priority";

/// Handle to an open transaction. Obtained from
/// [`crate::InventoryStore::transaction`].
pub struct StoreTx<'a> {
    conn: &'a Connection,
}

fn parse<T>(raw: &str, what: &str) -> StorageResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| StorageError::InvalidData(format!("{what} {raw:?}: {e}")))
}

fn parse_opt<T>(raw: Option<String>, what: &str) -> StorageResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    raw.as_deref().map(|s| parse(s, what)).transpose()
}

/// Binds a JSON value the way SQLite's `json_extract` returns it.
fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

type RawDevice = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<i64>,
    String,
);

fn raw_device(row: &Row<'_>) -> rusqlite::Result<RawDevice> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
    ))
}

fn decode_device(raw: RawDevice) -> StorageResult<Device> {
    let (id, name, sn, barcode, model_id, parent_id, logical_parent_id, dc, rack, pos, prio) = raw;
    Ok(Device {
        id: parse(&id, "device id")?,
        name,
        sn,
        barcode,
        model_id: parse_opt(model_id, "model id")?,
        parent_id: parse_opt(parent_id, "parent id")?,
        logical_parent_id: parse_opt(logical_parent_id, "logical parent id")?,
        dc,
        rack,
        chassis_position: pos,
        priorities: serde_json::from_str(&prio)?,
    })
}

type RawComponent = (String, String, String, Option<String>, String, String);

fn raw_component(row: &Row<'_>) -> rusqlite::Result<RawComponent> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_component(raw: RawComponent) -> StorageResult<Component> {
    let (id, class, device_id, model_id, data, priorities) = raw;
    Ok(Component {
        id: parse(&id, "component id")?,
        class: parse(&class, "component class")?,
        device_id: parse(&device_id, "device id")?,
        model_id: parse_opt(model_id, "model id")?,
        data: serde_json::from_str(&data)?,
        priorities: serde_json::from_str(&priorities)?,
    })
}

type RawComponentModel = (String, String, String, String, String, i32);

fn raw_component_model(row: &Row<'_>) -> rusqlite::Result<RawComponentModel> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_component_model(raw: RawComponentModel) -> StorageResult<ComponentModel> {
    let (id, name, family, kind, attributes, priority) = raw;
    Ok(ComponentModel {
        id: parse(&id, "model id")?,
        name,
        family,
        kind: parse(&kind, "component kind")?,
        attributes: serde_json::from_str(&attributes)?,
        priority: priority.into(),
    })
}

type RawAddress = (String, String, Option<String>, bool);

fn raw_address(row: &Row<'_>) -> rusqlite::Result<RawAddress> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_address(raw: RawAddress) -> StorageResult<IpAddress> {
    let (id, address, device_id, is_management) = raw;
    Ok(IpAddress {
        id: parse(&id, "address id")?,
        address,
        device_id: parse_opt(device_id, "device id")?,
        is_management,
    })
}

impl<'a> StoreTx<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn query_devices(&self, sql: &str, args: &[SqlValue]) -> StorageResult<Vec<Device>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params_from_iter(args.iter()), raw_device)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(decode_device).collect()
    }

    fn query_components(&self, sql: &str, args: &[SqlValue]) -> StorageResult<Vec<Component>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params_from_iter(args.iter()), raw_component)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(decode_component).collect()
    }

    // ── Devices ──────────────────────────────────────────────────

    pub fn get_device(&self, id: DeviceId) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE id = ?1");
        let mut found = self.query_devices(&sql, &[SqlValue::Text(id.to_string())])?;
        Ok(found.pop())
    }

    /// Like [`Self::get_device`], failing with `NotFound` for unknown ids.
    pub fn require_device(&self, id: DeviceId) -> StorageResult<Device> {
        self.get_device(id)?
            .ok_or_else(|| StorageError::NotFound(format!("device {id}")))
    }

    pub fn find_device_by_sn(&self, sn: &str) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE sn = ?1");
        Ok(self.query_devices(&sql, &[SqlValue::Text(sn.to_string())])?.pop())
    }

    pub fn find_device_by_barcode(&self, barcode: &str) -> StorageResult<Option<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE barcode = ?1");
        Ok(self
            .query_devices(&sql, &[SqlValue::Text(barcode.to_string())])?
            .pop())
    }

    /// Ids of devices owning an Ethernet component with the given MAC.
    pub fn find_device_ids_by_mac(&self, mac: &str) -> StorageResult<Vec<DeviceId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT device_id FROM components
             WHERE class = ?1 AND json_extract(data, '$.mac') = ?2
             ORDER BY device_id",
        )?;
        let raws = stmt
            .query_map(params![ComponentClass::Ethernet.name(), mac], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.iter().map(|raw| parse(raw, "device id")).collect()
    }

    /// Devices attached to `parent` through either relation, ordered by id.
    pub fn children_of(&self, parent: DeviceId) -> StorageResult<Vec<Device>> {
        let sql = format!(
            "SELECT {DEVICE_COLUMNS} FROM devices
             WHERE parent_id = ?1 OR logical_parent_id = ?1 ORDER BY id"
        );
        self.query_devices(&sql, &[SqlValue::Text(parent.to_string())])
    }

    pub fn list_devices(&self) -> StorageResult<Vec<Device>> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices ORDER BY id");
        self.query_devices(&sql, &[])
    }

    /// Inserts or updates a device. Serial and barcode collisions surface
    /// as [`StorageError::Conflict`].
    pub fn save_device(&self, device: &Device) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO devices (id, name, sn, barcode, model_id, parent_id,
                     logical_parent_id, dc, rack, chassis_position, priorities)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name, sn = excluded.sn, barcode = excluded.barcode,
                     model_id = excluded.model_id, parent_id = excluded.parent_id,
                     logical_parent_id = excluded.logical_parent_id, dc = excluded.dc,
                     rack = excluded.rack, chassis_position = excluded.chassis_position,
                     priorities = excluded.priorities",
                params![
                    device.id.to_string(),
                    device.name,
                    device.sn,
                    device.barcode,
                    device.model_id.map(|id| id.to_string()),
                    device.parent_id.map(|id| id.to_string()),
                    device.logical_parent_id.map(|id| id.to_string()),
                    device.dc,
                    device.rack,
                    device.chassis_position,
                    serde_json::to_string(&device.priorities)?,
                ],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }

    /// Deletes a device and, through the cascade, its components.
    pub fn delete_device(&self, id: DeviceId) -> StorageResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM devices WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    // ── Device models ────────────────────────────────────────────

    fn query_device_model(&self, sql: &str, arg: String) -> StorageResult<Option<DeviceModel>> {
        let raw = self
            .conn
            .query_row(sql, params![arg], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .optional()?;
        raw.map(|(id, name, kind)| {
            Ok::<_, StorageError>(DeviceModel {
                id: parse(&id, "model id")?,
                name,
                kind: parse::<DeviceKind>(&kind, "device kind")?,
            })
        })
        .transpose()
    }

    pub fn get_device_model(&self, id: ModelId) -> StorageResult<Option<DeviceModel>> {
        self.query_device_model(
            "SELECT id, name, kind FROM device_models WHERE id = ?1",
            id.to_string(),
        )
    }

    pub fn find_device_model_by_name(&self, name: &str) -> StorageResult<Option<DeviceModel>> {
        self.query_device_model(
            "SELECT id, name, kind FROM device_models WHERE name = ?1",
            name.to_string(),
        )
    }

    pub fn insert_device_model(&self, model: &DeviceModel) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO device_models (id, name, kind) VALUES (?1, ?2, ?3)",
                params![model.id.to_string(), model.name, model.kind.name()],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }

    pub fn update_device_model_kind(&self, id: ModelId, kind: DeviceKind) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE device_models SET kind = ?2 WHERE id = ?1",
            params![id.to_string(), kind.name()],
        )?;
        Ok(())
    }

    // ── Component models ─────────────────────────────────────────

    fn query_component_model(
        &self,
        condition: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> StorageResult<Option<ComponentModel>> {
        let sql = format!("SELECT {COMPONENT_MODEL_COLUMNS} FROM component_models WHERE {condition}");
        let raw = self
            .conn
            .query_row(&sql, args, raw_component_model)
            .optional()?;
        raw.map(decode_component_model).transpose()
    }

    pub fn get_component_model(&self, id: ModelId) -> StorageResult<Option<ComponentModel>> {
        self.query_component_model("id = ?1", &[&id.to_string()])
    }

    pub fn find_component_model_by_name(
        &self,
        name: &str,
        kind: ComponentKind,
    ) -> StorageResult<Option<ComponentModel>> {
        self.query_component_model("name = ?1 AND kind = ?2", &[&name, &kind.name()])
    }

    /// First model of `kind` with the given family, oldest first.
    pub fn find_component_model_by_family(
        &self,
        family: &str,
        kind: ComponentKind,
    ) -> StorageResult<Option<ComponentModel>> {
        self.query_component_model(
            "family = ?1 AND kind = ?2 ORDER BY id LIMIT 1",
            &[&family, &kind.name()],
        )
    }

    /// Inserts a model. A taken name surfaces as [`StorageError::Conflict`].
    pub fn insert_component_model(&self, model: &ComponentModel) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO component_models (id, name, family, kind, attributes, priority)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    model.id.to_string(),
                    model.name,
                    model.family,
                    model.kind.name(),
                    serde_json::to_string(&model.attributes)?,
                    model.priority.value(),
                ],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }

    pub fn count_component_models(&self) -> StorageResult<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM component_models", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or_default())
    }

    // ── Components ───────────────────────────────────────────────

    pub fn get_component(&self, id: ComponentId) -> StorageResult<Option<Component>> {
        let sql = format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE id = ?1");
        Ok(self
            .query_components(&sql, &[SqlValue::Text(id.to_string())])?
            .pop())
    }

    /// Components of `class` whose data matches every `(column, value)` pair,
    /// optionally restricted to one owning device. Oldest first.
    pub fn find_components(
        &self,
        class: ComponentClass,
        device: Option<DeviceId>,
        fields: &[(&str, &Value)],
    ) -> StorageResult<Vec<Component>> {
        let mut sql = format!("SELECT {COMPONENT_COLUMNS} FROM components WHERE class = ?1");
        let mut args = vec![SqlValue::Text(class.name().to_string())];
        if let Some(device) = device {
            args.push(SqlValue::Text(device.to_string()));
            sql.push_str(&format!(" AND device_id = ?{}", args.len()));
        }
        for (column, value) in fields {
            args.push(SqlValue::Text(format!("$.{column}")));
            let path = args.len();
            args.push(sql_value(value));
            sql.push_str(&format!(" AND json_extract(data, ?{path}) = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY id");
        self.query_components(&sql, &args)
    }

    /// All components of `class` owned by `device`, oldest first.
    pub fn components_of(
        &self,
        device: DeviceId,
        class: ComponentClass,
    ) -> StorageResult<Vec<Component>> {
        self.find_components(class, Some(device), &[])
    }

    pub fn save_component(&self, component: &Component) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO components (id, class, device_id, model_id, data, priorities)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     class = excluded.class, device_id = excluded.device_id,
                     model_id = excluded.model_id, data = excluded.data,
                     priorities = excluded.priorities",
                params![
                    component.id.to_string(),
                    component.class.name(),
                    component.device_id.to_string(),
                    component.model_id.map(|id| id.to_string()),
                    serde_json::to_string(&component.data)?,
                    serde_json::to_string(&component.priorities)?,
                ],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }

    pub fn delete_component(&self, id: ComponentId) -> StorageResult<bool> {
        let n = self
            .conn
            .execute("DELETE FROM components WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    // ── IP addresses ─────────────────────────────────────────────

    fn query_addresses(&self, sql: &str, args: &[SqlValue]) -> StorageResult<Vec<IpAddress>> {
        let mut stmt = self.conn.prepare(sql)?;
        let raws = stmt
            .query_map(params_from_iter(args.iter()), raw_address)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(decode_address).collect()
    }

    pub fn find_address(&self, address: &str) -> StorageResult<Option<IpAddress>> {
        Ok(self
            .query_addresses(
                "SELECT id, address, device_id, is_management FROM ip_addresses WHERE address = ?1",
                &[SqlValue::Text(address.to_string())],
            )?
            .pop())
    }

    pub fn get_address(&self, id: invrecon_types::AddressId) -> StorageResult<Option<IpAddress>> {
        Ok(self
            .query_addresses(
                "SELECT id, address, device_id, is_management FROM ip_addresses WHERE id = ?1",
                &[SqlValue::Text(id.to_string())],
            )?
            .pop())
    }

    /// Addresses of one kind attached to `device`, ordered by address.
    pub fn addresses_of(
        &self,
        device: DeviceId,
        is_management: bool,
    ) -> StorageResult<Vec<IpAddress>> {
        self.query_addresses(
            "SELECT id, address, device_id, is_management FROM ip_addresses
             WHERE device_id = ?1 AND is_management = ?2 ORDER BY address",
            &[
                SqlValue::Text(device.to_string()),
                SqlValue::Integer(i64::from(is_management)),
            ],
        )
    }

    pub fn save_address(&self, address: &IpAddress) -> StorageResult<()> {
        self.conn
            .execute(
                "INSERT INTO ip_addresses (id, address, device_id, is_management)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     address = excluded.address, device_id = excluded.device_id,
                     is_management = excluded.is_management",
                params![
                    address.id.to_string(),
                    address.address,
                    address.device_id.map(|id| id.to_string()),
                    address.is_management,
                ],
            )
            .map_err(StorageError::from_write)?;
        Ok(())
    }
}
