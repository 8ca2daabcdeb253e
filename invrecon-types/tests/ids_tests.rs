use invrecon_types::{ComponentId, DeviceId, ModelId};
use std::collections::HashSet;
use std::str::FromStr;

// ── DeviceId ─────────────────────────────────────────────────────

#[test]
fn device_id_new_is_unique() {
    let a = DeviceId::new();
    let b = DeviceId::new();
    assert_ne!(a, b);
}

#[test]
fn device_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = DeviceId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn device_id_display_and_parse() {
    let id = DeviceId::new();
    let parsed = DeviceId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn device_id_parse_invalid() {
    assert!(DeviceId::parse("not-a-uuid").is_err());
    assert!(DeviceId::from_str("42").is_err());
}

#[test]
fn device_ids_sort_by_creation() {
    let first = DeviceId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let second = DeviceId::new();
    assert!(first < second);
}

#[test]
fn device_id_serializes_as_plain_string() {
    let id = DeviceId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let parsed: DeviceId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

// ── Other ids ────────────────────────────────────────────────────

#[test]
fn component_ids_hash_and_eq() {
    let id = ComponentId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn model_id_default_is_unique() {
    assert_ne!(ModelId::default(), ModelId::default());
}
