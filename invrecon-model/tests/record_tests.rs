use invrecon_model::{
    keys, value_to_string, Component, Device, FieldPriorities, PluginResult, ScanResults,
    UNKNOWN_DEVICE_NAME,
};
use invrecon_types::{ComponentClass, DeviceId, Priority};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn new_device_is_unknown_and_detached() {
    let device = Device::new();
    assert_eq!(device.name, UNKNOWN_DEVICE_NAME);
    assert!(device.sn.is_none());
    assert!(device.parent_id.is_none());
    assert!(device.logical_parent_id.is_none());
}

#[test]
fn child_through_either_relation() {
    let parent = DeviceId::new();
    let mut physical = Device::new();
    physical.parent_id = Some(parent);
    let mut logical = Device::new();
    logical.logical_parent_id = Some(parent);
    assert!(physical.is_child_of(parent));
    assert!(logical.is_child_of(parent));
    assert!(!Device::new().is_child_of(parent));
}

#[test]
fn claim_refuses_lower_priority() {
    let mut p = FieldPriorities::new();
    assert!(p.claim("sn", Priority::new(50), false));
    assert!(!p.claim("sn", Priority::new(10), false));
    assert_eq!(p.get("sn"), Some(Priority::new(50)));
    assert!(p.claim("sn", Priority::new(50), false));
}

#[test]
fn forced_claim_overwrites() {
    let mut p = FieldPriorities::new();
    p.claim("rack", Priority::new(300), false);
    assert!(p.claim("rack", Priority::new(1), true));
    assert_eq!(p.get("rack"), Some(Priority::new(1)));
}

#[test]
fn component_accessors_skip_nulls() {
    let mut c = Component::new(ComponentClass::Disk, DeviceId::new());
    c.data.insert("sn".into(), json!("SN1"));
    c.data.insert("size".into(), json!(100));
    c.data.insert("label".into(), json!(null));
    assert_eq!(c.get_str("sn"), Some("SN1"));
    assert_eq!(c.get_i64("size"), Some(100));
    assert!(c.get("label").is_none());
    assert!(c.get_bool("full").is_none());
}

#[test]
fn scan_results_deserialize() {
    let raw = json!({
        "puppet": {"device": {"serial_number": "X1"}, "results_priority": {"serial_number": 30}},
        "ssh": {"status": "error"}
    });
    let results: ScanResults = serde_json::from_value(raw).unwrap();
    let puppet = &results["puppet"];
    assert_eq!(
        puppet.device.as_ref().unwrap()[keys::SERIAL_NUMBER],
        json!("X1")
    );
    assert_eq!(puppet.results_priority.as_ref().unwrap()["serial_number"], 30);
    assert_eq!(results["ssh"], PluginResult::default());
}

#[test]
fn stringified_values_agree_across_types() {
    assert_eq!(value_to_string(&json!("12")), value_to_string(&json!(12)));
    assert_eq!(value_to_string(&json!(["a"])), "[\"a\"]");
}
