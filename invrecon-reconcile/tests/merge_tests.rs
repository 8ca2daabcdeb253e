use invrecon_model::{PluginResult, ScanResults, Snapshot};
use invrecon_reconcile::{merge, SourceSet};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn scan(plugins: &[(&str, Value)]) -> ScanResults {
    plugins
        .iter()
        .map(|(name, device)| {
            let Value::Object(device) = device.clone() else {
                panic!("not an object: {device}");
            };
            ((*name).to_string(), PluginResult::with_device(device))
        })
        .collect()
}

#[test]
fn agreeing_sources_are_grouped() {
    let results = scan(&[
        ("puppet", json!({"hostname": "a", "rack": "12"})),
        ("snmp", json!({"hostname": "b", "rack": 12})),
        ("nmap", json!({"hostname": "a"})),
    ]);
    let merged = merge(&[&results], false);

    let hostname = &merged["hostname"];
    assert_eq!(hostname.len(), 2);
    assert_eq!(hostname[&SourceSet::new(["nmap", "puppet"])], json!("a"));
    assert_eq!(hostname[&SourceSet::new(["snmp"])], json!("b"));

    let rack = &merged["rack"];
    assert_eq!(rack.len(), 1);
    assert_eq!(rack[&SourceSet::new(["puppet", "snmp"])], json!("12"));
}

#[test]
fn disagreeing_sources_keep_both_values() {
    let first = scan(&[("puppet", json!({"rack": "12"}))]);
    let second = scan(&[("snmp", json!({"rack": "13"}))]);
    let merged = merge(&[&first, &second], false);
    assert_eq!(
        serde_json::to_value(&merged["rack"]).unwrap(),
        json!({"puppet": "12", "snmp": "13"})
    );
}

#[test]
fn only_multiple_drops_agreed_fields() {
    let results = scan(&[
        ("puppet", json!({"hostname": "a", "rack": "1", "model_name": "R720"})),
        ("snmp", json!({"hostname": "a", "rack": "2"})),
    ]);
    let merged = merge(&[&results], true);
    assert!(!merged.contains_key("hostname"));
    assert!(merged.contains_key("rack"));
    assert!(merged.contains_key("model_name"));
}

#[test]
fn plugins_without_a_device_are_ignored() {
    let mut results = scan(&[("puppet", json!({"hostname": "a"}))]);
    results.insert("broken".into(), PluginResult::default());
    let merged = merge(&[&results], false);
    assert_eq!(merged["hostname"].keys().collect::<Vec<_>>(), vec![&SourceSet::new(["puppet"])]);
}

#[test]
fn source_set_serializes_as_a_joined_string() {
    let set = SourceSet::new(["snmp", "database", "snmp"]);
    assert_eq!(set.len(), 2);
    assert_eq!(serde_json::to_value(&set).unwrap(), json!("database,snmp"));
    let back: SourceSet = serde_json::from_value(json!("snmp,database")).unwrap();
    assert_eq!(back, set);
    assert!(serde_json::from_value::<SourceSet>(json!("")).is_err());
}

#[test]
fn source_names_with_commas_survive_serialization() {
    let set = SourceSet::new(["a,b", "c"]);
    let text = serde_json::to_value(&set).unwrap();
    assert_eq!(text, json!("a\\,b,c"));
    let back: SourceSet = serde_json::from_value(text).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back, set);

    let keyed: BTreeMap<SourceSet, i32> = BTreeMap::from([(set.clone(), 1)]);
    let parsed: BTreeMap<SourceSet, i32> =
        serde_json::from_str(&serde_json::to_string(&keyed).unwrap()).unwrap();
    assert_eq!(parsed[&set], 1);
    assert!(serde_json::from_value::<SourceSet>(json!("a\\")).is_err());
}

fn arb_device() -> impl Strategy<Value = Snapshot> {
    prop::collection::btree_map(
        prop::sample::select(vec!["hostname", "rack", "serial_number", "model_name"]),
        prop_oneof![
            "[a-c]{1,2}".prop_map(Value::from),
            (0i64..3).prop_map(Value::from),
        ],
        0..4,
    )
    .prop_map(|fields| {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Snapshot>()
    })
}

fn arb_scan() -> impl Strategy<Value = ScanResults> {
    prop::collection::btree_map("[p-t]{1,2}", arb_device(), 0..5).prop_map(|plugins| {
        plugins
            .into_iter()
            .map(|(name, device)| (name, PluginResult::with_device(device)))
            .collect::<ScanResults>()
    })
}

proptest! {
    #[test]
    fn merging_is_order_independent(scan in arb_scan()) {
        let mut halves = (ScanResults::new(), ScanResults::new());
        for (i, (name, result)) in scan.iter().enumerate() {
            let half = if i % 2 == 0 { &mut halves.0 } else { &mut halves.1 };
            half.insert(name.clone(), result.clone());
        }
        let forward = merge(&[&halves.0, &halves.1], false);
        let backward = merge(&[&halves.1, &halves.0], false);
        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(forward, merge(&[&scan], false));
    }

    #[test]
    fn every_reporting_source_appears_once(scan in arb_scan()) {
        let merged = merge(&[&scan], false);
        for (field, values) in &merged {
            let mut seen: Vec<&str> = values.keys().flat_map(|set| set.iter()).collect();
            let total = seen.len();
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), total);
            let reporting = scan
                .values()
                .filter(|r| r.device.as_ref().is_some_and(|d| d.contains_key(field)))
                .count();
            prop_assert_eq!(total, reporting);
        }
    }
}
