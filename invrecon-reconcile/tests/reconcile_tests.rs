use invrecon_model::{Snapshot, INDEX_COLUMN};
use invrecon_reconcile::{InventoryEngine, ReconcileConfig, ReconcileError};
use invrecon_storage::{InventoryStore, StoreOptions};
use invrecon_types::{ComponentClass, DeviceId, Priority};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::thread;

fn snapshot(value: Value) -> Snapshot {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

fn engine() -> InventoryEngine {
    InventoryEngine::new(
        InventoryStore::open_in_memory().unwrap(),
        ReconcileConfig::default(),
    )
}

fn create(engine: &InventoryEngine, value: Value) -> DeviceId {
    engine
        .reconcile(None, &snapshot(value), Priority::new(100))
        .unwrap()
        .device_id
        .unwrap()
}

fn update(engine: &InventoryEngine, id: DeviceId, value: Value) -> Vec<String> {
    engine
        .reconcile(Some(id), &snapshot(value), Priority::new(100))
        .unwrap()
        .warnings
        .into_vec()
}

fn components(engine: &InventoryEngine, id: DeviceId, class: ComponentClass) -> Vec<invrecon_model::Component> {
    engine.store().read(|tx| tx.components_of(id, class)).unwrap()
}

// ── Identity ─────────────────────────────────────────────────────

#[test]
fn new_device_gets_identity_and_model() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "serial_number": " SRV-1 ",
            "hostname": "db1.example.com",
            "model_name": "PowerEdge R720",
            "type": "rack server",
            "rack": "R12",
            "data_center": "dc2",
            "chassis_position": "7",
        }),
    );
    let device = engine.store().read(|tx| tx.require_device(id)).unwrap();
    assert_eq!(device.sn.as_deref(), Some("SRV-1"));
    assert_eq!(device.name, "db1.example.com");
    assert_eq!(device.rack.as_deref(), Some("R12"));
    assert_eq!(device.dc.as_deref(), Some("dc2"));
    assert_eq!(device.chassis_position, Some(7));

    let exported = engine.export(id).unwrap();
    assert_eq!(exported["model_name"], json!("PowerEdge R720"));
    assert_eq!(exported["type"], json!("rack_server"));
}

#[test]
fn placeholder_serial_is_ignored() {
    let engine = engine();
    let id = create(&engine, json!({"serial_number": "To Be Filled By O.E.M."}));
    let device = engine.store().read(|tx| tx.require_device(id)).unwrap();
    assert_eq!(device.sn, None);
}

#[test]
fn serial_owned_by_another_device_is_refused() {
    let engine = engine();
    create(&engine, json!({"serial_number": "TAKEN"}));
    let outcome = engine
        .reconcile(None, &snapshot(json!({"serial_number": "TAKEN"})), Priority::new(100))
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings.iter().any(|w| w.contains("TAKEN")));

    let other = outcome.device_id.unwrap();
    let device = engine.store().read(|tx| tx.require_device(other)).unwrap();
    assert_eq!(device.sn, None);
}

#[test]
fn lower_priority_does_not_overwrite() {
    let engine = engine();
    let id = engine
        .reconcile(None, &snapshot(json!({"rack": "A", "disks": [{"serial_number": "D1", "size": 10}]})), Priority::new(50))
        .unwrap()
        .device_id
        .unwrap();
    engine
        .reconcile(Some(id), &snapshot(json!({"rack": "B", "disks": [{"serial_number": "D1", "size": 20}]})), Priority::new(10))
        .unwrap();

    let device = engine.store().read(|tx| tx.require_device(id)).unwrap();
    assert_eq!(device.rack.as_deref(), Some("A"));
    let disks = components(&engine, id, ComponentClass::Disk);
    assert_eq!(disks[0].get_i64("size"), Some(10));
}

#[test]
fn override_lets_lower_priority_overwrite() {
    let store = InventoryStore::open_in_memory().unwrap();
    let config = ReconcileConfig {
        override_priority: true,
        ..ReconcileConfig::default()
    };
    let engine = InventoryEngine::new(store, config);
    let id = engine
        .reconcile(None, &snapshot(json!({"rack": "A"})), Priority::new(50))
        .unwrap()
        .device_id
        .unwrap();
    engine
        .reconcile(Some(id), &snapshot(json!({"rack": "B"})), Priority::new(10))
        .unwrap();
    let device = engine.store().read(|tx| tx.require_device(id)).unwrap();
    assert_eq!(device.rack.as_deref(), Some("B"));
}

#[test]
fn unknown_device_is_an_error() {
    let engine = engine();
    let missing = DeviceId::new();
    let err = engine
        .reconcile(Some(missing), &snapshot(json!({})), Priority::MIN)
        .unwrap_err();
    assert!(matches!(err, ReconcileError::DeviceNotFound(id) if id == missing));
    assert!(matches!(engine.export(missing), Err(ReconcileError::DeviceNotFound(_))));
}

// ── Components ───────────────────────────────────────────────────

#[test]
fn disk_is_matched_by_serial() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"disks": [{"serial_number": "SN1", "size": 100, "family": "Seagate"}]}),
    );
    let first = components(&engine, id, ComponentClass::Disk);
    assert_eq!(first.len(), 1);

    update(&engine, id, json!({"disks": [{"serial_number": "SN1", "size": 200}]}));
    let second = components(&engine, id, ComponentClass::Disk);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert_eq!(second[0].get_i64("size"), Some(200));
    assert_eq!(second[0].model_id, first[0].model_id);

    let exported = engine.export(id).unwrap();
    assert_eq!(
        exported["disks"],
        json!([{"size": 200, "serial_number": "SN1", "model_name": "Seagate", "family": "Seagate"}])
    );
}

#[test]
fn unlisted_components_are_removed() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"disks": [
            {"serial_number": "SN1", "size": 100},
            {"serial_number": "SN2", "size": 100},
        ]}),
    );
    update(&engine, id, json!({"disks": [{"serial_number": "SN2"}]}));
    let disks = components(&engine, id, ComponentClass::Disk);
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].get_str("sn"), Some("SN2"));

    update(&engine, id, json!({"disks": []}));
    assert!(components(&engine, id, ComponentClass::Disk).is_empty());
}

#[test]
fn row_matching_two_disks_keeps_the_serial_match() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"disks": [
            {"serial_number": "A", "mount_point": "/a"},
            {"serial_number": "B", "mount_point": "/b"},
        ]}),
    );
    let before = components(&engine, id, ComponentClass::Disk);
    let a = before.iter().find(|d| d.get_str("sn") == Some("A")).unwrap().id;

    update(&engine, id, json!({"disks": [{"serial_number": "A", "mount_point": "/b"}]}));
    let disks = components(&engine, id, ComponentClass::Disk);
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0].id, a);
    assert_eq!(disks[0].get_str("mount_point"), Some("/b"));
}

#[test]
fn disk_kept_by_an_earlier_row_is_not_deleted() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"disks": [
            {"serial_number": "A", "mount_point": "/a"},
            {"serial_number": "B", "mount_point": "/b"},
        ]}),
    );
    let mut before: Vec<_> = components(&engine, id, ComponentClass::Disk)
        .into_iter()
        .map(|d| d.id)
        .collect();
    before.sort();

    update(
        &engine,
        id,
        json!({"disks": [
            {"serial_number": "B", "mount_point": "/b"},
            {"serial_number": "A", "mount_point": "/b"},
        ]}),
    );
    let disks = components(&engine, id, ComponentClass::Disk);
    let mut after: Vec<_> = disks.iter().map(|d| d.id).collect();
    after.sort();
    assert_eq!(after, before);
    assert!(disks.iter().all(|d| d.get_str("mount_point") == Some("/b")));
}

#[test]
fn absent_key_leaves_components_alone() {
    let engine = engine();
    let id = create(&engine, json!({"disks": [{"serial_number": "SN1"}]}));
    update(&engine, id, json!({"hostname": "renamed"}));
    assert_eq!(components(&engine, id, ComponentClass::Disk).len(), 1);
}

#[test]
fn processors_keep_their_identity_by_index() {
    let engine = engine();
    let cpus = json!({"processors": [
        {"label": "cpu0", "model_name": "Xeon E5-2640", "family": "Xeon", "cores": 6},
        {"label": "cpu1", "model_name": "Xeon E5-2640", "family": "Xeon", "cores": 6},
    ]});
    let id = create(&engine, cpus.clone());
    let first: Vec<_> = components(&engine, id, ComponentClass::Processor);
    update(&engine, id, cpus);
    let second = components(&engine, id, ComponentClass::Processor);

    let ids = |list: &[invrecon_model::Component]| {
        let mut pairs: Vec<_> = list
            .iter()
            .map(|c| (c.get_i64(INDEX_COLUMN), c.id))
            .collect();
        pairs.sort();
        pairs
    };
    assert_eq!(ids(&first), ids(&second));
    assert_eq!(second.len(), 2);
    assert_eq!(second[0].model_id, second[1].model_id);
}

#[test]
fn models_are_shared_between_devices() {
    let engine = engine();
    let cpu = |sn: &str| {
        json!({
            "serial_number": sn,
            "processors": [{"label": "cpu0", "model_name": "Xeon E5-2640", "family": "Xeon"}],
            "memory": [{"label": "DIMM A", "size": 8192}],
        })
    };
    let a = create(&engine, cpu("A"));
    let b = create(&engine, cpu("B"));
    let model_of = |id, class| components(&engine, id, class)[0].model_id;
    assert_eq!(model_of(a, ComponentClass::Processor), model_of(b, ComponentClass::Processor));
    assert_eq!(model_of(a, ComponentClass::Memory), model_of(b, ComponentClass::Memory));
    assert_eq!(engine.store().read(|tx| tx.count_component_models()).unwrap(), 2);
}

#[test]
fn model_name_taken_by_another_kind_is_renamed() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "processors": [{"label": "cpu0", "model_name": "Gold"}],
            "fibrechannel_cards": [{"label": "fc0", "physical_id": "01:00.0", "model_name": "Gold"}],
        }),
    );
    let exported = engine.export(id).unwrap();
    assert_eq!(exported["processors"][0]["model_name"], json!("Gold"));
    assert_eq!(exported["fibrechannel_cards"][0]["model_name"], json!("Gold (fibre)"));
}

#[test]
fn mac_addresses_are_normalized_and_deduplicated() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"mac_addresses": ["00:11:22:aa:bb:cc", "00-11-22-AA-BB-CC", "garbage"]}),
    );
    let exported = engine.export(id).unwrap();
    assert_eq!(exported["mac_addresses"], json!(["001122AABBCC"]));
}

#[test]
fn addresses_follow_the_snapshot() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "system_ip_addresses": ["10.0.0.1", "10.0.0.2"],
            "management_ip_addresses": ["10.1.0.1"],
        }),
    );
    let warnings = update(
        &engine,
        id,
        json!({"system_ip_addresses": ["10.0.0.2", "not-an-ip"]}),
    );
    assert_eq!(warnings.len(), 1);

    let exported = engine.export(id).unwrap();
    assert_eq!(exported["system_ip_addresses"], json!(["10.0.0.2"]));
    assert_eq!(exported["management_ip_addresses"], json!(["10.1.0.1"]));
    let detached = engine
        .store()
        .read(|tx| tx.find_address("10.0.0.1"))
        .unwrap()
        .unwrap();
    assert_eq!(detached.device_id, None);
}

#[test]
fn operating_system_is_read_from_the_snapshot_itself() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "system_label": "Debian 12",
            "system_memory": 65536,
            "system_cores_count": 16,
            "system_family": "Linux",
        }),
    );
    let systems = components(&engine, id, ComponentClass::OperatingSystem);
    assert_eq!(systems.len(), 1);

    let exported = engine.export(id).unwrap();
    assert_eq!(exported["system_label"], json!("Debian 12"));
    assert_eq!(exported["system_memory"], json!(65536));
    assert_eq!(exported["system_family"], json!("Linux"));
}

#[test]
fn unclassifiable_part_rolls_back_the_pass() {
    let engine = engine();
    let id = create(&engine, json!({"hostname": "before"}));
    let err = engine
        .reconcile(
            Some(id),
            &snapshot(json!({
                "hostname": "after",
                "parts": [{"serial_number": "P1", "type": "gizmo"}],
            })),
            Priority::new(100),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::UnknownModel { class: ComponentClass::GenericPart, type_name: Some(ref t) } if t == "gizmo"
    ));

    let device = engine.store().read(|tx| tx.require_device(id)).unwrap();
    assert_eq!(device.name, "before");
}

#[test]
fn parts_export_their_kind() {
    let engine = engine();
    let id = create(
        &engine,
        json!({"parts": [{"serial_number": "PSU-9", "type": "power module", "model_name": "PWS-1K"}]}),
    );
    let exported = engine.export(id).unwrap();
    assert_eq!(
        exported["parts"],
        json!([{"serial_number": "PSU-9", "model_name": "PWS-1K", "type": "power"}])
    );
}

// ── Disk shares ──────────────────────────────────────────────────

#[test]
fn mounts_resolve_share_address_and_server() {
    let engine = engine();
    create(
        &engine,
        json!({
            "serial_number": "STOR-1",
            "disk_exports": [{"serial_number": "WWN1", "size": 10, "label": "lun0"}],
        }),
    );
    let host = create(
        &engine,
        json!({
            "system_ip_addresses": ["10.0.0.5"],
            "disk_shares": [{
                "serial_number": "WWN1",
                "address": "10.0.0.5",
                "server": {"serial_number": "STOR-1"},
                "volume": "/data",
                "size": 5,
            }],
        }),
    );
    let exported = engine.export(host).unwrap();
    assert_eq!(
        exported["disk_shares"],
        json!([{
            "serial_number": "WWN1",
            "address": "10.0.0.5",
            "server": {"serial_number": "STOR-1"},
            "size": 5,
            "volume": "/data",
        }])
    );
}

#[test]
fn mount_of_unknown_share_is_skipped_with_a_warning() {
    let engine = engine();
    let outcome = engine
        .reconcile(
            None,
            &snapshot(json!({"disk_shares": [{"serial_number": "WWN-X", "volume": "v"}]})),
            Priority::new(100),
        )
        .unwrap();
    assert!(outcome.warnings.iter().any(|w| w.contains("WWN-X")));
    let id = outcome.device_id.unwrap();
    assert!(components(&engine, id, ComponentClass::DiskShareMount).is_empty());
}

// ── Subdevices ───────────────────────────────────────────────────

#[test]
fn blades_attach_physically_and_detach() {
    let engine = engine();
    let chassis = create(
        &engine,
        json!({
            "model_name": "BladeCenter H",
            "type": "blade system",
            "subdevices": [{"serial_number": "BL1", "hostname": "blade1"}],
        }),
    );
    let children = engine.store().read(|tx| tx.children_of(chassis)).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].parent_id, Some(chassis));
    assert_eq!(children[0].logical_parent_id, None);
    assert_eq!(children[0].name, "blade1");

    update(&engine, chassis, json!({"subdevices": []}));
    assert!(engine.store().read(|tx| tx.children_of(chassis)).unwrap().is_empty());
    let blade = engine.store().read(|tx| tx.find_device_by_sn("BL1")).unwrap();
    assert!(blade.is_some());
}

#[test]
fn stack_members_attach_logically() {
    let engine = engine();
    let stack = create(
        &engine,
        json!({
            "model_name": "Catalyst 3750 stack",
            "type": "switch_stack",
            "subdevices": [{"serial_number": "SW1"}, {"serial_number": "SW2"}],
        }),
    );
    let children = engine.store().read(|tx| tx.children_of(stack)).unwrap();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.logical_parent_id, Some(stack));
        assert_eq!(child.parent_id, None);
    }
    let exported = engine.export(stack).unwrap();
    assert_eq!(exported["subdevices"].as_array().map(Vec::len), Some(2));
}

#[test]
fn becoming_a_stack_keeps_physical_children() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "serial_number": "P1",
            "model_name": "Box",
            "subdevices": [{"serial_number": "C1"}],
        }),
    );
    update(&engine, id, json!({"model_name": "Box", "type": "switch_stack"}));
    let exported = engine.export(id).unwrap();
    update(&engine, id, Value::Object(exported));

    let children = engine.store().read(|tx| tx.children_of(id)).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].parent_id, Some(id));
    assert_eq!(children[0].sn.as_deref(), Some("C1"));
}

#[test]
fn subdevice_without_identity_is_skipped() {
    let engine = engine();
    let outcome = engine
        .reconcile(
            None,
            &snapshot(json!({"subdevices": [{"hostname": "anonymous"}]})),
            Priority::new(100),
        )
        .unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    let id = outcome.device_id.unwrap();
    assert!(engine.store().read(|tx| tx.children_of(id)).unwrap().is_empty());
}

// ── Export ───────────────────────────────────────────────────────

#[test]
fn export_is_a_fixed_point() {
    let engine = engine();
    let id = create(
        &engine,
        json!({
            "serial_number": "SRV-9",
            "hostname": "app9",
            "model_name": "ProLiant DL380",
            "type": "rack_server",
            "rack": "R1",
            "chassis_position": 4,
            "mac_addresses": ["00:25:90:AA:BB:01", "00:25:90:AA:BB:02"],
            "system_ip_addresses": ["10.2.0.9"],
            "memory": [
                {"label": "DIMM 0", "size": 16384, "speed": 1600},
                {"label": "DIMM 1", "size": 16384, "speed": 1600},
            ],
            "processors": [{"label": "cpu0", "model_name": "Xeon E5-2650", "family": "Xeon", "cores": 8}],
            "disks": [
                {"serial_number": "D-2", "size": 300, "family": "HP"},
                {"serial_number": "D-1", "size": 300, "family": "HP"},
            ],
            "installed_software": [{"path": "nginx", "label": "nginx", "version": "1.24"}],
            "system_label": "Ubuntu 22.04",
            "subdevices": [{"serial_number": "ILO-9", "hostname": "app9-ilo"}],
        }),
    );
    let first = engine.export(id).unwrap();
    let warnings = update(&engine, id, Value::Object(first.clone()));
    assert!(warnings.is_empty(), "{warnings:?}");
    let second = engine.export(id).unwrap();
    assert_eq!(first, second);
}

// ── Concurrency ──────────────────────────────────────────────────

#[test]
fn concurrent_workers_share_one_model() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inventory.db");
    let stores: Vec<InventoryStore> = (0..4)
        .map(|_| InventoryStore::open(&path, &StoreOptions::default()).unwrap())
        .collect();

    let handles: Vec<_> = stores
        .into_iter()
        .enumerate()
        .map(|(n, store)| {
            thread::spawn(move || {
                let engine = InventoryEngine::new(store, ReconcileConfig::default());
                engine
                    .reconcile(
                        None,
                        &snapshot(json!({
                            "serial_number": format!("NODE-{n}"),
                            "processors": [{"label": "cpu0", "model_name": "EPYC 7302"}],
                        })),
                        Priority::new(100),
                    )
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let store = InventoryStore::open(&path, &StoreOptions::default()).unwrap();
    assert_eq!(store.read(|tx| tx.list_devices()).unwrap().len(), 4);
    assert_eq!(store.read(|tx| tx.count_component_models()).unwrap(), 1);
}
