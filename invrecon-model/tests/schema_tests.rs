use invrecon_model::{
    schema_for, truncate_family, ComponentSchema, FieldMapping, FieldType, Row, DEVICE_COLUMN,
    INDEX_COLUMN, MAX_FAMILY_LEN,
};
use invrecon_types::{ComponentClass, ComponentKind};
use serde_json::{json, Value};

fn row(value: Value) -> Row {
    value.as_object().cloned().unwrap()
}

// ── FieldMapping constructors ────────────────────────────────────

#[test]
fn text_mapping() {
    let m = FieldMapping::text("sn", "serial_number");
    assert_eq!(m.column, "sn");
    assert_eq!(m.key, "serial_number");
    assert_eq!(m.field_type, FieldType::Text);
}

#[test]
fn reference_mapping() {
    let m = FieldMapping::reference("share", "share");
    assert_eq!(m.field_type, FieldType::Reference);
}

// ── FieldType coercion ───────────────────────────────────────────

#[test]
fn null_is_never_a_value() {
    for ty in [FieldType::Text, FieldType::Integer, FieldType::Bool, FieldType::Reference] {
        assert_eq!(ty.coerce(&Value::Null), None);
    }
}

#[test]
fn integer_accepts_numeric_strings() {
    assert_eq!(FieldType::Integer.coerce(&json!("200")), Some(json!(200)));
    assert_eq!(FieldType::Integer.coerce(&json!(" 7 ")), Some(json!(7)));
    assert_eq!(FieldType::Integer.coerce(&json!("big")), None);
}

#[test]
fn integer_truncates_floats() {
    assert_eq!(FieldType::Integer.coerce(&json!(2.9)), Some(json!(2)));
}

#[test]
fn text_stringifies_numbers() {
    assert_eq!(FieldType::Text.coerce(&json!(12)), Some(json!("12")));
}

#[test]
fn bool_accepts_common_spellings() {
    assert_eq!(FieldType::Bool.coerce(&json!("true")), Some(json!(true)));
    assert_eq!(FieldType::Bool.coerce(&json!("0")), Some(json!(false)));
    assert_eq!(FieldType::Bool.coerce(&json!(1)), Some(json!(true)));
    assert_eq!(FieldType::Bool.coerce(&json!("maybe")), None);
}

#[test]
fn empty_reference_is_absent() {
    assert_eq!(FieldType::Reference.coerce(&json!("")), None);
}

// ── Schema table ─────────────────────────────────────────────────

#[test]
fn every_class_has_a_schema() {
    for class in ComponentClass::ALL {
        assert_eq!(schema_for(class).class, class);
    }
    assert_eq!(ComponentSchema::all().count(), ComponentClass::ALL.len());
}

#[test]
fn disk_groups_and_forbidden_name() {
    let disk = schema_for(ComponentClass::Disk);
    assert_eq!(disk.unique_groups, &[&["sn"][..], &[DEVICE_COLUMN, "mount_point"][..]]);
    let model = disk.model.unwrap();
    assert!(model.forbids("name"));
    assert_eq!(model.default_family, Some("Generic disk"));
    assert_eq!(model.kind, Some(ComponentKind::Disk));
}

#[test]
fn index_addressed_classes() {
    for class in [ComponentClass::Processor, ComponentClass::Memory] {
        let schema = schema_for(class);
        assert_eq!(schema.unique_groups, &[&[DEVICE_COLUMN, INDEX_COLUMN][..]]);
        assert!(schema.mapping(INDEX_COLUMN).is_some());
    }
    assert!(schema_for(ComponentClass::Memory).model.unwrap().forbids("name"));
    assert!(!schema_for(ComponentClass::Processor).model.unwrap().forbids("name"));
}

#[test]
fn unmodeled_classes() {
    assert!(!schema_for(ComponentClass::Ethernet).has_model_semantics());
    assert!(!schema_for(ComponentClass::DiskShareMount).has_model_semantics());
    assert!(schema_for(ComponentClass::GenericPart).model.unwrap().required);
}

#[test]
fn software_family_falls_back_to_path() {
    let model = schema_for(ComponentClass::Software).model.unwrap();
    assert_eq!(model.family_from, Some("path"));
}

#[test]
fn row_value_reads_the_payload_key() {
    let disk = schema_for(ComponentClass::Disk);
    let r = row(json!({"serial_number": "SN1", "size": "100", "vendor": "ignored"}));
    assert_eq!(disk.row_value(&r, "sn"), Some(json!("SN1")));
    assert_eq!(disk.row_value(&r, "size"), Some(json!(100)));
    assert_eq!(disk.row_value(&r, "vendor"), None);
    assert_eq!(disk.row_value(&r, "serial_number"), None);
}

#[test]
fn operating_system_is_read_from_snapshot_keys() {
    let os = schema_for(ComponentClass::OperatingSystem);
    assert_eq!(os.payload_key, None);
    assert!(os.mentioned_by(&row(json!({"system_label": "Debian"}))));
    assert!(os.mentioned_by(&row(json!({"system_family": "Linux"}))));
    assert!(!os.mentioned_by(&row(json!({"hostname": "db1"}))));
}

#[test]
fn family_truncation_counts_characters() {
    let long = "ż".repeat(MAX_FAMILY_LEN + 10);
    let truncated = truncate_family(&long);
    assert_eq!(truncated.chars().count(), MAX_FAMILY_LEN);
    assert_eq!(truncate_family("short"), "short");
}
