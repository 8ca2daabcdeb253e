//! Per-class component schemas.
//!
//! Every component class has a closed field map: only the columns listed here
//! are ever written from a probe payload, and unknown payload keys are
//! ignored. The same table declares the unique-key groups used to match
//! incoming rows against persisted components, and how a row resolves its
//! shared [`crate::ComponentModel`].

use crate::snapshot::Row;
use invrecon_types::{ComponentClass, ComponentKind};
use serde::Serialize;
use serde_json::Value;

/// Pseudo-column naming the owning device in unique-key groups.
pub const DEVICE_COLUMN: &str = "device";

/// Column holding a row's position in the submitted list.
pub const INDEX_COLUMN: &str = "index";

/// Longest family string used as a model lookup key.
pub const MAX_FAMILY_LEN: usize = 128;

/// Truncates a family to [`MAX_FAMILY_LEN`] characters.
#[must_use]
pub fn truncate_family(family: &str) -> String {
    family.chars().take(MAX_FAMILY_LEN).collect()
}

/// The storage type of a component column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Integer,
    Bool,
    /// Id of another record, stored as a string.
    Reference,
}

impl FieldType {
    /// Converts a payload value into this column's type.
    ///
    /// Returns `None` for nulls and for values that cannot be represented,
    /// which callers treat as "field not supplied".
    #[must_use]
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match (self, value) {
            (_, Value::Null) => None,
            (Self::Text, Value::String(s)) => Some(Value::String(s.clone())),
            (Self::Text, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Self::Text, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .map(Value::from),
            (Self::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (Self::Bool, Value::Bool(b)) => Some(Value::Bool(*b)),
            (Self::Bool, Value::Number(n)) => n.as_i64().map(|i| Value::Bool(i != 0)),
            (Self::Bool, Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => Some(Value::Bool(true)),
                "false" | "0" | "no" => Some(Value::Bool(false)),
                _ => None,
            },
            (Self::Reference, Value::String(s)) if !s.is_empty() => Some(Value::String(s.clone())),
            _ => None,
        }
    }
}

/// Maps one component column to the payload key it is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    pub column: &'static str,
    pub key: &'static str,
    pub field_type: FieldType,
}

impl FieldMapping {
    pub const fn text(column: &'static str, key: &'static str) -> Self {
        Self { column, key, field_type: FieldType::Text }
    }

    pub const fn integer(column: &'static str, key: &'static str) -> Self {
        Self { column, key, field_type: FieldType::Integer }
    }

    pub const fn bool(column: &'static str, key: &'static str) -> Self {
        Self { column, key, field_type: FieldType::Bool }
    }

    pub const fn reference(column: &'static str, key: &'static str) -> Self {
        Self { column, key, field_type: FieldType::Reference }
    }
}

/// How rows of a class resolve their shared model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Ambient classification; when set it wins over the row's type key.
    pub kind: Option<ComponentKind>,
    pub name_key: &'static str,
    pub family_key: &'static str,
    /// Payload key carrying an explicit type string, if the class reads one.
    pub type_key: Option<&'static str>,
    /// Payload keys copied into the model's free-text attributes on creation.
    pub attributes: &'static [&'static str],
    /// Model fields a row may not supply for this class.
    pub forbidden: &'static [&'static str],
    /// Family used when the row supplies none.
    pub default_family: Option<&'static str>,
    /// Payload key the family falls back to when none is supplied.
    pub family_from: Option<&'static str>,
    /// Rows that cannot be classified abort the pass instead of being saved
    /// unmodeled.
    pub required: bool,
}

impl ModelSpec {
    const BASE: Self = Self {
        kind: None,
        name_key: "model_name",
        family_key: "family",
        type_key: Some("type"),
        attributes: &[],
        forbidden: &[],
        default_family: None,
        family_from: None,
        required: false,
    };

    /// True when `field` ("name", "family", ...) may not come from the row.
    #[must_use]
    pub fn forbids(&self, field: &str) -> bool {
        self.forbidden.contains(&field)
    }
}

/// Field map, unique-key groups and model semantics of one component class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSchema {
    pub class: ComponentClass,
    /// Snapshot key holding the list of rows. `None` for classes read from
    /// the snapshot itself (operating system).
    pub payload_key: Option<&'static str>,
    pub fields: &'static [FieldMapping],
    /// Alternative column sets identifying an existing row. [`DEVICE_COLUMN`]
    /// names the owning device.
    pub unique_groups: &'static [&'static [&'static str]],
    pub model: Option<ModelSpec>,
}

impl ComponentSchema {
    /// All schemas, in the order the device reconciler applies them.
    pub fn all() -> impl Iterator<Item = &'static ComponentSchema> {
        ComponentClass::ALL.into_iter().map(schema_for)
    }

    /// Looks up the mapping for a column.
    #[must_use]
    pub fn mapping(&self, column: &str) -> Option<&'static FieldMapping> {
        self.fields.iter().find(|m| m.column == column)
    }

    /// Reads and coerces a column's value from an incoming row.
    #[must_use]
    pub fn row_value(&self, row: &Row, column: &str) -> Option<Value> {
        let mapping = self.mapping(column)?;
        row.get(mapping.key).and_then(|v| mapping.field_type.coerce(v))
    }

    #[must_use]
    pub fn has_model_semantics(&self) -> bool {
        self.model.is_some()
    }

    /// True if a snapshot carries any key this class reads. Used for classes
    /// without a list key.
    #[must_use]
    pub fn mentioned_by(&self, snapshot: &Row) -> bool {
        let model_keys = self
            .model
            .iter()
            .flat_map(|m| [m.name_key, m.family_key]);
        self.fields
            .iter()
            .map(|f| f.key)
            .chain(model_keys)
            .any(|key| snapshot.contains_key(key))
    }
}

static DISK: ComponentSchema = ComponentSchema {
    class: ComponentClass::Disk,
    payload_key: Some("disks"),
    fields: &[
        FieldMapping::text("sn", "serial_number"),
        FieldMapping::integer("size", "size"),
        FieldMapping::integer("speed", "speed"),
        FieldMapping::text("mount_point", "mount_point"),
        FieldMapping::text("label", "label"),
    ],
    unique_groups: &[&["sn"], &[DEVICE_COLUMN, "mount_point"]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Disk),
        attributes: &["size", "speed"],
        forbidden: &["name"],
        default_family: Some("Generic disk"),
        ..ModelSpec::BASE
    }),
};

static MEMORY: ComponentSchema = ComponentSchema {
    class: ComponentClass::Memory,
    payload_key: Some("memory"),
    fields: &[
        FieldMapping::text("label", "label"),
        FieldMapping::integer("size", "size"),
        FieldMapping::integer("speed", "speed"),
        FieldMapping::integer(INDEX_COLUMN, INDEX_COLUMN),
    ],
    unique_groups: &[&[DEVICE_COLUMN, INDEX_COLUMN]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Memory),
        attributes: &["size", "speed"],
        forbidden: &["name"],
        ..ModelSpec::BASE
    }),
};

static PROCESSOR: ComponentSchema = ComponentSchema {
    class: ComponentClass::Processor,
    payload_key: Some("processors"),
    fields: &[
        FieldMapping::text("label", "label"),
        FieldMapping::integer("speed", "speed"),
        FieldMapping::integer("cores", "cores"),
        FieldMapping::integer(INDEX_COLUMN, INDEX_COLUMN),
    ],
    unique_groups: &[&[DEVICE_COLUMN, INDEX_COLUMN]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Processor),
        attributes: &["speed", "cores"],
        ..ModelSpec::BASE
    }),
};

static ETHERNET: ComponentSchema = ComponentSchema {
    class: ComponentClass::Ethernet,
    payload_key: Some("mac_addresses"),
    fields: &[FieldMapping::text("mac", "mac")],
    unique_groups: &[&["mac"]],
    model: None,
};

static FIBRE_CHANNEL_CARD: ComponentSchema = ComponentSchema {
    class: ComponentClass::FibreChannelCard,
    payload_key: Some("fibrechannel_cards"),
    fields: &[
        FieldMapping::text("label", "label"),
        FieldMapping::text("physical_id", "physical_id"),
    ],
    unique_groups: &[&["physical_id", DEVICE_COLUMN]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Fibre),
        ..ModelSpec::BASE
    }),
};

static GENERIC_PART: ComponentSchema = ComponentSchema {
    class: ComponentClass::GenericPart,
    payload_key: Some("parts"),
    fields: &[
        FieldMapping::text("label", "label"),
        FieldMapping::text("sn", "serial_number"),
        FieldMapping::text("boot_firmware", "boot_firmware"),
        FieldMapping::text("hard_firmware", "hard_firmware"),
        FieldMapping::text("diag_firmware", "diag_firmware"),
        FieldMapping::text("mgmt_firmware", "mgmt_firmware"),
    ],
    unique_groups: &[&["sn"]],
    model: Some(ModelSpec {
        required: true,
        ..ModelSpec::BASE
    }),
};

static DISK_SHARE: ComponentSchema = ComponentSchema {
    class: ComponentClass::DiskShare,
    payload_key: Some("disk_exports"),
    fields: &[
        FieldMapping::text("label", "label"),
        FieldMapping::text("wwn", "serial_number"),
        FieldMapping::integer("size", "size"),
        FieldMapping::bool("full", "full"),
        FieldMapping::integer("snapshot_size", "snapshot_size"),
        FieldMapping::integer("share_id", "share_id"),
    ],
    unique_groups: &[&["wwn"]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Share),
        ..ModelSpec::BASE
    }),
};

static DISK_SHARE_MOUNT: ComponentSchema = ComponentSchema {
    class: ComponentClass::DiskShareMount,
    payload_key: Some("disk_shares"),
    fields: &[
        FieldMapping::reference("share", "share"),
        FieldMapping::integer("size", "size"),
        FieldMapping::reference("address", "address"),
        FieldMapping::bool("is_virtual", "is_virtual"),
        FieldMapping::text("volume", "volume"),
        FieldMapping::reference("server", "server"),
    ],
    unique_groups: &[&[DEVICE_COLUMN, "share"]],
    model: None,
};

static SOFTWARE: ComponentSchema = ComponentSchema {
    class: ComponentClass::Software,
    payload_key: Some("installed_software"),
    fields: &[
        FieldMapping::text("path", "path"),
        FieldMapping::text("label", "label"),
        FieldMapping::text("version", "version"),
        FieldMapping::text("sn", "serial_number"),
    ],
    unique_groups: &[&[DEVICE_COLUMN, "path"]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Software),
        family_from: Some("path"),
        ..ModelSpec::BASE
    }),
};

static OPERATING_SYSTEM: ComponentSchema = ComponentSchema {
    class: ComponentClass::OperatingSystem,
    payload_key: None,
    fields: &[
        FieldMapping::integer("memory", "system_memory"),
        FieldMapping::integer("storage", "system_storage"),
        FieldMapping::integer("cores_count", "system_cores_count"),
        FieldMapping::text("label", "system_label"),
    ],
    unique_groups: &[&[DEVICE_COLUMN]],
    model: Some(ModelSpec {
        kind: Some(ComponentKind::Os),
        name_key: "system_model_name",
        family_key: "system_family",
        type_key: None,
        ..ModelSpec::BASE
    }),
};

/// Returns the schema of a component class.
#[must_use]
pub fn schema_for(class: ComponentClass) -> &'static ComponentSchema {
    match class {
        ComponentClass::Disk => &DISK,
        ComponentClass::Memory => &MEMORY,
        ComponentClass::Processor => &PROCESSOR,
        ComponentClass::Ethernet => &ETHERNET,
        ComponentClass::FibreChannelCard => &FIBRE_CHANNEL_CARD,
        ComponentClass::GenericPart => &GENERIC_PART,
        ComponentClass::DiskShare => &DISK_SHARE,
        ComponentClass::DiskShareMount => &DISK_SHARE_MOUNT,
        ComponentClass::Software => &SOFTWARE,
        ComponentClass::OperatingSystem => &OPERATING_SYSTEM,
    }
}
