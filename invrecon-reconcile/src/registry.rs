//! Create-or-reuse of shared component models.

use crate::error::{ModelError, ModelResult};
use invrecon_model::{truncate_family, ComponentModel, ModelSpec, Row};
use invrecon_storage::StoreTx;
use invrecon_types::{ComponentKind, ModelId, Priority};
use serde_json::{Map, Value};
use tracing::{debug, warn};

fn non_empty(row: &Row, key: &str) -> Option<String> {
    match row.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Model identity derived from one incoming row.
#[derive(Debug, Clone, PartialEq)]
struct ModelKey {
    kind: ComponentKind,
    name: String,
    family: String,
    /// Look models up by family instead of name.
    by_family: bool,
    attributes: Map<String, Value>,
}

impl ModelKey {
    fn from_row(spec: &ModelSpec, row: &Row) -> ModelResult<Self> {
        let type_name = spec.type_key.and_then(|key| non_empty(row, key));
        let kind = spec
            .kind
            .or_else(|| type_name.as_deref().and_then(ComponentKind::from_name))
            .ok_or_else(|| ModelError::UnknownKind(type_name.clone()))?;

        let family = non_empty(row, spec.family_key)
            .or_else(|| spec.family_from.and_then(|key| non_empty(row, key)))
            .or_else(|| spec.default_family.map(str::to_string))
            .map(|f| truncate_family(&f))
            .unwrap_or_default();

        let by_family = spec.forbids("name");
        let name = if by_family {
            match kind {
                ComponentKind::Memory => format!("RAM {family}").trim().to_string(),
                _ => family.clone(),
            }
        } else {
            non_empty(row, spec.name_key).unwrap_or_else(|| family.clone())
        };
        let name = if name.is_empty() {
            kind.label().to_string()
        } else {
            name
        };

        let attributes = spec
            .attributes
            .iter()
            .filter_map(|key| {
                row.get(*key)
                    .filter(|v| !v.is_null())
                    .map(|v| ((*key).to_string(), v.clone()))
            })
            .collect();

        Ok(Self {
            kind,
            name,
            family,
            by_family,
            attributes,
        })
    }

    fn lookup(&self, tx: &StoreTx<'_>) -> ModelResult<Option<ComponentModel>> {
        Ok(if self.by_family {
            tx.find_component_model_by_family(&self.family, self.kind)?
        } else {
            tx.find_component_model_by_name(&self.name, self.kind)?
        })
    }

    fn build(&self, name: String, priority: Priority) -> ComponentModel {
        ComponentModel {
            id: ModelId::new(),
            name,
            family: self.family.clone(),
            kind: self.kind,
            attributes: self.attributes.clone(),
            priority,
        }
    }
}

/// Tries to insert `model`; `Ok(None)` means the name is taken.
fn try_insert(tx: &StoreTx<'_>, model: ComponentModel) -> ModelResult<Option<ComponentModel>> {
    match tx.insert_component_model(&model) {
        Ok(()) => {
            debug!("created {} model {:?}", model.kind, model.name);
            Ok(Some(model))
        }
        Err(err) if err.is_conflict() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Finds or creates the model a row describes.
///
/// Models are keyed by `(name, kind)`, or `(family, kind)` for classes that
/// forbid a row-supplied name. Model names are globally unique, so creation
/// can collide with a model of another kind or with a concurrent creator. A
/// collision is answered by re-querying, then by retrying under
/// `"{name} ({kind})"`. If that name is taken too the component is left
/// unmodeled (`Ok(None)`).
pub fn resolve_model(
    tx: &StoreTx<'_>,
    spec: &ModelSpec,
    priority: Priority,
    row: &Row,
) -> ModelResult<Option<ComponentModel>> {
    let key = ModelKey::from_row(spec, row)?;
    if let Some(model) = key.lookup(tx)? {
        return Ok(Some(model));
    }
    if let Some(model) = try_insert(tx, key.build(key.name.clone(), priority))? {
        return Ok(Some(model));
    }
    if let Some(model) = key.lookup(tx)? {
        return Ok(Some(model));
    }
    if key.kind == ComponentKind::Unknown {
        warn!("model name {:?} is taken, leaving component unmodeled", key.name);
        return Ok(None);
    }

    let renamed = format!("{} ({})", key.name, key.kind);
    if let Some(model) = tx.find_component_model_by_name(&renamed, key.kind)? {
        return Ok(Some(model));
    }
    if let Some(model) = try_insert(tx, key.build(renamed.clone(), priority))? {
        return Ok(Some(model));
    }
    let model = tx.find_component_model_by_name(&renamed, key.kind)?;
    if model.is_none() {
        warn!("model names {:?} and {:?} are taken, leaving component unmodeled", key.name, renamed);
    }
    Ok(model)
}
