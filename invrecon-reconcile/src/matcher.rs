//! Unique-key matching of incoming rows against persisted components.

use crate::error::ReconcileResult;
use invrecon_model::{Component, ComponentSchema, Row, DEVICE_COLUMN};
use invrecon_storage::StoreTx;
use invrecon_types::{ComponentId, DeviceId};
use serde_json::Value;
use tracing::{debug, warn};

/// Finds the persisted component an incoming row describes.
///
/// Every unique-key group of the schema is tried. A group is only eligible
/// when the row supplies all of its columns. When two groups resolve to
/// different components, the first match wins and the later one is deleted
/// so the pass never produces a duplicate. Components listed in `claimed`
/// were already matched by an earlier row of the same pass and are never
/// deleted.
pub fn find_existing(
    tx: &StoreTx<'_>,
    schema: &ComponentSchema,
    device: DeviceId,
    row: &Row,
    claimed: &[ComponentId],
) -> ReconcileResult<Option<Component>> {
    let mut found: Option<Component> = None;
    for group in schema.unique_groups {
        let Some(candidate) = match_group(tx, schema, group, device, row)? else {
            continue;
        };
        match &found {
            None => found = Some(candidate),
            Some(first) if first.id == candidate.id => {}
            Some(first) if claimed.contains(&candidate.id) => {
                warn!(
                    "{} {} matched by {:?} conflicts with {} but is kept by an earlier row",
                    schema.class, candidate.id, group, first.id
                );
            }
            Some(first) => {
                warn!(
                    "{} {} matched by {:?} duplicates {}, deleting it",
                    schema.class, candidate.id, group, first.id
                );
                tx.delete_component(candidate.id)?;
            }
        }
    }
    Ok(found)
}

fn match_group(
    tx: &StoreTx<'_>,
    schema: &ComponentSchema,
    group: &[&str],
    device: DeviceId,
    row: &Row,
) -> ReconcileResult<Option<Component>> {
    let mut scope = None;
    let mut values: Vec<(&str, Value)> = Vec::with_capacity(group.len());
    for column in group {
        if *column == DEVICE_COLUMN {
            scope = Some(device);
            continue;
        }
        match schema.row_value(row, column) {
            Some(value) => values.push((*column, value)),
            None => return Ok(None),
        }
    }
    if values.is_empty() && scope.is_none() {
        return Ok(None);
    }
    let filter: Vec<(&str, &Value)> = values.iter().map(|(c, v)| (*c, v)).collect();
    let mut matches = tx.find_components(schema.class, scope, &filter)?;
    if matches.len() > 1 {
        debug!(
            "{} rows of {} match {:?}, using the oldest",
            matches.len(),
            schema.class,
            group
        );
    }
    Ok(if matches.is_empty() {
        None
    } else {
        Some(matches.swap_remove(0))
    })
}
