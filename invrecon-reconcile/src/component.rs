//! Full-snapshot reconciliation of one component class of one device.

use crate::config::SavePolicy;
use crate::error::{ModelError, ReconcileError, ReconcileResult};
use crate::matcher;
use crate::registry::resolve_model;
use invrecon_model::{Component, ComponentSchema, Row, INDEX_COLUMN};
use invrecon_storage::StoreTx;
use invrecon_types::{ComponentId, DeviceId};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Makes the persisted components of one class equal to a submitted list.
pub struct ComponentReconciler<'t, 'c> {
    tx: &'t StoreTx<'c>,
    policy: SavePolicy,
}

impl<'t, 'c> ComponentReconciler<'t, 'c> {
    pub fn new(tx: &'t StoreTx<'c>, policy: SavePolicy) -> Self {
        Self { tx, policy }
    }

    /// Reconciles `rows` into the `schema.class` components of `device`.
    ///
    /// Rows are matched, created or updated in submission order; a row's
    /// index is its position in `rows`. Components of the class that no row
    /// matched are deleted afterwards. Returns the ids of the kept
    /// components, in row order.
    pub fn reconcile(
        &self,
        device: DeviceId,
        schema: &ComponentSchema,
        rows: Vec<Row>,
    ) -> ReconcileResult<Vec<ComponentId>> {
        let mut kept = Vec::with_capacity(rows.len());
        for (index, mut row) in rows.into_iter().enumerate() {
            row.insert(INDEX_COLUMN.to_string(), Value::from(index));
            let id = self.reconcile_row(device, schema, &row, &kept)?;
            kept.push(id);
        }
        self.remove_stale(device, schema, &kept)?;
        Ok(kept)
    }

    fn reconcile_row(
        &self,
        device: DeviceId,
        schema: &ComponentSchema,
        row: &Row,
        claimed: &[ComponentId],
    ) -> ReconcileResult<ComponentId> {
        let mut component = match matcher::find_existing(self.tx, schema, device, row, claimed)? {
            Some(existing) => {
                debug!("{} row matched {}", schema.class, existing.id);
                existing
            }
            None => self.create(device, schema, row)?,
        };
        component.device_id = device;
        self.copy_fields(&mut component, schema, row);

        if component.model_id.is_none() {
            if let Some(spec) = &schema.model {
                match resolve_model(self.tx, spec, self.policy.priority, row) {
                    Ok(Some(model)) => component.model_id = Some(model.id),
                    Ok(None) => {}
                    Err(ModelError::UnknownKind(type_name)) => {
                        debug!("{} {} stays unmodeled (type {:?})", schema.class, component.id, type_name);
                    }
                    Err(ModelError::Storage(err)) => return Err(err.into()),
                }
            }
        }

        self.tx.save_component(&component)?;
        Ok(component.id)
    }

    /// Builds a new component, modeled when the row carries type information.
    fn create(
        &self,
        device: DeviceId,
        schema: &ComponentSchema,
        row: &Row,
    ) -> ReconcileResult<Component> {
        let mut component = Component::new(schema.class, device);
        let Some(spec) = &schema.model else {
            return Ok(component);
        };
        let has_type = spec.kind.is_some() || spec.type_key.is_some_and(|key| row.contains_key(key));
        if !has_type {
            return Ok(component);
        }
        match resolve_model(self.tx, spec, self.policy.priority, row) {
            Ok(model) => component.model_id = model.map(|m| m.id),
            Err(ModelError::UnknownKind(type_name)) if spec.required => {
                return Err(ReconcileError::UnknownModel {
                    class: schema.class,
                    type_name,
                });
            }
            Err(ModelError::UnknownKind(_)) => {}
            Err(ModelError::Storage(err)) => return Err(err.into()),
        }
        debug!("{} row creates {}", schema.class, component.id);
        Ok(component)
    }

    /// Copies the schema's columns from the row, honouring field priorities.
    fn copy_fields(&self, component: &mut Component, schema: &ComponentSchema, row: &Row) {
        for mapping in schema.fields {
            let Some(raw) = row.get(mapping.key) else {
                continue;
            };
            if !component
                .priorities
                .claim(mapping.column, self.policy.priority, self.policy.force)
            {
                debug!(
                    "{} {}: keeping {} written at higher priority",
                    schema.class, component.id, mapping.column
                );
                continue;
            }
            match mapping.field_type.coerce(raw) {
                Some(value) => {
                    component.data.insert(mapping.column.to_string(), value);
                }
                None => {
                    component.data.remove(mapping.column);
                }
            }
        }
    }

    fn remove_stale(
        &self,
        device: DeviceId,
        schema: &ComponentSchema,
        kept: &[ComponentId],
    ) -> ReconcileResult<()> {
        let kept: HashSet<ComponentId> = kept.iter().copied().collect();
        for stale in self.tx.components_of(device, schema.class)? {
            if !kept.contains(&stale.id) {
                debug!("removing stale {} {}", schema.class, stale.id);
                self.tx.delete_component(stale.id)?;
            }
        }
        Ok(())
    }
}
