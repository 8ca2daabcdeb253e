//! Error types for reconciliation.

use invrecon_storage::StorageError;
use invrecon_types::{ComponentClass, DeviceId};
use thiserror::Error;

/// Result type for reconciliation operations.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

fn join_ids(ids: &[DeviceId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that abort a device pass. The surrounding transaction is rolled
/// back when one of these is returned.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A component class needs a model and none could be inferred.
    #[error("unknown model for {class} component (type {type_name:?})")]
    UnknownModel {
        class: ComponentClass,
        type_name: Option<String>,
    },

    /// The scan matches more than one persisted device.
    #[error("multiple devices match the scan: {}", join_ids(.0))]
    MultipleCandidates(Vec<DeviceId>),

    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a component model could not be resolved.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Neither the row nor the class names a classifiable kind.
    #[error("cannot classify component model (type {0:?})")]
    UnknownKind(Option<String>),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for model resolution.
pub type ModelResult<T> = Result<T, ModelError>;
