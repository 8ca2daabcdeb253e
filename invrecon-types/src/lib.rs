//! Core type definitions for the inventory reconciliation engine.
//!
//! This crate defines the fundamental types shared by every layer:
//! - Record identifiers (UUID v7) for devices, components, models and addresses
//! - Closed classifications for component models, component record classes
//!   and device models, each with an explicit "unknown" fallback
//! - Save priorities attached to every reconciliation pass
//! - Normalization of the identity fields probes report (MACs, serials)

mod ids;
mod kind;
mod mac;
mod priority;
mod serial;

pub use ids::{AddressId, ComponentId, DeviceId, ModelId};
pub use kind::{ComponentClass, ComponentKind, DeviceKind};
pub use mac::{MacAddress, MAC_PREFIX_BLACKLIST};
pub use priority::Priority;
pub use serial::{clean_serial, SERIAL_BLACKLIST};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("unknown {what}: {name}")]
    UnknownKind { what: &'static str, name: String },
}
