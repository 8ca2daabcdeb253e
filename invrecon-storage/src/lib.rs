//! SQLite storage layer for the inventory reconciliation engine.
//!
//! Persists devices, device models, components, component models and IP
//! addresses. Component columns are stored as a JSON document per row and
//! queried through SQLite's JSON1 functions, so one table serves every
//! component class.
//!
//! # Architecture
//!
//! - [`InventoryStore`] owns the connection; every unit of work runs inside
//!   [`InventoryStore::transaction`]
//! - [`StoreTx`] exposes the queries the reconciler needs
//! - Unique constraints (model names, device serials and barcodes) surface as
//!   [`StorageError::Conflict`] so creation races can be recovered from

mod error;
mod store;
mod tx;

pub use error::{StorageError, StorageResult};
pub use store::{InventoryStore, StoreOptions};
pub use tx::StoreTx;
