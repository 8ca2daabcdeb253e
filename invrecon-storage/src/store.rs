//! Store handle and transaction boundary.

use crate::error::{StorageError, StorageResult};
use crate::tx::StoreTx;
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS device_models (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS devices (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        sn TEXT UNIQUE,
        barcode TEXT UNIQUE,
        model_id TEXT REFERENCES device_models(id) ON DELETE SET NULL,
        parent_id TEXT REFERENCES devices(id) ON DELETE SET NULL,
        logical_parent_id TEXT REFERENCES devices(id) ON DELETE SET NULL,
        dc TEXT,
        rack TEXT,
        chassis_position INTEGER,
        priorities TEXT NOT NULL DEFAULT '{}'
    );

    CREATE TABLE IF NOT EXISTS component_models (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        family TEXT NOT NULL,
        kind TEXT NOT NULL,
        attributes TEXT NOT NULL DEFAULT '{}',
        priority INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS components (
        id TEXT PRIMARY KEY,
        class TEXT NOT NULL,
        device_id TEXT NOT NULL REFERENCES devices(id) ON DELETE CASCADE,
        model_id TEXT REFERENCES component_models(id) ON DELETE SET NULL,
        data TEXT NOT NULL DEFAULT '{}',
        priorities TEXT NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_components_device ON components(device_id, class);

    CREATE TABLE IF NOT EXISTS ip_addresses (
        id TEXT PRIMARY KEY,
        address TEXT NOT NULL UNIQUE,
        device_id TEXT REFERENCES devices(id) ON DELETE SET NULL,
        is_management INTEGER NOT NULL DEFAULT 0
    );
";

/// Connection settings.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// How long a writer waits for another handle's transaction to finish.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

/// Persistent inventory backed by SQLite.
///
/// One handle serializes its own callers; separate handles on the same file
/// (one per worker) coordinate through SQLite's locking.
#[derive(Clone)]
pub struct InventoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl InventoryStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>, options: &StoreOptions) -> StorageResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.busy_timeout(options.busy_timeout)?;
        Self::init(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        debug!("inventory schema ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` as one unit of work.
    ///
    /// The transaction takes the write lock up front, commits when `f`
    /// returns `Ok` and rolls back when it returns `Err`, so a failed pass
    /// leaves no partial state.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;
        let result = f(&StoreTx::new(&tx));
        match result {
            Ok(value) => {
                tx.commit().map_err(StorageError::from)?;
                Ok(value)
            }
            Err(err) => {
                tx.rollback().map_err(StorageError::from)?;
                Err(err)
            }
        }
    }

    /// Runs read-only queries in a deferred transaction.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreTx<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(StorageError::from)?;
        let value = f(&StoreTx::new(&tx))?;
        tx.finish().map_err(StorageError::from)?;
        Ok(value)
    }
}
