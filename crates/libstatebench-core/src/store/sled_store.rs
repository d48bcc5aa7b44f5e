use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use fs2::FileExt;

use super::{StateStore, StoredValue};
use crate::error::{Result, StatebenchError};
use crate::types::{current_timestamp_ms, DataPointMeta};

/// Store backed by sled, one tree for definitions and one for values
pub struct SledStore {
    db: sled::Db,
    objects: sled::Tree,
    states: sled::Tree,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path)?;
        let objects = db.open_tree("objects")?;
        let states = db.open_tree("states")?;
        Ok(Self { db, objects, states })
    }

    /// Open store with exclusive filesystem lock (non-blocking).
    ///
    /// Lock file is created at `<path>.lock`. Returns `StoreBusy` if another
    /// worker already holds it.
    pub fn open_locked(path: &Path) -> Result<LockedSledStore> {
        let lock_path = path.with_extension("lock");
        let lock_file = File::create(&lock_path)?;

        lock_file.try_lock_exclusive().map_err(|e| {
            StatebenchError::StoreBusy(format!("Store locked by another process: {}", e))
        })?;

        let store = Self::open(path)?;
        Ok(LockedSledStore {
            _lock_file: lock_file,
            store,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn value(&self, name: &str) -> Result<Option<StoredValue>> {
        match self.states.get(name.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StateStore for SledStore {
    async fn create_data_point(&self, name: &str, meta: &DataPointMeta) -> Result<()> {
        let json = serde_json::to_vec(meta)?;
        self.objects.insert(name.as_bytes(), json)?;
        Ok(())
    }

    async fn delete_data_point(&self, name: &str) -> Result<()> {
        self.objects.remove(name.as_bytes())?;
        Ok(())
    }

    async fn write_value(&self, name: &str, value: f64, ack: bool) -> Result<()> {
        let stored = StoredValue {
            value,
            ack,
            ts_unix_ms: current_timestamp_ms(),
        };
        self.states.insert(name.as_bytes(), serde_json::to_vec(&stored)?)?;
        Ok(())
    }

    async fn delete_value(&self, name: &str) -> Result<()> {
        self.states.remove(name.as_bytes())?;
        Ok(())
    }

    async fn data_point_count(&self) -> Result<usize> {
        Ok(self.objects.len())
    }

    async fn value_count(&self) -> Result<usize> {
        Ok(self.states.len())
    }
}

/// A SledStore with filesystem-level exclusive lock.
///
/// The lock is released when this struct is dropped.
pub struct LockedSledStore {
    _lock_file: File,
    store: SledStore,
}

impl std::ops::Deref for LockedSledStore {
    type Target = SledStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

#[async_trait]
impl StateStore for LockedSledStore {
    async fn create_data_point(&self, name: &str, meta: &DataPointMeta) -> Result<()> {
        self.store.create_data_point(name, meta).await
    }

    async fn delete_data_point(&self, name: &str) -> Result<()> {
        self.store.delete_data_point(name).await
    }

    async fn write_value(&self, name: &str, value: f64, ack: bool) -> Result<()> {
        self.store.write_value(name, value, ack).await
    }

    async fn delete_value(&self, name: &str) -> Result<()> {
        self.store.delete_value(name).await
    }

    async fn data_point_count(&self) -> Result<usize> {
        self.store.data_point_count().await
    }

    async fn value_count(&self) -> Result<usize> {
        self.store.value_count().await
    }
}
