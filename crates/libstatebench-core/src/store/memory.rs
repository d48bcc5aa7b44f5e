use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{StateStore, StoredValue};
use crate::error::{Result, StatebenchError};
use crate::types::{current_timestamp_ms, DataPointMeta};

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, DataPointMeta>>,
    states: RwLock<BTreeMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, name: &str) -> Option<StoredValue> {
        self.states.read().ok()?.get(name).copied()
    }

    pub fn data_point(&self, name: &str) -> Option<DataPointMeta> {
        self.objects.read().ok()?.get(name).cloned()
    }
}

fn poisoned() -> StatebenchError {
    StatebenchError::Internal("memory store lock poisoned".to_string())
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn create_data_point(&self, name: &str, meta: &DataPointMeta) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.insert(name.to_string(), meta.clone());
        Ok(())
    }

    async fn delete_data_point(&self, name: &str) -> Result<()> {
        let mut objects = self.objects.write().map_err(|_| poisoned())?;
        objects.remove(name);
        Ok(())
    }

    async fn write_value(&self, name: &str, value: f64, ack: bool) -> Result<()> {
        let mut states = self.states.write().map_err(|_| poisoned())?;
        states.insert(
            name.to_string(),
            StoredValue {
                value,
                ack,
                ts_unix_ms: current_timestamp_ms(),
            },
        );
        Ok(())
    }

    async fn delete_value(&self, name: &str) -> Result<()> {
        let mut states = self.states.write().map_err(|_| poisoned())?;
        states.remove(name);
        Ok(())
    }

    async fn data_point_count(&self) -> Result<usize> {
        Ok(self.objects.read().map_err(|_| poisoned())?.len())
    }

    async fn value_count(&self) -> Result<usize> {
        Ok(self.states.read().map_err(|_| poisoned())?.len())
    }
}
