//! Object/state store capability
//!
//! The benchmark only needs four operations from the store it measures.
//! `MemoryStore` backs tests and the default worker, `SledStore` persists to
//! disk for runs that should include real storage cost.

mod memory;
mod sled_store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::DataPointMeta;

pub use memory::MemoryStore;
pub use sled_store::{LockedSledStore, SledStore};

/// Value written to a data point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: f64,
    pub ack: bool,
    pub ts_unix_ms: u64,
}

/// Store operations consumed by the benchmark
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Create (or overwrite) the data point definition
    async fn create_data_point(&self, name: &str, meta: &DataPointMeta) -> Result<()>;

    /// Remove the data point definition. Missing names are not an error.
    async fn delete_data_point(&self, name: &str) -> Result<()>;

    async fn write_value(&self, name: &str, value: f64, ack: bool) -> Result<()>;

    /// Remove the stored value. Missing names are not an error.
    async fn delete_value(&self, name: &str) -> Result<()>;

    async fn data_point_count(&self) -> Result<usize>;

    async fn value_count(&self) -> Result<usize>;
}
