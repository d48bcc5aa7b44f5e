//! Bulk data-point operations
//!
//! Each loop runs index 0..n strictly in order, one awaited store call per
//! index. The first failure aborts the loop and reports the index it stopped
//! at; later indices are never attempted.

use tracing::debug;

use crate::error::{Result, StatebenchError};
use crate::store::StateStore;
use crate::types::{data_point_name, DataPointMeta};

/// Create `test.0 .. test.{n-1}` as numeric read/write data points
pub async fn create_data_points(store: &dyn StateStore, n: u64) -> Result<()> {
    debug!(n, "creating data points");
    for i in 0..n {
        store
            .create_data_point(&data_point_name(i), &DataPointMeta::numeric(i))
            .await
            .map_err(|e| StatebenchError::data_operation("create_data_point", i, e))?;
    }
    Ok(())
}

/// Write value `i` (acknowledged) to every `test.i`
pub async fn write_states(store: &dyn StateStore, n: u64) -> Result<()> {
    debug!(n, "writing states");
    for i in 0..n {
        store
            .write_value(&data_point_name(i), i as f64, true)
            .await
            .map_err(|e| StatebenchError::data_operation("write_value", i, e))?;
    }
    Ok(())
}

pub async fn delete_states(store: &dyn StateStore, n: u64) -> Result<()> {
    debug!(n, "deleting states");
    for i in 0..n {
        store
            .delete_value(&data_point_name(i))
            .await
            .map_err(|e| StatebenchError::data_operation("delete_value", i, e))?;
    }
    Ok(())
}

pub async fn delete_data_points(store: &dyn StateStore, n: u64) -> Result<()> {
    debug!(n, "deleting data points");
    for i in 0..n {
        store
            .delete_data_point(&data_point_name(i))
            .await
            .map_err(|e| StatebenchError::data_operation("delete_data_point", i, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_full_cycle_leaves_store_empty() {
        let store = MemoryStore::new();
        for n in [0u64, 1, 17] {
            create_data_points(&store, n).await.unwrap();
            write_states(&store, n).await.unwrap();
            assert_eq!(store.data_point_count().await.unwrap(), n as usize);
            assert_eq!(store.value_count().await.unwrap(), n as usize);

            delete_states(&store, n).await.unwrap();
            delete_data_points(&store, n).await.unwrap();
            assert_eq!(store.data_point_count().await.unwrap(), 0);
            assert_eq!(store.value_count().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_values_equal_index() {
        let store = MemoryStore::new();
        create_data_points(&store, 5).await.unwrap();
        write_states(&store, 5).await.unwrap();
        for i in 0..5u64 {
            let value = store.value(&data_point_name(i)).unwrap();
            assert_eq!(value.value, i as f64);
            assert!(value.ack);
        }
        assert_eq!(store.data_point("test.4").unwrap().name, "4");
    }
}
