use serde::{Deserialize, Serialize};

/// Namespace prefix for synthetic benchmark data points
pub const DATA_POINT_PREFIX: &str = "test";

/// Name of the data point at `index` (e.g. `test.42`)
pub fn data_point_name(index: u64) -> String {
    format!("{}.{}", DATA_POINT_PREFIX, index)
}

/// Metadata attached to a synthetic data point when it is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPointMeta {
    pub name: String,
    pub role: String,
    pub value_type: String,
    pub read: bool,
    pub write: bool,
}

impl DataPointMeta {
    /// Numeric, readable and writable state, named after its index
    pub fn numeric(index: u64) -> Self {
        Self {
            name: index.to_string(),
            role: "state".to_string(),
            value_type: "number".to_string(),
            read: true,
            write: true,
        }
    }
}
