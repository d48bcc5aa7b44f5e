pub mod datapoint;
pub mod instance;
pub mod sample;

pub use datapoint::{data_point_name, DataPointMeta, DATA_POINT_PREFIX};
pub use instance::{InstanceIdentity, InstanceIndex, InstanceSettings, Readiness, WorkerInstance};
pub use sample::{current_timestamp_ms, MetricSample, ResourceSample};
