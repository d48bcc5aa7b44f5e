//! Core library for statebench
//!
//! - Data model (worker instances, data points, samples)
//! - Metric registry and statistics aggregation
//! - State store capability with memory and sled backends
//! - Bulk data-point operations and the resource sampler

pub mod config;
pub mod error;
pub mod metrics;
pub mod ops;
pub mod sampler;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{
    load_config, save_config, worker_address, BenchConfig, StoreKind, WorkerConfig,
};
pub use error::{Result, StatebenchError};
pub use metrics::{MetricKind, MetricRegistry, OutputSlot, Statistic, Unit};
pub use sampler::{ResourceSampler, SamplerHandle};
pub use stats::{MetricSummary, PublishedOutputs, PublishedValue, StatsAggregator};
pub use store::{MemoryStore, SledStore, StateStore};
pub use types::{InstanceIdentity, InstanceIndex, InstanceSettings, ResourceSample, WorkerInstance};
