//! Benchmark module

pub mod channel;
pub mod lifecycle;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod scenario;

#[cfg(test)]
mod testing;

pub use channel::LocalExecutor;
pub use orchestrator::{open_store, run_benchmark, BenchContext};
