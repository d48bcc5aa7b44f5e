//! Resource sampler
//!
//! Periodically reads this process's CPU and resident memory and measures how
//! late the runtime wakes the sampling task (event-loop lag). The sampler is
//! an explicit task: `start` spawns it, `SamplerHandle::stop` joins it and
//! hands back every tick.

use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, StatebenchError};
use crate::types::{current_timestamp_ms, ResourceSample};

/// Default sampling interval
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

/// Running sampler task
pub struct SamplerHandle {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<Vec<ResourceSample>>,
    started: Instant,
}

impl SamplerHandle {
    /// Stop sampling and collect every tick recorded since `start`
    pub async fn stop(self) -> Result<Vec<ResourceSample>> {
        let _ = self.stop_tx.send(());
        let samples = self
            .handle
            .await
            .map_err(|e| StatebenchError::Sampler(format!("sampler task failed: {}", e)))?;
        debug!(
            samples = samples.len(),
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "sampler stopped"
        );
        Ok(samples)
    }
}

/// Reads process resources for the current pid
pub struct ResourceSampler {
    system: System,
    pid: Option<Pid>,
}

impl ResourceSampler {
    pub fn new() -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("Cannot resolve own pid, resource samples will be zero: {}", e);
                None
            }
        };
        let mut sampler = Self {
            system: System::new(),
            pid,
        };
        // First refresh only establishes the CPU baseline
        sampler.refresh();
        sampler
    }

    fn refresh(&mut self) {
        if let Some(pid) = self.pid {
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        }
    }

    /// Take one reading, tagging it with the given lag
    pub fn sample(&mut self, event_loop_lag: Duration) -> ResourceSample {
        self.refresh();
        let (cpu_percent, memory_bytes) = self
            .pid
            .and_then(|pid| self.system.process(pid))
            .map(|p| (p.cpu_usage() as f64, p.memory()))
            .unwrap_or((0.0, 0));

        ResourceSample {
            ts_unix_ms: current_timestamp_ms(),
            cpu_percent,
            memory_bytes,
            event_loop_lag_ms: event_loop_lag.as_secs_f64() * 1000.0,
        }
    }

    /// Spawn the sampling loop on the current runtime
    pub fn start(interval: Duration) -> SamplerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let started = Instant::now();

        let handle = tokio::spawn(async move {
            let mut sampler = ResourceSampler::new();
            let mut samples = Vec::new();

            loop {
                let tick = Instant::now();
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(interval) => {
                        let lag = tick.elapsed().saturating_sub(interval);
                        samples.push(sampler.sample(lag));
                    }
                }
            }

            // Windows shorter than one interval still report CPU and memory
            if samples.is_empty() {
                samples.push(sampler.sample(Duration::ZERO));
            }
            samples
        });

        SamplerHandle {
            stop_tx,
            handle,
            started,
        }
    }
}

impl Default for ResourceSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_returns_samples() {
        let handle = ResourceSampler::start(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(40)).await;
        let samples = handle.stop().await.unwrap();

        assert!(!samples.is_empty());
        for s in &samples {
            assert!(s.event_loop_lag_ms >= 0.0);
            assert!(s.cpu_percent >= 0.0);
        }
    }

    #[tokio::test]
    async fn test_immediate_stop_still_yields_one_sample() {
        let handle = ResourceSampler::start(Duration::from_secs(60));
        let samples = handle.stop().await.unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].event_loop_lag_ms, 0.0);
    }

    #[test]
    fn test_sample_reads_own_process() {
        let mut sampler = ResourceSampler::new();
        let sample = sampler.sample(Duration::from_millis(2));
        assert!(sample.memory_bytes > 0);
        assert!((sample.event_loop_lag_ms - 2.0).abs() < 1e-9);
    }
}
