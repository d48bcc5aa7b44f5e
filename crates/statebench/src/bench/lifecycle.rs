//! Instance lifecycle management
//!
//! Workers are stood up one index at a time: created disabled, switched to
//! enabled secondary mode, then given a grace period to start listening
//! before the next index is touched. An instance is only marked ready once
//! its control reports it still running after the grace period. Failures are
//! reported with the index and step they happened at; nothing already
//! provisioned is rolled back.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libstatebench_core::types::{InstanceIndex, InstanceSettings, WorkerInstance};
use libstatebench_core::{worker_address, BenchConfig, StoreKind};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{BenchError, Result};

/// Process control for worker instances
#[async_trait]
pub trait InstanceControl: Send + Sync {
    async fn create_instance(
        &self,
        index: InstanceIndex,
        enabled: bool,
        host: Option<&str>,
    ) -> Result<()>;

    async fn update_instance_config(
        &self,
        index: InstanceIndex,
        settings: InstanceSettings,
    ) -> Result<()>;

    /// Fails unless the instance is up and able to take commands
    async fn check_instance(&self, index: InstanceIndex) -> Result<()>;

    async fn delete_instance(&self, index: InstanceIndex) -> Result<()>;
}

/// Owns the worker instances of one benchmark run
pub struct InstanceManager {
    control: Arc<dyn InstanceControl>,
    grace: Duration,
    instances: BTreeMap<InstanceIndex, WorkerInstance>,
}

impl InstanceManager {
    pub fn new(control: Arc<dyn InstanceControl>, grace: Duration) -> Self {
        Self {
            control,
            grace,
            instances: BTreeMap::new(),
        }
    }

    /// Provision instances `1..=count` in order
    pub async fn provision(&mut self, count: u32, host: Option<&str>) -> Result<()> {
        for index in 1..=count {
            self.control
                .create_instance(index, false, host)
                .await
                .map_err(|e| provision_error(index, "create", e))?;
            self.instances
                .insert(index, WorkerInstance::created(index, host.map(str::to_string)));

            let settings = InstanceSettings::secondary();
            self.control
                .update_instance_config(index, settings)
                .await
                .map_err(|e| provision_error(index, "enable", e))?;
            if let Some(instance) = self.instances.get_mut(&index) {
                instance.apply(settings);
            }

            // Give the instance time to come up before the next one
            tokio::time::sleep(self.grace).await;
            self.control
                .check_instance(index)
                .await
                .map_err(|e| provision_error(index, "ready", e))?;
            if let Some(instance) = self.instances.get_mut(&index) {
                instance.mark_ready();
            }
            info!(instance = index, "instance ready");
        }
        Ok(())
    }

    /// Delete instances `1..=count` in order; the first failure stops the loop
    pub async fn decommission(&mut self, count: u32) -> Result<()> {
        for index in 1..=count {
            self.control
                .delete_instance(index)
                .await
                .map_err(|e| BenchError::Decommission {
                    index,
                    message: e.to_string(),
                })?;
            self.instances.remove(&index);
            debug!(instance = index, "instance deleted");
        }
        Ok(())
    }

    pub fn instances(&self) -> impl Iterator<Item = &WorkerInstance> {
        self.instances.values()
    }
}

fn provision_error(index: InstanceIndex, step: &'static str, source: BenchError) -> BenchError {
    BenchError::Provision {
        index,
        step,
        message: source.to_string(),
    }
}

struct ProcessEntry {
    host: Option<String>,
    child: Option<Child>,
}

/// Runs each instance as a `statebench worker` child process
pub struct ProcessInstanceControl {
    program: PathBuf,
    config: BenchConfig,
    entries: Mutex<HashMap<InstanceIndex, ProcessEntry>>,
}

impl ProcessInstanceControl {
    pub fn new(program: PathBuf, config: BenchConfig) -> Self {
        Self {
            program,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Use the running executable as the worker program
    pub fn current_exe(config: BenchConfig) -> Result<Self> {
        Ok(Self::new(std::env::current_exe()?, config))
    }

    fn listen_address(&self, index: InstanceIndex, host: Option<&str>) -> String {
        let host = host.unwrap_or_else(|| self.config.host());
        worker_address(host, self.config.workers.base_port, index)
    }

    fn spawn(&self, index: InstanceIndex, host: Option<&str>) -> Result<Child> {
        let workers = &self.config.workers;
        let mut command = Command::new(&self.program);
        command
            .arg("worker")
            .arg("--index")
            .arg(index.to_string())
            .arg("--listen")
            .arg(self.listen_address(index, host))
            .arg("--store")
            .arg(workers.store.as_str())
            .arg("--sample-interval-ms")
            .arg(workers.sample_interval_ms.to_string())
            .kill_on_drop(true);
        if workers.store == StoreKind::Sled {
            if let Some(path) = self.config.store_path(index) {
                command.arg("--store-path").arg(path);
            }
        }

        let child = command.spawn()?;
        info!(instance = index, pid = child.id(), "worker process spawned");
        Ok(child)
    }
}

#[async_trait]
impl InstanceControl for ProcessInstanceControl {
    async fn create_instance(
        &self,
        index: InstanceIndex,
        enabled: bool,
        host: Option<&str>,
    ) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains_key(&index) {
            return Err(BenchError::Instance {
                index,
                message: "instance already exists".to_string(),
            });
        }
        let mut entry = ProcessEntry {
            host: host.map(str::to_string),
            child: None,
        };
        if enabled {
            entry.child = Some(self.spawn(index, host)?);
        }
        entries.insert(index, entry);
        Ok(())
    }

    async fn update_instance_config(
        &self,
        index: InstanceIndex,
        settings: InstanceSettings,
    ) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&index).ok_or_else(|| BenchError::Instance {
            index,
            message: "instance does not exist".to_string(),
        })?;

        if !settings.enabled {
            if let Some(mut child) = entry.child.take() {
                child.kill().await?;
            }
            return Ok(());
        }
        if !settings.secondary_mode {
            return Err(BenchError::Instance {
                index,
                message: "workers only run in secondary mode".to_string(),
            });
        }
        if entry.child.is_none() {
            entry.child = Some(self.spawn(index, entry.host.as_deref())?);
        }
        Ok(())
    }

    async fn check_instance(&self, index: InstanceIndex) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries.get_mut(&index).ok_or_else(|| BenchError::Instance {
            index,
            message: "instance does not exist".to_string(),
        })?;
        let child = entry.child.as_mut().ok_or_else(|| BenchError::Instance {
            index,
            message: "worker process is not running".to_string(),
        })?;

        match child.try_wait()? {
            None => Ok(()),
            Some(status) => {
                entry.child = None;
                Err(BenchError::Instance {
                    index,
                    message: format!("worker exited: {}", status),
                })
            }
        }
    }

    async fn delete_instance(&self, index: InstanceIndex) -> Result<()> {
        let entry = self
            .entries
            .lock()
            .await
            .remove(&index)
            .ok_or_else(|| BenchError::Instance {
                index,
                message: "instance does not exist".to_string(),
            })?;

        if let Some(mut child) = entry.child {
            if let Err(e) = child.kill().await {
                warn!(instance = index, "Failed to kill worker: {}", e);
                return Err(e.into());
            }
        }
        Ok(())
    }
}
