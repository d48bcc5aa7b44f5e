use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StatebenchError;
use crate::sampler::DEFAULT_SAMPLE_INTERVAL_MS;
use crate::types::InstanceIndex;

/// Host used when no target host is configured
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Benchmark configuration, usually read from `statebench.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Data points touched per phase
    pub iterations: u64,
    /// Repetitions of every scenario; each adds one time sample
    pub epochs: u32,
    /// Secondary worker instances to provision
    pub instances: u32,
    /// Host the workers are bound to and dialled on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Scenario ids to run, in order
    pub scenarios: Vec<String>,
    /// Instance the scenarios are driven against (0 = this process)
    pub target: InstanceIndex,
    /// Stop the whole run on the first failed scenario
    pub abort_on_failure: bool,
    /// Explicitly run the cleanup phase after a failed phase
    pub cleanup_on_failure: bool,
    /// Write a JSON report here when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<PathBuf>,
    pub workers: WorkerConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            epochs: 5,
            instances: 0,
            host: None,
            scenarios: vec!["setStates".to_string()],
            target: 0,
            abort_on_failure: false,
            cleanup_on_failure: true,
            report: None,
            workers: WorkerConfig::default(),
        }
    }
}

/// Worker provisioning and transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker `i` listens on `base_port + i`
    pub base_port: u16,
    /// Pause after enabling each instance
    pub grace_ms: u64,
    pub sample_interval_ms: u64,
    /// Upper bound for one acknowledged remote command
    pub control_timeout_ms: u64,
    pub store: StoreKind,
    /// Root for per-instance sled stores
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            base_port: 47_100,
            grace_ms: 500,
            sample_interval_ms: DEFAULT_SAMPLE_INTERVAL_MS,
            control_timeout_ms: 30_000,
            store: StoreKind::Memory,
            data_dir: None,
        }
    }
}

/// Backing store for data points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Sled,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Memory => "memory",
            StoreKind::Sled => "sled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "memory" => Some(StoreKind::Memory),
            "sled" => Some(StoreKind::Sled),
            _ => None,
        }
    }
}

impl BenchConfig {
    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> Result<(), StatebenchError> {
        if self.iterations == 0 {
            return Err(StatebenchError::Config(
                "iterations must be a positive integer".to_string(),
            ));
        }
        if self.epochs == 0 {
            return Err(StatebenchError::Config(
                "epochs must be a positive integer".to_string(),
            ));
        }
        if self.scenarios.is_empty() {
            return Err(StatebenchError::Config(
                "at least one scenario must be selected".to_string(),
            ));
        }
        if self.target > self.instances {
            return Err(StatebenchError::Config(format!(
                "target instance {} is not provisioned (instances = {})",
                self.target, self.instances
            )));
        }
        if u32::from(self.workers.base_port) + self.instances > u32::from(u16::MAX) {
            return Err(StatebenchError::Config(format!(
                "base_port {} leaves no room for {} instances",
                self.workers.base_port, self.instances
            )));
        }
        if self.workers.store == StoreKind::Sled && self.workers.data_dir.is_none() {
            return Err(StatebenchError::Config(
                "the sled store needs workers.data_dir".to_string(),
            ));
        }
        Ok(())
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Sled path for instance `index`
    pub fn store_path(&self, index: InstanceIndex) -> Option<PathBuf> {
        self.workers
            .data_dir
            .as_ref()
            .map(|dir| dir.join(format!("instance-{}", index)).join("sled"))
    }
}

/// Worker `index` listens on `host:(base_port + index)`
pub fn worker_address(host: &str, base_port: u16, index: InstanceIndex) -> String {
    format!("{}:{}", host, u32::from(base_port) + index)
}

/// Load config from a TOML file
pub fn load_config(path: &Path) -> Result<BenchConfig, StatebenchError> {
    if !path.exists() {
        return Err(StatebenchError::NotFound(format!(
            "Config file not found: {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let config: BenchConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save config as TOML
pub fn save_config(path: &Path, config: &BenchConfig) -> Result<(), StatebenchError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
