use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use libstatebench_core::types::InstanceIndex;
use libstatebench_core::{load_config, BenchConfig, StoreKind};

use crate::error::{BenchError, Result};

#[derive(Parser)]
#[command(
    name = "statebench",
    about = "State store benchmark across local and remote worker instances",
    version
)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the benchmark as coordinator (instance 0)
    Run(RunArgs),

    /// Serve control commands as a worker instance
    Worker(WorkerArgs),

    /// Write the default configuration to a file
    InitConfig {
        /// Destination path
        #[arg(default_value = "statebench.toml")]
        path: PathBuf,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Data points per scenario
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Passes per scenario
    #[arg(short, long)]
    pub epochs: Option<u32>,

    /// Worker instances to provision
    #[arg(short, long)]
    pub instances: Option<u32>,

    /// Host worker instances run on
    #[arg(long)]
    pub host: Option<String>,

    /// Scenario to run, repeatable (setObjects, delObjects, setStates, delStates)
    #[arg(short, long = "scenario")]
    pub scenarios: Vec<String>,

    /// Instance the scenarios run against
    #[arg(short, long)]
    pub target: Option<InstanceIndex>,

    /// Stop at the first failed scenario
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Leave the namespace as it is after a failed phase
    #[arg(long)]
    pub no_cleanup_on_failure: bool,

    /// Write a JSON report to this file
    #[arg(short = 'j', long)]
    pub report: Option<PathBuf>,

    /// First worker port; instance i listens on base + i
    #[arg(long)]
    pub base_port: Option<u16>,

    /// Backing store: memory or sled
    #[arg(long)]
    pub store: Option<String>,

    /// Directory for per-instance sled stores
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Instance index of this worker
    #[arg(long)]
    pub index: InstanceIndex,

    /// Address to listen on
    #[arg(long)]
    pub listen: String,

    /// Backing store: memory or sled
    #[arg(long, default_value = "memory")]
    pub store: String,

    /// Sled store path
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// Resource sampling interval
    #[arg(long, default_value = "100")]
    pub sample_interval_ms: u64,
}

fn parse_store(name: &str) -> Result<StoreKind> {
    StoreKind::from_name(name).ok_or_else(|| {
        BenchError::Config(format!("Unknown store: '{}'. Use: memory or sled", name))
    })
}

impl RunArgs {
    /// Configuration file (or defaults) with command line overrides applied
    pub fn resolve_config(&self) -> Result<BenchConfig> {
        let config = match &self.config {
            Some(path) => load_config(path)?,
            None => BenchConfig::default(),
        };
        self.apply(config)
    }

    fn apply(&self, mut config: BenchConfig) -> Result<BenchConfig> {
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(instances) = self.instances {
            config.instances = instances;
        }
        if self.host.is_some() {
            config.host = self.host.clone();
        }
        if !self.scenarios.is_empty() {
            config.scenarios = self.scenarios.clone();
        }
        if let Some(target) = self.target {
            config.target = target;
        }
        if self.abort_on_failure {
            config.abort_on_failure = true;
        }
        if self.no_cleanup_on_failure {
            config.cleanup_on_failure = false;
        }
        if self.report.is_some() {
            config.report = self.report.clone();
        }
        if let Some(port) = self.base_port {
            config.workers.base_port = port;
        }
        if let Some(ref store) = self.store {
            config.workers.store = parse_store(store)?;
        }
        if self.data_dir.is_some() {
            config.workers.data_dir = self.data_dir.clone();
        }
        Ok(config)
    }
}

impl WorkerArgs {
    pub fn store_kind(&self) -> Result<StoreKind> {
        parse_store(&self.store)
    }
}
