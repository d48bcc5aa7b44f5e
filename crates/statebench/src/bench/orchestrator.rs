//! Benchmark orchestration
//!
//! Stands up the configured workers, drives every scenario for the configured
//! number of epochs, feeds timings and resource samples to the aggregator and
//! publishes the summaries. Workers are decommissioned whenever provisioning
//! succeeded, whatever happened to the scenarios.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use libstatebench_core::store::StateStore;
use libstatebench_core::types::InstanceIdentity;
use libstatebench_core::{
    BenchConfig, MemoryStore, MetricKind, PublishedOutputs, SledStore, StatsAggregator,
    StoreKind,
};
use libstatebench_ipc::ControlClient;
use tracing::{error, info, warn};

use super::channel::{ControlChannel, LocalExecutor, RemoteExecutor};
use super::lifecycle::{InstanceControl, InstanceManager, ProcessInstanceControl};
use super::report::{BenchReport, ScenarioReport};
use super::runner::{Execution, RunState, ScenarioRun};
use super::scenario::Scenario;
use crate::error::{BenchError, Result};

/// Configuration plus the collaborators a run works through
pub struct BenchContext {
    pub config: BenchConfig,
    pub channel: ControlChannel,
    pub instances: Arc<dyn InstanceControl>,
}

impl BenchContext {
    pub fn new(
        config: BenchConfig,
        channel: ControlChannel,
        instances: Arc<dyn InstanceControl>,
    ) -> Self {
        Self {
            config,
            channel,
            instances,
        }
    }

    /// Coordinator context: instance 0 with its own store, nng control client
    /// and worker child processes
    pub fn coordinator(config: BenchConfig) -> Result<Self> {
        let store = open_store(config.workers.store, config.store_path(0).as_deref())?;
        let local = Arc::new(LocalExecutor::new(
            store,
            Duration::from_millis(config.workers.sample_interval_ms),
        ));
        let client = ControlClient::new(config.host(), config.workers.base_port)
            .with_timeout(Duration::from_millis(config.workers.control_timeout_ms));
        let remote = RemoteExecutor::new(Arc::new(client));
        let channel = ControlChannel::new(InstanceIdentity::new(0), local, remote);
        let instances = Arc::new(ProcessInstanceControl::current_exe(config.clone())?);

        Ok(Self::new(config, channel, instances))
    }
}

/// Open an instance's store; sled needs a path
pub fn open_store(kind: StoreKind, path: Option<&Path>) -> Result<Arc<dyn StateStore>> {
    match kind {
        StoreKind::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreKind::Sled => {
            let path = path.ok_or_else(|| {
                BenchError::Config("the sled store needs a data directory".to_string())
            })?;
            Ok(Arc::new(SledStore::open_locked(path)?))
        }
    }
}

/// Run the whole benchmark described by `ctx.config`
pub async fn run_benchmark(ctx: &BenchContext) -> Result<BenchReport> {
    let config = &ctx.config;
    config.validate()?;
    let scenarios = Scenario::from_config(config)?;
    let started_at = Utc::now();

    let mut manager = InstanceManager::new(
        ctx.instances.clone(),
        Duration::from_millis(config.workers.grace_ms),
    );
    manager.provision(config.instances, config.host.as_deref()).await?;
    info!(instances = manager.instances().count(), "workers provisioned");

    let outcome = run_scenarios(ctx, &scenarios).await;

    let decommissioned = manager.decommission(config.instances).await;
    ctx.channel.local().shutdown().await;

    let (reports, outputs) = match (outcome, decommissioned) {
        (Ok(results), Ok(())) => results,
        (Err(e), Ok(())) => return Err(e),
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), Err(teardown)) => {
            error!("Decommissioning after an aborted run failed: {}", teardown);
            return Err(e);
        }
    };

    Ok(BenchReport {
        started_at,
        finished_at: Utc::now(),
        iterations: config.iterations,
        epochs: config.epochs,
        instances: config.instances,
        scenarios: reports,
        outputs,
    })
}

async fn run_scenarios(
    ctx: &BenchContext,
    scenarios: &[Scenario],
) -> Result<(Vec<ScenarioReport>, PublishedOutputs)> {
    let mut aggregator = StatsAggregator::new();
    let mut outputs = PublishedOutputs::new();
    let mut reports = Vec::with_capacity(scenarios.len());

    for scenario in scenarios {
        aggregator.reset();
        info!(
            scenario = %scenario.id,
            target = scenario.target,
            iterations = scenario.iterations,
            epochs = ctx.config.epochs,
            "running scenario"
        );

        let mut completed = 0;
        let mut failure = None;
        for epoch in 0..ctx.config.epochs {
            match run_epoch(ctx, scenario, &mut aggregator).await {
                Ok(()) => completed += 1,
                Err(e) => {
                    log_failure(&e, epoch);
                    failure = Some(e);
                    break;
                }
            }
        }

        let published = aggregator.publish(&scenario.id, &mut outputs);
        match failure {
            None => {
                info!(scenario = %scenario.id, published, "scenario finished");
                let summaries = aggregator.summaries();
                reports.push(ScenarioReport::passed(scenario, completed, summaries));
            }
            Some(e) if ctx.config.abort_on_failure => return Err(e),
            Some(e) => {
                reports.push(ScenarioReport::failed(
                    scenario,
                    completed,
                    aggregator.summaries(),
                    &e,
                ));
            }
        }
    }

    Ok((reports, outputs))
}

/// One prepare / execute / clean-up pass; samples are only recorded when the
/// whole pass succeeded
async fn run_epoch(
    ctx: &BenchContext,
    scenario: &Scenario,
    aggregator: &mut StatsAggregator,
) -> Result<()> {
    let mut run = ScenarioRun::new(scenario, &ctx.channel);

    match drive(&mut run).await {
        Ok(execution) => {
            aggregator.record(MetricKind::Time, execution.elapsed.as_secs_f64());
            aggregator.record_resources(&execution.samples);
            Ok(())
        }
        Err(e) => {
            if ctx.config.cleanup_on_failure && matches!(run.state(), RunState::Failed(_)) {
                if let Err(cleanup) = run.clean_up().await {
                    warn!(
                        scenario = %scenario.id,
                        "clean-up after failure failed: {}",
                        cleanup
                    );
                }
            }
            Err(e)
        }
    }
}

async fn drive(run: &mut ScenarioRun<'_>) -> Result<Execution> {
    run.prepare().await?;
    let execution = run.execute().await?;
    run.clean_up().await?;
    Ok(execution)
}

fn log_failure(err: &BenchError, epoch: u32) {
    match err {
        BenchError::ScenarioFailed {
            scenario,
            phase,
            source,
        } => {
            error!(
                scenario = %scenario,
                phase = *phase,
                epoch,
                error = %source,
                "scenario failed"
            );
        }
        other => error!(epoch, error = %other, "scenario failed"),
    }
}
