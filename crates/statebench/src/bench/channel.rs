//! Remote control channel
//!
//! A command addressed to this process runs in-process against the local
//! store and sampler. Anything else goes through the messenger and resolves
//! when the target acknowledges it. The two paths never cross: a local
//! command never reaches the messenger, a remote one never touches the local
//! store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use libstatebench_core::store::StateStore;
use libstatebench_core::types::{InstanceIdentity, InstanceIndex, ResourceSample};
use libstatebench_core::{ops, ResourceSampler, SamplerHandle};
use libstatebench_ipc::{ControlCommand, Messenger};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{BenchError, Result};

/// Result of an acknowledged command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Done,
    /// Samples handed back by stop-measuring
    Samples(Vec<ResourceSample>),
}

impl CommandOutcome {
    pub fn into_samples(self) -> Vec<ResourceSample> {
        match self {
            CommandOutcome::Done => Vec::new(),
            CommandOutcome::Samples(samples) => samples,
        }
    }
}

/// Runs a control command somewhere and waits for it to finish
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<CommandOutcome>;
}

/// Executes commands against this process's store and sampler
pub struct LocalExecutor {
    store: Arc<dyn StateStore>,
    sample_interval: Duration,
    sampler: Mutex<Option<SamplerHandle>>,
}

impl LocalExecutor {
    pub fn new(store: Arc<dyn StateStore>, sample_interval: Duration) -> Self {
        Self {
            store,
            sample_interval,
            sampler: Mutex::new(None),
        }
    }

    /// Stop a sampler left running, dropping its samples
    pub async fn shutdown(&self) {
        if let Some(handle) = self.sampler.lock().await.take() {
            if let Err(e) = handle.stop().await {
                warn!("Failed to stop sampler: {}", e);
            }
        }
    }
}

#[async_trait]
impl CommandExecutor for LocalExecutor {
    async fn execute(
        &self,
        _target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<CommandOutcome> {
        let store = self.store.as_ref();
        match command {
            ControlCommand::SetObjects { count } => ops::create_data_points(store, count).await?,
            ControlCommand::DeleteObjects { count } => {
                ops::delete_data_points(store, count).await?
            }
            ControlCommand::SetStates { count } => ops::write_states(store, count).await?,
            ControlCommand::DeleteStates { count } => ops::delete_states(store, count).await?,
            ControlCommand::StartMeasuring => {
                let mut slot = self.sampler.lock().await;
                if let Some(previous) = slot.take() {
                    warn!("Measuring restarted; discarding the running window");
                    previous.stop().await?;
                }
                *slot = Some(ResourceSampler::start(self.sample_interval));
            }
            ControlCommand::StopMeasuring => {
                let handle = self
                    .sampler
                    .lock()
                    .await
                    .take()
                    .ok_or(BenchError::NotMeasuring)?;
                return Ok(CommandOutcome::Samples(handle.stop().await?));
            }
        }
        Ok(CommandOutcome::Done)
    }
}

/// Dispatches commands through the messenger; the messenger bounds the wait
pub struct RemoteExecutor {
    messenger: Arc<dyn Messenger>,
}

impl RemoteExecutor {
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }
}

#[async_trait]
impl CommandExecutor for RemoteExecutor {
    async fn execute(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<CommandOutcome> {
        let ack = self.messenger.send_to_instance(target, command).await?;

        match command {
            ControlCommand::StopMeasuring => Ok(CommandOutcome::Samples(ack.samples()?)),
            _ => Ok(CommandOutcome::Done),
        }
    }
}

/// Routes each command to the local or remote executor
pub struct ControlChannel {
    identity: InstanceIdentity,
    local: Arc<LocalExecutor>,
    remote: RemoteExecutor,
}

impl ControlChannel {
    pub fn new(
        identity: InstanceIdentity,
        local: Arc<LocalExecutor>,
        remote: RemoteExecutor,
    ) -> Self {
        Self {
            identity,
            local,
            remote,
        }
    }

    pub fn local(&self) -> &Arc<LocalExecutor> {
        &self.local
    }

    fn executor_for(&self, target: InstanceIndex) -> &dyn CommandExecutor {
        if self.identity.is(target) {
            self.local.as_ref()
        } else {
            &self.remote
        }
    }

    /// Send `command` to `target` and wait for its acknowledgement
    pub async fn send(
        &self,
        target: InstanceIndex,
        command: ControlCommand,
    ) -> Result<CommandOutcome> {
        debug!(
            target_instance = target,
            local = self.identity.is(target),
            command = command.as_str(),
            "sending control command"
        );
        self.executor_for(target).execute(target, command).await
    }

    /// Send commands one at a time, stopping at the first failure
    pub async fn send_all(
        &self,
        target: InstanceIndex,
        commands: &[ControlCommand],
    ) -> Result<()> {
        for command in commands {
            self.send(target, *command).await?;
        }
        Ok(())
    }
}
