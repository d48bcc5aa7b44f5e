//! Load driver
//!
//! A `ScenarioRun` walks one scenario through prepare, execute and clean-up.
//! The state names the last phase entered; calls out of order are refused
//! without side effects. Once a phase fails the run stays failed: only an
//! explicit `clean_up()` may still be issued.
//!
//! The execute phase brackets its commands with start/stop measuring at the
//! target, so the returned samples cover exactly the timed window.

use std::fmt;
use std::time::{Duration, Instant};

use libstatebench_core::types::ResourceSample;
use libstatebench_ipc::ControlCommand;
use tracing::{debug, error, warn};

use super::channel::ControlChannel;
use super::scenario::{Phase, Scenario};
use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Preparing,
    Executing,
    CleaningUp,
    Failed(Phase),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Preparing => write!(f, "preparing"),
            RunState::Executing => write!(f, "executing"),
            RunState::CleaningUp => write!(f, "cleaning up"),
            RunState::Failed(phase) => write!(f, "failed in {}", phase.as_str()),
        }
    }
}

/// Outcome of a successful execute phase
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Wall-clock time of the timed commands
    pub elapsed: Duration,
    /// Resource samples taken at the target while they ran
    pub samples: Vec<ResourceSample>,
}

/// One pass of a scenario against its target
pub struct ScenarioRun<'a> {
    scenario: &'a Scenario,
    channel: &'a ControlChannel,
    state: RunState,
}

impl<'a> ScenarioRun<'a> {
    pub fn new(scenario: &'a Scenario, channel: &'a ControlChannel) -> Self {
        Self {
            scenario,
            channel,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Untimed setup
    pub async fn prepare(&mut self) -> Result<()> {
        self.enter(Phase::Prepare, RunState::Idle, RunState::Preparing)?;
        self.run_phase(Phase::Prepare).await
    }

    /// Timed commands under measurement
    pub async fn execute(&mut self) -> Result<Execution> {
        self.enter(Phase::Execute, RunState::Preparing, RunState::Executing)?;
        match self.measured().await {
            Ok(execution) => {
                debug!(
                    scenario = %self.scenario.id,
                    elapsed_ms = execution.elapsed.as_secs_f64() * 1000.0,
                    samples = execution.samples.len(),
                    "execute finished"
                );
                Ok(execution)
            }
            Err(e) => {
                self.state = RunState::Failed(Phase::Execute);
                Err(self.phase_error(Phase::Execute, e))
            }
        }
    }

    async fn measured(&self) -> Result<Execution> {
        let target = self.scenario.target;
        let commands = self.scenario.commands(Phase::Execute);

        self.channel
            .send(target, ControlCommand::StartMeasuring)
            .await?;
        let started = Instant::now();
        let executed = self.channel.send_all(target, &commands).await;
        let elapsed = started.elapsed();

        // The sampler is stopped even when a command failed
        let stopped = self.channel.send(target, ControlCommand::StopMeasuring).await;
        if let Err(ref e) = stopped {
            warn!(scenario = %self.scenario.id, "stop measuring failed: {}", e);
        }
        executed?;

        Ok(Execution {
            elapsed,
            samples: stopped?.into_samples(),
        })
    }

    /// Untimed teardown. Also allowed after a failure, leaving the run failed.
    pub async fn clean_up(&mut self) -> Result<()> {
        if let RunState::Failed(failed) = self.state {
            let commands = self.scenario.commands(Phase::CleanUp);
            return self
                .channel
                .send_all(self.scenario.target, &commands)
                .await
                .map_err(|e| {
                    error!(
                        scenario = %self.scenario.id,
                        failed_phase = failed.as_str(),
                        "clean-up after failure did not complete: {}",
                        e
                    );
                    self.phase_error(Phase::CleanUp, e)
                });
        }

        self.enter(Phase::CleanUp, RunState::Executing, RunState::CleaningUp)?;
        self.run_phase(Phase::CleanUp).await?;
        self.state = RunState::Idle;
        Ok(())
    }

    fn enter(&mut self, phase: Phase, expected: RunState, next: RunState) -> Result<()> {
        if self.state != expected {
            return Err(BenchError::InvalidTransition {
                scenario: self.scenario.id.clone(),
                phase: phase.as_str(),
                state: self.state.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    async fn run_phase(&mut self, phase: Phase) -> Result<()> {
        let commands = self.scenario.commands(phase);
        if let Err(e) = self.channel.send_all(self.scenario.target, &commands).await {
            self.state = RunState::Failed(phase);
            return Err(self.phase_error(phase, e));
        }
        Ok(())
    }

    fn phase_error(&self, phase: Phase, source: BenchError) -> BenchError {
        BenchError::ScenarioFailed {
            scenario: self.scenario.id.clone(),
            phase: phase.as_str(),
            source: Box::new(source),
        }
    }
}
