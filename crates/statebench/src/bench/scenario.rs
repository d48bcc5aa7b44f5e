//! Benchmark scenario definitions

use libstatebench_core::types::InstanceIndex;
use libstatebench_core::BenchConfig;
use libstatebench_ipc::ControlCommand;
use serde::{Deserialize, Serialize};

use crate::error::{BenchError, Result};

/// Phase of a scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Prepare,
    Execute,
    CleanUp,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Prepare => "prepare",
            Phase::Execute => "execute",
            Phase::CleanUp => "clean_up",
        }
    }
}

/// Catalog of benchmark units. Each kind leaves the data-point namespace as
/// it found it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioKind {
    /// Time creating data points
    SetObjects,
    /// Time deleting data points
    DelObjects,
    /// Time writing one value to each data point
    SetStates,
    /// Time deleting the written values
    DelStates,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 4] = [
        ScenarioKind::SetObjects,
        ScenarioKind::DelObjects,
        ScenarioKind::SetStates,
        ScenarioKind::DelStates,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            ScenarioKind::SetObjects => "setObjects",
            ScenarioKind::DelObjects => "delObjects",
            ScenarioKind::SetStates => "setStates",
            ScenarioKind::DelStates => "delStates",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScenarioKind::SetObjects => "Create N data points",
            ScenarioKind::DelObjects => "Delete N existing data points",
            ScenarioKind::SetStates => "Write one value to each of N data points",
            ScenarioKind::DelStates => "Delete the values of N data points",
        }
    }

    /// Parse a scenario id (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id().eq_ignore_ascii_case(name))
    }

    /// Commands issued during `phase` for `n` data points
    pub fn commands(&self, phase: Phase, n: u64) -> Vec<ControlCommand> {
        use ControlCommand::*;

        match (self, phase) {
            (ScenarioKind::SetObjects, Phase::Prepare) => vec![],
            (ScenarioKind::SetObjects, Phase::Execute) => vec![SetObjects { count: n }],
            (ScenarioKind::SetObjects, Phase::CleanUp) => vec![DeleteObjects { count: n }],

            (ScenarioKind::DelObjects, Phase::Prepare) => vec![SetObjects { count: n }],
            (ScenarioKind::DelObjects, Phase::Execute) => vec![DeleteObjects { count: n }],
            (ScenarioKind::DelObjects, Phase::CleanUp) => vec![],

            (ScenarioKind::SetStates, Phase::Prepare) => vec![SetObjects { count: n }],
            (ScenarioKind::SetStates, Phase::Execute) => vec![SetStates { count: n }],
            (ScenarioKind::SetStates, Phase::CleanUp) => {
                vec![DeleteStates { count: n }, DeleteObjects { count: n }]
            }

            (ScenarioKind::DelStates, Phase::Prepare) => {
                vec![SetObjects { count: n }, SetStates { count: n }]
            }
            (ScenarioKind::DelStates, Phase::Execute) => vec![DeleteStates { count: n }],
            (ScenarioKind::DelStates, Phase::CleanUp) => vec![DeleteObjects { count: n }],
        }
    }
}

/// One configured benchmark unit, immutable while it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: String,
    pub kind: ScenarioKind,
    pub iterations: u64,
    pub target: InstanceIndex,
}

impl Scenario {
    pub fn new(kind: ScenarioKind, iterations: u64, target: InstanceIndex) -> Self {
        Self {
            id: kind.id().to_string(),
            kind,
            iterations,
            target,
        }
    }

    pub fn commands(&self, phase: Phase) -> Vec<ControlCommand> {
        self.kind.commands(phase, self.iterations)
    }

    /// Build every scenario selected in `config`, in order
    pub fn from_config(config: &BenchConfig) -> Result<Vec<Scenario>> {
        config
            .scenarios
            .iter()
            .map(|name| {
                let kind = ScenarioKind::from_name(name).ok_or_else(|| {
                    BenchError::Config(format!(
                        "Unknown scenario: '{}'. Use: {}",
                        name,
                        ScenarioKind::ALL.map(|k| k.id()).join(", ")
                    ))
                })?;
                Ok(Scenario::new(kind, config.iterations, config.target))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(ScenarioKind::from_name("setStates"), Some(ScenarioKind::SetStates));
        assert_eq!(ScenarioKind::from_name("DELOBJECTS"), Some(ScenarioKind::DelObjects));
        assert_eq!(ScenarioKind::from_name("burst"), None);
    }

    #[test]
    fn test_every_kind_restores_namespace() {
        // Net effect on (objects, states) across all three phases must be zero
        for kind in ScenarioKind::ALL {
            let mut objects: i64 = 0;
            let mut states: i64 = 0;
            for phase in [Phase::Prepare, Phase::Execute, Phase::CleanUp] {
                for command in kind.commands(phase, 10) {
                    match command {
                        ControlCommand::SetObjects { count } => objects += count as i64,
                        ControlCommand::DeleteObjects { count } => objects -= count as i64,
                        ControlCommand::SetStates { count } => states += count as i64,
                        ControlCommand::DeleteStates { count } => states -= count as i64,
                        _ => panic!("measuring command in {}", kind.id()),
                    }
                }
            }
            assert_eq!(objects, 0, "{}", kind.id());
            assert_eq!(states, 0, "{}", kind.id());
        }
    }

    #[test]
    fn test_set_states_times_only_writes() {
        let scenario = Scenario::new(ScenarioKind::SetStates, 100, 0);
        assert_eq!(
            scenario.commands(Phase::Execute),
            vec![ControlCommand::SetStates { count: 100 }]
        );
        assert_eq!(
            scenario.commands(Phase::Prepare),
            vec![ControlCommand::SetObjects { count: 100 }]
        );
    }

    #[test]
    fn test_from_config() {
        let config = BenchConfig {
            scenarios: vec!["setObjects".to_string(), "delStates".to_string()],
            iterations: 7,
            instances: 2,
            target: 2,
            ..BenchConfig::default()
        };
        let scenarios = Scenario::from_config(&config).unwrap();

        assert_eq!(scenarios.len(), 2);
        assert_eq!(scenarios[1].kind, ScenarioKind::DelStates);
        assert_eq!(scenarios[1].iterations, 7);
        assert_eq!(scenarios[1].target, 2);

        let bad = BenchConfig {
            scenarios: vec!["nope".to_string()],
            ..BenchConfig::default()
        };
        assert!(matches!(Scenario::from_config(&bad), Err(BenchError::Config(_))));
    }
}
