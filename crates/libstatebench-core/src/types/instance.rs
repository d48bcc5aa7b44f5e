use serde::{Deserialize, Serialize};

/// Index of a benchmark instance. The coordinating process is usually 0,
/// provisioned workers are numbered 1..=N.
pub type InstanceIndex = u32;

/// Identity of the current process, used to pick the local or remote path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub index: InstanceIndex,
}

impl InstanceIdentity {
    pub fn new(index: InstanceIndex) -> Self {
        Self { index }
    }

    /// Whether `target` refers to this process
    pub fn is(&self, target: InstanceIndex) -> bool {
        self.index == target
    }
}

/// Flags pushed to an instance after creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InstanceSettings {
    pub enabled: bool,
    /// Suppresses the worker's own benchmark run; it only answers commands
    pub secondary_mode: bool,
}

impl InstanceSettings {
    pub fn secondary() -> Self {
        Self {
            enabled: true,
            secondary_mode: true,
        }
    }
}

/// Provisioning progress of a worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Readiness {
    #[default]
    Created,
    Enabled,
    Ready,
}

impl Readiness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Readiness::Created => "created",
            Readiness::Enabled => "enabled",
            Readiness::Ready => "ready",
        }
    }
}

/// One spawned secondary runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInstance {
    pub index: InstanceIndex,
    pub enabled: bool,
    pub secondary_mode: bool,
    pub host: Option<String>,
    pub readiness: Readiness,
}

impl WorkerInstance {
    /// A freshly created, still disabled instance
    pub fn created(index: InstanceIndex, host: Option<String>) -> Self {
        Self {
            index,
            enabled: false,
            secondary_mode: false,
            host,
            readiness: Readiness::Created,
        }
    }

    pub fn apply(&mut self, settings: InstanceSettings) {
        self.enabled = settings.enabled;
        self.secondary_mode = settings.secondary_mode;
        if self.enabled && self.secondary_mode {
            self.readiness = Readiness::Enabled;
        }
    }

    /// Grace period elapsed; has no effect before the instance was enabled
    pub fn mark_ready(&mut self) {
        if self.readiness == Readiness::Enabled {
            self.readiness = Readiness::Ready;
        }
    }

    /// Only enabled secondary instances past their grace period take load
    pub fn is_usable(&self) -> bool {
        self.enabled && self.secondary_mode && self.readiness == Readiness::Ready
    }
}
