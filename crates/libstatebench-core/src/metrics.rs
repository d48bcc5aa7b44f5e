//! Metric registry
//!
//! Static catalog of every measured quantity and the read-only output slots
//! its summary is published to. Reporting code reads the same catalog to know
//! what to display.

use serde::{Deserialize, Serialize};

/// A measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Duration of the timed execute phase
    Time,
    /// Process CPU usage
    Cpu,
    /// Process resident memory
    Memory,
    /// Scheduler delay of the async runtime
    EventLoopLag,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Time,
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::EventLoopLag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Time => "time",
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "mem",
            MetricKind::EventLoopLag => "eventLoopLag",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            MetricKind::Time => Unit::Seconds,
            MetricKind::Cpu => Unit::Percent,
            MetricKind::Memory => Unit::Bytes,
            MetricKind::EventLoopLag => Unit::Milliseconds,
        }
    }
}

/// Unit tag carried by every published value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "bytes")]
    Bytes,
    #[serde(rename = "ms")]
    Milliseconds,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Seconds => "s",
            Unit::Percent => "%",
            Unit::Bytes => "bytes",
            Unit::Milliseconds => "ms",
        }
    }
}

/// Which statistic of a metric a slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    StdDev,
}

/// Value kind of an output slot. Every slot is numeric today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Number,
}

/// A declared, read-only output for one statistic of one metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSlot {
    pub id: &'static str,
    pub name: &'static str,
    pub metric: MetricKind,
    pub statistic: Statistic,
    pub unit: Unit,
    pub kind: ValueKind,
    pub read: bool,
    pub write: bool,
}

const fn slot(
    id: &'static str,
    name: &'static str,
    metric: MetricKind,
    statistic: Statistic,
    unit: Unit,
) -> OutputSlot {
    OutputSlot {
        id,
        name,
        metric,
        statistic,
        unit,
        kind: ValueKind::Number,
        read: true,
        write: false,
    }
}

/// The full catalog: {time, cpu, memory, event-loop-lag} x {mean, std}
pub static OUTPUT_SLOTS: [OutputSlot; 8] = [
    slot("timeMean", "Time Mean", MetricKind::Time, Statistic::Mean, Unit::Seconds),
    slot("timeStd", "Time Standard Deviation", MetricKind::Time, Statistic::StdDev, Unit::Seconds),
    slot("cpuMean", "CPU Mean", MetricKind::Cpu, Statistic::Mean, Unit::Percent),
    slot("cpuStd", "CPU Standard Deviation", MetricKind::Cpu, Statistic::StdDev, Unit::Percent),
    slot("memMean", "MEM Mean", MetricKind::Memory, Statistic::Mean, Unit::Bytes),
    slot("memStd", "MEM Standard Deviation", MetricKind::Memory, Statistic::StdDev, Unit::Bytes),
    slot(
        "eventLoopLagMean",
        "Event Loop Lag Mean",
        MetricKind::EventLoopLag,
        Statistic::Mean,
        Unit::Milliseconds,
    ),
    slot(
        "eventLoopLagStd",
        "Event Loop Lag Standard Deviation",
        MetricKind::EventLoopLag,
        Statistic::StdDev,
        Unit::Milliseconds,
    ),
];

/// Read access to the slot catalog
pub struct MetricRegistry;

impl MetricRegistry {
    pub fn slots() -> &'static [OutputSlot] {
        &OUTPUT_SLOTS
    }

    pub fn slot(id: &str) -> Option<&'static OutputSlot> {
        OUTPUT_SLOTS.iter().find(|s| s.id == id)
    }

    /// The slot holding `statistic` for `metric`
    pub fn slot_for(metric: MetricKind, statistic: Statistic) -> &'static OutputSlot {
        // Catalog order is metric-major, mean before std
        let row = match metric {
            MetricKind::Time => 0,
            MetricKind::Cpu => 1,
            MetricKind::Memory => 2,
            MetricKind::EventLoopLag => 3,
        };
        let col = match statistic {
            Statistic::Mean => 0,
            Statistic::StdDev => 1,
        };
        &OUTPUT_SLOTS[row * 2 + col]
    }
}
