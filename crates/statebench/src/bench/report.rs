//! Benchmark results and their output

use std::path::Path;

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use libstatebench_core::types::InstanceIndex;
use libstatebench_core::{MetricSummary, PublishedOutputs};
use serde::{Deserialize, Serialize};

use super::scenario::Scenario;
use crate::error::{BenchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
}

/// Outcome of one scenario across all of its epochs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub description: String,
    pub iterations: u64,
    pub target: InstanceIndex,
    pub epochs_completed: u32,
    pub status: ScenarioStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub summaries: Vec<MetricSummary>,
}

impl ScenarioReport {
    pub fn passed(scenario: &Scenario, epochs: u32, summaries: Vec<MetricSummary>) -> Self {
        Self {
            scenario: scenario.id.clone(),
            description: scenario.kind.description().to_string(),
            iterations: scenario.iterations,
            target: scenario.target,
            epochs_completed: epochs,
            status: ScenarioStatus::Passed,
            failed_phase: None,
            error: None,
            summaries,
        }
    }

    pub fn failed(
        scenario: &Scenario,
        epochs: u32,
        summaries: Vec<MetricSummary>,
        error: &BenchError,
    ) -> Self {
        let (failed_phase, message) = match error {
            BenchError::ScenarioFailed { phase, source, .. } => {
                (Some(phase.to_string()), source.to_string())
            }
            other => (None, other.to_string()),
        };
        Self {
            status: ScenarioStatus::Failed,
            failed_phase,
            error: Some(message),
            ..Self::passed(scenario, epochs, summaries)
        }
    }
}

/// Full run report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub iterations: u64,
    pub epochs: u32,
    pub instances: u32,
    pub scenarios: Vec<ScenarioReport>,
    /// Registry output slots per scenario
    pub outputs: PublishedOutputs,
}

impl BenchReport {
    pub fn failed_count(&self) -> usize {
        self.scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Failed)
            .count()
    }

    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// One row per published output slot
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Scenario", "Output", "Value", "Unit", "Samples"]);

        for scenario in &self.scenarios {
            let values = self.outputs.values(&scenario.scenario);
            if values.is_empty() {
                table.add_row(vec![
                    Cell::new(&scenario.scenario),
                    Cell::new("-"),
                    Cell::new(scenario.error.as_deref().unwrap_or("no samples")),
                    Cell::new(""),
                    Cell::new("0"),
                ]);
                continue;
            }
            for value in values {
                table.add_row(vec![
                    Cell::new(&scenario.scenario),
                    Cell::new(&value.name),
                    Cell::new(format_value(value.value)).set_alignment(CellAlignment::Right),
                    Cell::new(value.unit.as_str()),
                    Cell::new(value.samples).set_alignment(CellAlignment::Right),
                ]);
            }
        }
        table
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn format_value(value: f64) -> String {
    if value != 0.0 && value.abs() < 0.001 {
        format!("{:.3e}", value)
    } else {
        format!("{:.4}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::scenario::ScenarioKind;
    use libstatebench_core::{MetricKind, StatsAggregator};
    use tempfile::tempdir;

    fn sample_report() -> BenchReport {
        let passed = Scenario::new(ScenarioKind::SetStates, 10, 0);
        let failed = Scenario::new(ScenarioKind::DelObjects, 10, 1);

        let mut agg = StatsAggregator::new();
        agg.record(MetricKind::Time, 0.5);
        agg.record(MetricKind::Time, 1.5);
        let mut outputs = PublishedOutputs::new();
        agg.publish(&passed.id, &mut outputs);

        let error = BenchError::ScenarioFailed {
            scenario: failed.id.clone(),
            phase: "prepare",
            source: Box::new(BenchError::NotMeasuring),
        };
        let now = Utc::now();
        BenchReport {
            started_at: now,
            finished_at: now,
            iterations: 10,
            epochs: 2,
            instances: 1,
            scenarios: vec![
                ScenarioReport::passed(&passed, 2, agg.summaries()),
                ScenarioReport::failed(&failed, 0, Vec::new(), &error),
            ],
            outputs,
        }
    }

    #[test]
    fn test_failed_report_carries_phase() {
        let report = sample_report();
        assert_eq!(report.failed_count(), 1);
        let failed = &report.scenarios[1];
        assert_eq!(failed.failed_phase.as_deref(), Some("prepare"));
        assert_eq!(failed.error.as_deref(), Some("Not measuring"));
        assert_eq!(failed.target, 1);
    }

    #[test]
    fn test_table_lists_published_slots() {
        let rendered = sample_report().to_table().to_string();
        assert!(rendered.contains("Time Mean"));
        assert!(rendered.contains("Time Standard Deviation"));
        assert!(rendered.contains("delObjects"));
    }

    #[test]
    fn test_json_report() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");
        sample_report().write_json(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["scenarios"][0]["status"], "passed");
        assert_eq!(json["scenarios"][1]["failed_phase"], "prepare");
        assert_eq!(
            json["outputs"]["scenarios"]["setStates"]["timeMean"]["value"],
            1.0
        );
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.0), "1.0000");
        assert_eq!(format_value(0.0), "0.0000");
        assert_eq!(format_value(0.0002), "2.000e-4");
    }
}
