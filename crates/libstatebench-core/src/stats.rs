//! Statistics aggregation
//!
//! Samples are kept per metric until `reset()`. Summaries use the population
//! formulas; a metric with no samples has no summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metrics::{MetricKind, MetricRegistry, Statistic, Unit};
use crate::types::{MetricSample, ResourceSample};

/// Mean and population standard deviation of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: MetricKind,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub unit: Unit,
}

impl MetricSummary {
    /// Summarize raw values. Returns `None` for an empty slice.
    pub fn from_values(metric: MetricKind, values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            metric,
            count: values.len(),
            mean,
            std_dev: variance.sqrt(),
            unit: metric.unit(),
        })
    }

    pub fn value(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean,
            Statistic::StdDev => self.std_dev,
        }
    }
}

/// Collects samples per metric for the scenario currently being driven
#[derive(Debug, Default)]
pub struct StatsAggregator {
    samples: BTreeMap<MetricKind, Vec<MetricSample>>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample for `metric`
    pub fn record(&mut self, metric: MetricKind, value: f64) {
        self.push(MetricSample::now(metric, value));
    }

    pub fn push(&mut self, sample: MetricSample) {
        self.samples.entry(sample.metric).or_default().push(sample);
    }

    /// Fan sampler ticks out to the cpu, memory and event-loop-lag metrics
    pub fn record_resources(&mut self, samples: &[ResourceSample]) {
        for s in samples {
            self.push(MetricSample {
                metric: MetricKind::Cpu,
                value: s.cpu_percent,
                ts_unix_ms: s.ts_unix_ms,
            });
            self.push(MetricSample {
                metric: MetricKind::Memory,
                value: s.memory_bytes as f64,
                ts_unix_ms: s.ts_unix_ms,
            });
            self.push(MetricSample {
                metric: MetricKind::EventLoopLag,
                value: s.event_loop_lag_ms,
                ts_unix_ms: s.ts_unix_ms,
            });
        }
    }

    /// Number of samples recorded for `metric` since the last reset
    pub fn count(&self, metric: MetricKind) -> usize {
        self.samples.get(&metric).map(Vec::len).unwrap_or(0)
    }

    pub fn samples(&self, metric: MetricKind) -> &[MetricSample] {
        self.samples.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Summary over every sample of `metric`, or `None` when there are none
    pub fn summarize(&self, metric: MetricKind) -> Option<MetricSummary> {
        let values: Vec<f64> = self.samples(metric).iter().map(|s| s.value).collect();
        MetricSummary::from_values(metric, &values)
    }

    pub fn summaries(&self) -> Vec<MetricSummary> {
        MetricKind::ALL
            .iter()
            .filter_map(|m| self.summarize(*m))
            .collect()
    }

    /// Clear all samples before the next scenario
    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// Write every available summary into the registry slots, scoped by scenario
    pub fn publish(&self, scenario: &str, outputs: &mut PublishedOutputs) -> usize {
        let mut written = 0;
        for summary in self.summaries() {
            for statistic in [Statistic::Mean, Statistic::StdDev] {
                let slot = MetricRegistry::slot_for(summary.metric, statistic);
                outputs.set(
                    scenario,
                    PublishedValue {
                        slot: slot.id.to_string(),
                        name: slot.name.to_string(),
                        value: summary.value(statistic),
                        unit: slot.unit,
                        samples: summary.count,
                    },
                );
                written += 1;
            }
        }
        written
    }
}

/// Value written to an output slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedValue {
    pub slot: String,
    pub name: String,
    pub value: f64,
    pub unit: Unit,
    pub samples: usize,
}

/// Published results, keyed by scenario then slot id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishedOutputs {
    scenarios: BTreeMap<String, BTreeMap<String, PublishedValue>>,
}

impl PublishedOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&mut self, scenario: &str, value: PublishedValue) {
        self.scenarios
            .entry(scenario.to_string())
            .or_default()
            .insert(value.slot.clone(), value);
    }

    pub fn get(&self, scenario: &str, slot: &str) -> Option<&PublishedValue> {
        self.scenarios.get(scenario).and_then(|s| s.get(slot))
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// Values of one scenario in registry order
    pub fn values(&self, scenario: &str) -> Vec<&PublishedValue> {
        let Some(values) = self.scenarios.get(scenario) else {
            return Vec::new();
        };
        MetricRegistry::slots()
            .iter()
            .filter_map(|slot| values.get(slot.id))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
