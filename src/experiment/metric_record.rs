//! Metric Record - learning-curve points

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::Metric;

/// One point of a learning curve: the value of a metric for a run at a step.
///
/// The step is the active-learning iteration the run belongs to, so ordering
/// a run history by step gives accuracy against labeling rounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    metric: Metric,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a metric record stamped with the current time.
    #[must_use]
    pub fn new(run_id: impl Into<String>, metric: Metric, step: u64, value: f64) -> Self {
        Self::at(run_id, metric, step, value, Utc::now())
    }

    /// Create a metric record with an explicit timestamp.
    #[must_use]
    pub fn at(
        run_id: impl Into<String>,
        metric: Metric,
        step: u64,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            metric,
            step,
            value,
            timestamp,
        }
    }

    /// Run this point belongs to.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Which metric this point measures.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// Iteration number.
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Recorded value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// When the point was logged.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_new() {
        let metric = MetricRecord::new("run-1", Metric::Accuracy, 2, 0.81);
        assert_eq!(metric.run_id(), "run-1");
        assert_eq!(metric.metric(), Metric::Accuracy);
        assert_eq!(metric.step(), 2);
        assert!((metric.value() - 0.81).abs() < f64::EPSILON);
    }
}
