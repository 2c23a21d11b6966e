//! Typed run queries
//!
//! Filters and sort keys are enums checked at compile time rather than
//! parsed query strings.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{RunRecord, RunStatus};
use crate::classifier::ModelType;
use crate::metrics::Metric;

/// Sort direction for [`OrderBy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Smallest first
    Asc,
    /// Largest first
    #[default]
    Desc,
}

/// Sort runs by one metric.
///
/// Ties are broken by earliest `start_time`, then by `run_id`. Runs without
/// the metric are excluded from ordered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    /// Sort key
    pub metric: Metric,
    /// Direction
    pub direction: OrderDirection,
}

impl OrderBy {
    /// Largest `metric` first.
    #[must_use]
    pub const fn desc(metric: Metric) -> Self {
        Self {
            metric,
            direction: OrderDirection::Desc,
        }
    }

    /// Smallest `metric` first.
    #[must_use]
    pub const fn asc(metric: Metric) -> Self {
        Self {
            metric,
            direction: OrderDirection::Asc,
        }
    }

    /// Best first according to [`Metric::higher_is_better`].
    #[must_use]
    pub const fn best(metric: Metric) -> Self {
        if metric.higher_is_better() {
            Self::desc(metric)
        } else {
            Self::asc(metric)
        }
    }

    /// Total order over runs that carry the metric.
    pub(crate) fn compare(&self, a: &RunRecord, b: &RunRecord) -> Ordering {
        let (va, vb) = (
            a.metric(self.metric).unwrap_or(f64::NAN),
            b.metric(self.metric).unwrap_or(f64::NAN),
        );
        let by_value = match self.direction {
            OrderDirection::Asc => va.total_cmp(&vb),
            OrderDirection::Desc => vb.total_cmp(&va),
        };
        by_value
            .then_with(|| a.start_time().cmp(&b.start_time()))
            .then_with(|| a.run_id().cmp(b.run_id()))
    }
}

/// Conjunction of optional run predicates. The default matches every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFilter {
    /// Only runs of this family
    pub model_type: Option<ModelType>,
    /// Only runs with this status
    pub status: Option<RunStatus>,
    /// Only runs whose metric is at least the bound
    pub min_metric: Option<(Metric, f64)>,
    /// Only runs carrying this tag value
    pub tag: Option<(String, String)>,
}

impl RunFilter {
    /// Filter matching every run.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Successful runs only.
    #[must_use]
    pub fn successful() -> Self {
        Self::default().with_status(RunStatus::Success)
    }

    /// Restrict to one model family.
    #[must_use]
    pub const fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = Some(model_type);
        self
    }

    /// Restrict to one status.
    #[must_use]
    pub const fn with_status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Require `metric >= value`.
    #[must_use]
    pub const fn with_min_metric(mut self, metric: Metric, value: f64) -> Self {
        self.min_metric = Some((metric, value));
        self
    }

    /// Require a tag value.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tag = Some((key.into(), value.into()));
        self
    }

    /// Whether `run` satisfies every predicate.
    #[must_use]
    pub fn matches(&self, run: &RunRecord) -> bool {
        if let Some(model_type) = self.model_type {
            if run.model_type() != Some(model_type.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if run.status() != status {
                return false;
            }
        }
        if let Some((metric, bound)) = self.min_metric {
            if !run.metric(metric).is_some_and(|v| v >= bound) {
                return false;
            }
        }
        if let Some((key, value)) = &self.tag {
            if run.tags().get(key) != Some(value) {
                return false;
            }
        }
        true
    }
}

/// Query-surface view of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run id
    pub run_id: String,
    /// Parent experiment
    pub experiment_id: String,
    /// Outcome
    pub status: RunStatus,
    /// When training started
    pub start_time: DateTime<Utc>,
    /// Run tags, including `model_type`
    pub tags: BTreeMap<String, String>,
    /// Validation metrics
    pub metrics: BTreeMap<Metric, f64>,
}

impl From<&RunRecord> for RunSummary {
    fn from(run: &RunRecord) -> Self {
        Self {
            run_id: run.run_id().to_string(),
            experiment_id: run.experiment_id().to_string(),
            status: run.status(),
            start_time: run.start_time(),
            tags: run.tags().clone(),
            metrics: run.metrics().clone(),
        }
    }
}

impl RunSummary {
    /// Value of one metric, if recorded.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }

    /// The `model_type` tag.
    #[must_use]
    pub fn model_type(&self) -> Option<&str> {
        self.tags.get(super::TAG_MODEL_TYPE).map(String::as_str)
    }
}
