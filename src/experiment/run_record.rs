//! Run Record - one train+evaluate cycle

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ArtifactRecord;
use crate::classifier::ModelType;
use crate::metrics::Metric;

/// Tag holding the model family name.
pub const TAG_MODEL_TYPE: &str = "model_type";

/// Tag holding the active-learning iteration number.
pub const TAG_ITERATION: &str = "iteration";

/// Outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Trained, evaluated and persisted.
    Success,
    /// Fit or predict failed; no artifact.
    Failed,
}

/// Run Record captures one train+evaluate cycle.
///
/// Records are created complete by the tracker and never change afterwards.
/// A new training round produces a new record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    status: RunStatus,
    config: BTreeMap<String, serde_json::Value>,
    metrics: BTreeMap<Metric, f64>,
    tags: BTreeMap<String, String>,
    artifact: Option<ArtifactRecord>,
    error: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl RunRecord {
    /// Unique run id (uuid v4).
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Experiment the run belongs to.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Final status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Hyperparameters and preprocessing choices.
    #[must_use]
    pub const fn config(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.config
    }

    /// Validation metrics.
    #[must_use]
    pub const fn metrics(&self) -> &BTreeMap<Metric, f64> {
        &self.metrics
    }

    /// Value of one metric, if recorded.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied()
    }

    /// Run tags.
    #[must_use]
    pub const fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    /// The `model_type` tag.
    #[must_use]
    pub fn model_type(&self) -> Option<&str> {
        self.tags.get(TAG_MODEL_TYPE).map(String::as_str)
    }

    /// The `iteration` tag.
    #[must_use]
    pub fn iteration(&self) -> Option<u64> {
        self.tags.get(TAG_ITERATION).and_then(|v| v.parse().ok())
    }

    /// Stored model reference. `None` for failed runs.
    #[must_use]
    pub const fn artifact(&self) -> Option<&ArtifactRecord> {
        self.artifact.as_ref()
    }

    /// Failure message of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// When training started.
    #[must_use]
    pub const fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When the record was published.
    #[must_use]
    pub const fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }
}

/// Everything about a run known before the tracker assigns its id.
///
/// The clock starts when the draft is created.
#[derive(Debug, Clone)]
pub struct RunDraft {
    experiment_id: String,
    config: BTreeMap<String, serde_json::Value>,
    metrics: BTreeMap<Metric, f64>,
    tags: BTreeMap<String, String>,
    error: Option<String>,
    start_time: DateTime<Utc>,
}

impl RunDraft {
    /// Start a draft for `experiment_id`.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            config: BTreeMap::new(),
            metrics: BTreeMap::new(),
            tags: BTreeMap::new(),
            error: None,
            start_time: Utc::now(),
        }
    }

    /// Parent experiment.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Add one config entry.
    #[must_use]
    pub fn config(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Merge the fields of a JSON object into the config map.
    ///
    /// Non-object values are stored under `params`.
    #[must_use]
    pub fn config_object(mut self, value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => self.config.extend(map),
            other => {
                self.config.insert("params".to_string(), other);
            }
        }
        self
    }

    /// Record one metric.
    #[must_use]
    pub fn metric(mut self, metric: Metric, value: f64) -> Self {
        self.metrics.insert(metric, value);
        self
    }

    /// Record several metrics.
    #[must_use]
    pub fn metrics(mut self, metrics: impl IntoIterator<Item = (Metric, f64)>) -> Self {
        self.metrics.extend(metrics);
        self
    }

    /// Add a tag.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the `model_type` tag.
    #[must_use]
    pub fn model_type(self, model_type: ModelType) -> Self {
        self.tag(TAG_MODEL_TYPE, model_type.as_str())
    }

    /// Set the `iteration` tag.
    #[must_use]
    pub fn iteration(self, iteration: u64) -> Self {
        self.tag(TAG_ITERATION, iteration.to_string())
    }

    /// Override the start time.
    #[must_use]
    pub const fn start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Mark the run as failed.
    #[must_use]
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// True if [`RunDraft::failed`] was called.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn finish(self, run_id: String, artifact: Option<ArtifactRecord>) -> RunRecord {
        let status = if self.error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Success
        };
        RunRecord {
            run_id,
            experiment_id: self.experiment_id,
            status,
            config: self.config,
            metrics: self.metrics,
            tags: self.tags,
            artifact,
            error: self.error,
            start_time: self.start_time,
            end_time: Utc::now(),
        }
    }
}
