//! Experiment Tracker - append-only run store with typed queries
//!
//! Runs live in a `DashMap` keyed by run id. A record is fully built
//! (artifact stored and hashed) before the single insert that publishes it,
//! so concurrent readers never observe a partial record.
//!
//! ## Persistence
//!
//! [`ExperimentTracker::open`] keeps everything under one directory:
//!
//! ```text
//! <root>/experiments/<experiment_id>.json
//! <root>/runs/<run_id>.json
//! <root>/artifacts/<run_id>.json
//! ```
//!
//! and reloads existing records when reopened.

use std::fs;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::artifact_store::write_atomic;
use super::{
    ArtifactRecord, ArtifactStore, ExperimentRecord, FileArtifactStore, MemoryArtifactStore,
    MetricRecord, OrderBy, RunDraft, RunFilter, RunRecord, RunSummary,
};
use crate::classifier::{Classifier, ModelArtifact};
use crate::metrics::Metric;
use crate::{Error, Result};

const EXPERIMENTS_DIR: &str = "experiments";
const RUNS_DIR: &str = "runs";
const ARTIFACTS_DIR: &str = "artifacts";

/// Records runs, answers queries over them and reloads their models.
pub struct ExperimentTracker {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunRecord>,
    metrics: DashMap<String, Vec<MetricRecord>>,
    artifacts: Box<dyn ArtifactStore>,
    root: Option<PathBuf>,
}

impl std::fmt::Debug for ExperimentTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentTracker")
            .field("experiments", &self.experiments.len())
            .field("runs", &self.runs.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Default for ExperimentTracker {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl ExperimentTracker {
    /// Tracker with in-memory records and artifacts.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_artifact_store(Box::new(MemoryArtifactStore::new()))
    }

    /// In-memory records, artifacts in `store`.
    #[must_use]
    pub fn with_artifact_store(store: Box<dyn ArtifactStore>) -> Self {
        Self {
            experiments: DashMap::new(),
            runs: DashMap::new(),
            metrics: DashMap::new(),
            artifacts: store,
            root: None,
        }
    }

    /// Open (or create) a tracker persisted under `root`.
    ///
    /// # Errors
    ///
    /// Returns error if the directories cannot be created or an existing
    /// record cannot be parsed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(EXPERIMENTS_DIR))?;
        fs::create_dir_all(root.join(RUNS_DIR))?;
        let artifacts = FileArtifactStore::open(root.join(ARTIFACTS_DIR))?;

        let tracker = Self {
            root: Some(root.clone()),
            ..Self::with_artifact_store(Box::new(artifacts))
        };
        for experiment in load_json_dir::<ExperimentRecord>(&root.join(EXPERIMENTS_DIR))? {
            tracker
                .experiments
                .insert(experiment.experiment_id().to_string(), experiment);
        }
        for run in load_json_dir::<RunRecord>(&root.join(RUNS_DIR))? {
            tracker.index_metrics(&run);
            tracker.runs.insert(run.run_id().to_string(), run);
        }
        info!(
            root = %root.display(),
            experiments = tracker.experiments.len(),
            runs = tracker.runs.len(),
            "experiment tracker opened"
        );
        Ok(tracker)
    }

    /// Number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Register an experiment. Returns the existing record if the id is taken.
    ///
    /// # Errors
    ///
    /// Returns error if persisting the record fails.
    pub fn create_experiment(
        &self,
        experiment_id: &str,
        name: &str,
    ) -> Result<ExperimentRecord> {
        if let Some(existing) = self.experiments.get(experiment_id) {
            return Ok(existing.value().clone());
        }
        if experiment_id.is_empty() {
            return Err(Error::Configuration(
                "experiment id must not be empty".to_string(),
            ));
        }
        let record = ExperimentRecord::new(experiment_id, name);
        self.persist(EXPERIMENTS_DIR, experiment_id, &record)?;
        let record = self
            .experiments
            .entry(experiment_id.to_string())
            .or_insert(record)
            .value()
            .clone();
        debug!(experiment_id, "experiment created");
        Ok(record)
    }

    /// Look up an experiment.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<ExperimentRecord> {
        self.experiments.get(experiment_id).map(|e| e.value().clone())
    }

    /// Store `model` and publish a successful run built from `draft`.
    ///
    /// The experiment is created if it does not exist yet.
    ///
    /// # Errors
    ///
    /// - [`Error::ModelFailure`] if the model is not fitted
    /// - storage or serialization errors while writing the artifact or record
    pub fn log_run(&self, draft: RunDraft, model: &dyn Classifier) -> Result<RunRecord> {
        self.create_experiment(draft.experiment_id(), draft.experiment_id())?;
        let run_id = Uuid::new_v4().to_string();

        let bytes = model.to_artifact()?.to_bytes()?;
        let key = format!("{run_id}.json");
        self.artifacts.put(&key, &bytes)?;
        let artifact = ArtifactRecord::describe(key, &bytes);

        let record = draft.finish(run_id, Some(artifact));
        self.publish(record)
    }

    /// Publish a failed run built from `draft`. No artifact is stored.
    ///
    /// # Errors
    ///
    /// Returns error if persisting the record fails.
    pub fn log_failed_run(&self, draft: RunDraft, error: &Error) -> Result<RunRecord> {
        self.create_experiment(draft.experiment_id(), draft.experiment_id())?;
        let draft = if draft.is_failed() {
            draft
        } else {
            draft.failed(error.to_string())
        };
        let record = draft.finish(Uuid::new_v4().to_string(), None);
        self.publish(record)
    }

    fn publish(&self, record: RunRecord) -> Result<RunRecord> {
        self.persist(RUNS_DIR, record.run_id(), &record)?;
        self.index_metrics(&record);
        self.runs.insert(record.run_id().to_string(), record.clone());
        info!(
            run_id = record.run_id(),
            experiment_id = record.experiment_id(),
            status = ?record.status(),
            model_type = record.model_type().unwrap_or("unknown"),
            accuracy = record.metric(Metric::Accuracy),
            "run logged"
        );
        Ok(record)
    }

    fn index_metrics(&self, run: &RunRecord) {
        let step = run.iteration().unwrap_or(0);
        let points = run
            .metrics()
            .iter()
            .map(|(&metric, &value)| {
                MetricRecord::at(run.run_id(), metric, step, value, run.end_time())
            })
            .collect();
        self.metrics.insert(run.run_id().to_string(), points);
    }

    fn persist<T: Serialize>(&self, dir: &str, id: &str, value: &T) -> Result<()> {
        if let Some(root) = &self.root {
            let json = serde_json::to_vec_pretty(value)?;
            write_atomic(&root.join(dir).join(format!("{id}.json")), &json)?;
        }
        Ok(())
    }

    /// Fetch one run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown run id.
    pub fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.runs
            .get(run_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::NotFound(format!("run '{run_id}'")))
    }

    /// Every run of an experiment, oldest first.
    #[must_use]
    pub fn runs(&self, experiment_id: &str) -> Vec<RunRecord> {
        let mut runs: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|r| r.experiment_id() == experiment_id)
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| {
            a.start_time()
                .cmp(&b.start_time())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        runs
    }

    fn ordered(
        &self,
        experiment_id: Option<&str>,
        filter: &RunFilter,
        order_by: OrderBy,
        max_results: usize,
    ) -> Vec<RunRecord> {
        let mut matching: Vec<RunRecord> = self
            .runs
            .iter()
            .filter(|r| experiment_id.map_or(true, |id| r.experiment_id() == id))
            .filter(|r| r.metric(order_by.metric).is_some() && filter.matches(r))
            .map(|r| r.value().clone())
            .collect();
        matching.sort_by(|a, b| order_by.compare(a, b));
        matching.truncate(max_results);
        matching
    }

    /// Run ids across all experiments matching `filter`, sorted by `order_by`.
    #[must_use]
    pub fn search(&self, filter: &RunFilter, order_by: OrderBy, max_results: usize) -> Vec<String> {
        self.ordered(None, filter, order_by, max_results)
            .into_iter()
            .map(|r| r.run_id().to_string())
            .collect()
    }

    /// Summaries of one experiment's runs matching `filter`, sorted by `order_by`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown experiment id.
    pub fn search_runs(
        &self,
        experiment_id: &str,
        filter: &RunFilter,
        order_by: OrderBy,
        max_results: usize,
    ) -> Result<Vec<RunSummary>> {
        if !self.experiments.contains_key(experiment_id) {
            return Err(Error::NotFound(format!("experiment '{experiment_id}'")));
        }
        Ok(self
            .ordered(Some(experiment_id), filter, order_by, max_results)
            .iter()
            .map(RunSummary::from)
            .collect())
    }

    /// Best successful run of an experiment by `metric`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown experiment id.
    pub fn best_run(&self, experiment_id: &str, metric: Metric) -> Result<Option<RunSummary>> {
        Ok(self
            .search_runs(experiment_id, &RunFilter::successful(), OrderBy::best(metric), 1)?
            .into_iter()
            .next())
    }

    /// Learning curve of `metric` over an experiment's runs, ordered by step.
    #[must_use]
    pub fn metric_history(&self, experiment_id: &str, metric: Metric) -> Vec<MetricRecord> {
        let mut points: Vec<MetricRecord> = self
            .runs(experiment_id)
            .iter()
            .filter_map(|run| self.metrics.get(run.run_id()))
            .flat_map(|points| {
                points
                    .iter()
                    .filter(|p| p.metric() == metric)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .collect();
        points.sort_by(|a, b| {
            a.step()
                .cmp(&b.step())
                .then_with(|| a.timestamp().cmp(&b.timestamp()))
        });
        points
    }

    /// Reload the trained classifier of a run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the run is unknown or has no artifact,
    /// and also when the artifact is missing, cannot be read from the store,
    /// fails the hash check or cannot be decoded.
    pub fn load_model(&self, run_id: &str) -> Result<Box<dyn Classifier>> {
        let run = self.get_run(run_id)?;
        let artifact = run.artifact().ok_or_else(|| {
            Error::NotFound(format!("run '{run_id}' has no model artifact"))
        })?;
        let stored = self.artifacts.get(artifact.key()).map_err(|e| {
            warn!(run_id, key = artifact.key(), error = %e, "model artifact unreadable");
            Error::NotFound(format!("model artifact of run '{run_id}' is unreadable: {e}"))
        })?;
        let bytes = stored.ok_or_else(|| {
            warn!(run_id, key = artifact.key(), "model artifact missing");
            Error::NotFound(format!(
                "model artifact '{}' of run '{run_id}' is missing",
                artifact.key()
            ))
        })?;
        if !artifact.matches(&bytes) {
            warn!(
                run_id,
                expected = artifact.content_hash(),
                "model artifact failed hash check"
            );
            return Err(Error::NotFound(format!(
                "model artifact of run '{run_id}' is corrupted (expected {})",
                artifact.content_hash()
            )));
        }
        let model = ModelArtifact::from_bytes(&bytes).map_err(|e| {
            warn!(run_id, error = %e, "model artifact undecodable");
            Error::NotFound(format!("model artifact of run '{run_id}' is unreadable: {e}"))
        })?;
        debug!(run_id, model_type = %model.model_type(), "model loaded");
        Ok(model.into_classifier())
    }

    /// Direct access to the artifact store.
    #[must_use]
    pub fn artifact_store(&self) -> &dyn ArtifactStore {
        self.artifacts.as_ref()
    }
}

fn load_json_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut records = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_record = path.extension().is_some_and(|ext| ext == "json")
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'));
        if is_record {
            let bytes = fs::read(&path)?;
            records.push(serde_json::from_slice(&bytes)?);
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{NaiveBayes, VectorizerConfig};
    use crate::corpus::Sentiment;

    fn fitted() -> NaiveBayes {
        let mut model = NaiveBayes::new(1.0, VectorizerConfig::default());
        model
            .fit(
                &["good fun", "bad dull"],
                &[Sentiment::Positive, Sentiment::Negative],
            )
            .unwrap();
        model
    }

    #[test]
    fn test_log_run_creates_experiment_and_artifact() {
        let tracker = ExperimentTracker::in_memory();
        let run = tracker
            .log_run(RunDraft::new("exp").metric(Metric::Accuracy, 0.7), &fitted())
            .unwrap();
        assert_eq!(tracker.experiment_count(), 1);
        assert!(run.artifact().is_some());
        assert!(tracker.load_model(run.run_id()).unwrap().is_fitted());
    }

    #[test]
    fn test_unfitted_model_is_rejected() {
        let tracker = ExperimentTracker::in_memory();
        let model = NaiveBayes::new(1.0, VectorizerConfig::default());
        assert!(tracker.log_run(RunDraft::new("exp"), &model).is_err());
        assert_eq!(tracker.run_count(), 0);
    }

    #[test]
    fn test_failed_run_has_no_model() {
        let tracker = ExperimentTracker::in_memory();
        let run = tracker
            .log_failed_run(RunDraft::new("exp"), &Error::ModelFailure("boom".into()))
            .unwrap();
        assert!(matches!(
            tracker.load_model(run.run_id()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_corrupted_artifact_is_not_found() {
        let tracker = ExperimentTracker::in_memory();
        let run = tracker.log_run(RunDraft::new("exp"), &fitted()).unwrap();
        let key = run.artifact().unwrap().key().to_string();
        tracker.artifact_store().put(&key, b"garbage").unwrap();
        assert!(matches!(
            tracker.load_model(run.run_id()),
            Err(Error::NotFound(_))
        ));
        tracker.artifact_store().delete(&key).unwrap();
        assert!(matches!(
            tracker.load_model(run.run_id()),
            Err(Error::NotFound(_))
        ));
    }
}
