//! Model selection across session variants
//!
//! A [`Sweep`] runs several [`SessionConfig`] variants (model family,
//! hyperparameters, normalizer mode, uncertainty policy) on copies of one
//! corpus. Every variant logs into the same experiment so the tracker can
//! rank all runs together.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::corpus::Corpus;
use crate::engine::{ActiveLearningEngine, SessionConfig, SessionReport};
use crate::experiment::{ExperimentTracker, RunSummary};
use crate::metrics::Metric;
use crate::oracle::LabelOracle;
use crate::{Error, Result};

/// Tag naming the sweep variant a run belongs to.
pub const TAG_VARIANT: &str = "variant";

/// Result of one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantOutcome {
    /// Variant name
    pub variant: String,
    /// Session report, if the session finished
    pub report: Option<SessionReport>,
    /// Model failure that ended the session early
    pub error: Option<String>,
}

/// Named session variants sharing one experiment.
#[derive(Debug)]
pub struct Sweep {
    experiment_id: String,
    tracker: Arc<ExperimentTracker>,
    variants: Vec<(String, SessionConfig)>,
}

impl Sweep {
    /// Empty sweep logging into `experiment_id`.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, tracker: Arc<ExperimentTracker>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            tracker,
            variants: Vec::new(),
        }
    }

    /// Add a variant. Its experiment id is replaced by the sweep's and its
    /// runs are tagged with `variant = name`.
    #[must_use]
    pub fn variant(mut self, name: impl Into<String>, mut config: SessionConfig) -> Self {
        let name = name.into();
        config.experiment_id.clone_from(&self.experiment_id);
        config.tags.insert(TAG_VARIANT.to_string(), name.clone());
        self.variants.push((name, config));
        self
    }

    /// Number of variants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// True without variants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Run every variant on its own copy of `corpus`.
    ///
    /// A model failure ends only that variant and is reported in its outcome.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if the sweep has no variants or a variant is invalid
    /// - any error that is fatal for a session (data integrity, storage, oracle)
    pub fn run(&self, corpus: &Corpus, oracle: &Arc<dyn LabelOracle>) -> Result<Vec<VariantOutcome>> {
        if self.variants.is_empty() {
            return Err(Error::Configuration("sweep has no variants".to_string()));
        }
        for (_, config) in &self.variants {
            config.validate()?;
        }

        let mut outcomes = Vec::with_capacity(self.variants.len());
        for (name, config) in &self.variants {
            info!(experiment_id = %self.experiment_id, variant = %name, "sweep variant starting");
            let mut engine = ActiveLearningEngine::new(
                config.clone(),
                corpus.clone(),
                Arc::clone(oracle),
                Arc::clone(&self.tracker),
            )?;
            let outcome = match engine.run() {
                Ok(report) => VariantOutcome {
                    variant: name.clone(),
                    report: Some(report),
                    error: None,
                },
                Err(e @ Error::ModelFailure(_)) => {
                    warn!(variant = %name, error = %e, "sweep variant failed");
                    VariantOutcome {
                        variant: name.clone(),
                        report: None,
                        error: Some(e.to_string()),
                    }
                }
                Err(e) => return Err(e),
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Best successful run of the sweep by `metric`, with its reloaded model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no successful run carries `metric` or
    /// its model cannot be reloaded.
    pub fn select_best(&self, metric: Metric) -> Result<(RunSummary, Box<dyn Classifier>)> {
        let best = self
            .tracker
            .best_run(&self.experiment_id, metric)?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "no successful run with {metric} in experiment '{}'",
                    self.experiment_id
                ))
            })?;
        let model = self.tracker.load_model(&best.run_id)?;
        info!(
            run_id = %best.run_id,
            variant = best.tags.get(TAG_VARIANT).map_or("-", String::as_str),
            %metric,
            value = best.metric(metric),
            "best run selected"
        );
        Ok((best, model))
    }
}
