//! Active-learning iteration state machine
//!
//! ```text
//! Init → TrainEval → Score → Select → Label → Append → TrainEval → …
//!            │          │                                  │
//!            └─ Converged └─ Exhausted          MaxIterations ─┘
//! ```
//!
//! Iterations are strictly sequential: each selection depends on the model
//! trained in the same iteration. Only full-pool normalization and scoring
//! run in parallel, and both preserve id order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::SessionConfig;
use crate::classifier::{check_probabilities, Classifier, Probabilities};
use crate::corpus::{Corpus, ExampleId, Sentiment};
use crate::experiment::{ExperimentTracker, RunDraft};
use crate::metrics::{ClassificationReport, Metric};
use crate::normalize::TextNormalizer;
use crate::oracle::LabelOracle;
use crate::sampler::UncertaintySampler;
use crate::{Error, Result};

/// Unlabeled examples scored per `predict_proba` call.
const SCORE_CHUNK: usize = 1_024;

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// The configured iteration cap was reached
    MaxIterations,
    /// The unlabeled pool is empty
    Exhausted,
    /// A stopping threshold was met
    Converged {
        /// Validation accuracy of the run that met it
        accuracy: f64,
    },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxIterations => f.write_str("max iterations reached"),
            Self::Exhausted => f.write_str("unlabeled pool exhausted"),
            Self::Converged { accuracy } => write!(f, "converged at accuracy {accuracy:.4}"),
        }
    }
}

/// Where the engine is in its iteration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// Constructed, nothing trained yet
    Init,
    /// Fitting and evaluating
    TrainEval,
    /// Scoring the unlabeled pool
    Score,
    /// Choosing the query batch
    Select,
    /// Asking the oracle
    Label,
    /// Moving labeled examples into training
    Append,
    /// Terminal
    Stopped(StopReason),
}

impl Phase {
    /// Stop reason if the session has ended.
    #[must_use]
    pub const fn stop_reason(&self) -> Option<StopReason> {
        match self {
            Self::Stopped(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Outcome of one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    /// Zero-based iteration number
    pub iteration: u64,
    /// Run logged by TrainEval
    pub run_id: String,
    /// Validation metrics of that run
    pub metrics: BTreeMap<Metric, f64>,
    /// Training examples the model was fitted on
    pub training_size: usize,
    /// Unlabeled pool size after Append
    pub pool_size: usize,
    /// Ids labeled and appended this iteration, in selection order
    pub queried: Vec<ExampleId>,
    /// Set when this iteration ended the session
    pub stop: Option<StopReason>,
}

impl IterationReport {
    /// Validation accuracy.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        self.metrics.get(&Metric::Accuracy).copied()
    }
}

/// Outcome of [`ActiveLearningEngine::run`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Every completed iteration
    pub iterations: Vec<IterationReport>,
    /// What ended the session
    pub stop_reason: StopReason,
}

impl SessionReport {
    /// Run ids in iteration order.
    #[must_use]
    pub fn run_ids(&self) -> Vec<&str> {
        self.iterations.iter().map(|i| i.run_id.as_str()).collect()
    }

    /// Accuracy of the last iteration.
    #[must_use]
    pub fn final_accuracy(&self) -> Option<f64> {
        self.iterations.last().and_then(IterationReport::accuracy)
    }
}

/// Drives train → score → select → label → append until a stop condition.
pub struct ActiveLearningEngine {
    config: SessionConfig,
    corpus: Corpus,
    oracle: Arc<dyn LabelOracle>,
    tracker: Arc<ExperimentTracker>,
    sampler: UncertaintySampler,
    normalized: FxHashMap<ExampleId, String>,
    phase: Phase,
    iteration: u64,
    last_accuracy: Option<f64>,
    aborted: Option<String>,
}

impl fmt::Debug for ActiveLearningEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveLearningEngine")
            .field("experiment_id", &self.config.experiment_id)
            .field("phase", &self.phase)
            .field("iteration", &self.iteration)
            .field("training", &self.corpus.training().len())
            .field("unlabeled", &self.corpus.unlabeled().len())
            .finish_non_exhaustive()
    }
}

impl ActiveLearningEngine {
    /// Validate inputs and prepare a session.
    ///
    /// Every example is normalized once here; later phases reuse the cache.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] for an invalid config
    /// - [`Error::DataIntegrity`] for a corpus violating pool invariants
    pub fn new(
        config: SessionConfig,
        corpus: Corpus,
        oracle: Arc<dyn LabelOracle>,
        tracker: Arc<ExperimentTracker>,
    ) -> Result<Self> {
        config.validate()?;
        corpus.validate()?;
        let normalizer = TextNormalizer::new(config.normalizer)?;
        tracker.create_experiment(&config.experiment_id, &config.experiment_id)?;

        let examples: Vec<(ExampleId, &str)> = corpus
            .training()
            .iter()
            .chain(corpus.validation().iter())
            .chain(corpus.unlabeled().iter())
            .map(|e| (e.id, e.text.as_str()))
            .collect();
        let texts: Vec<&str> = examples.iter().map(|(_, text)| *text).collect();
        let normalized = examples
            .iter()
            .map(|(id, _)| *id)
            .zip(normalizer.normalize_batch(&texts))
            .collect();

        info!(
            experiment_id = %config.experiment_id,
            model_type = %config.model.model_type(),
            normalizer = %config.normalizer.mode,
            uncertainty = %config.uncertainty,
            batch_size = config.batch_size,
            training = corpus.training().len(),
            validation = corpus.validation().len(),
            unlabeled = corpus.unlabeled().len(),
            "active learning session initialised"
        );

        Ok(Self {
            sampler: UncertaintySampler::new(config.uncertainty),
            config,
            corpus,
            oracle,
            tracker,
            normalized,
            phase: Phase::Init,
            iteration: 0,
            last_accuracy: None,
            aborted: None,
        })
    }

    /// Session config.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current pools.
    #[must_use]
    pub const fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Completed iterations.
    #[must_use]
    pub const fn iterations_completed(&self) -> u64 {
        self.iteration
    }

    /// Tracker receiving the runs.
    #[must_use]
    pub fn tracker(&self) -> &Arc<ExperimentTracker> {
        &self.tracker
    }

    /// Give back the pools.
    #[must_use]
    pub fn into_corpus(self) -> Corpus {
        self.corpus
    }

    fn enter(&mut self, phase: Phase) {
        debug!(iteration = self.iteration, from = ?self.phase, to = ?phase, "phase transition");
        self.phase = phase;
    }

    fn stop(&mut self, reason: StopReason) -> StopReason {
        info!(iteration = self.iteration, %reason, "active learning session stopped");
        self.enter(Phase::Stopped(reason));
        reason
    }

    fn texts<'a>(&'a self, ids: &[ExampleId]) -> Result<Vec<&'a str>> {
        ids.iter()
            .map(|id| {
                self.normalized.get(id).map(String::as_str).ok_or_else(|| {
                    Error::DataIntegrity(format!("example {id} was not normalized at Init"))
                })
            })
            .collect()
    }

    /// Run one full iteration.
    ///
    /// Returns `Ok(None)` once the session has stopped. The report of the
    /// iteration that triggers a stop carries the reason.
    ///
    /// # Errors
    ///
    /// - [`Error::DataIntegrity`] if the pools lost an invariant
    /// - [`Error::ModelFailure`] if fit or predict failed; a failed run is
    ///   logged and the pools and iteration count are left as they were, so
    ///   the next step retries TrainEval
    /// - [`Error::NotFound`] if the oracle cannot label a queried id
    ///
    /// Any error other than [`Error::ModelFailure`] aborts the session and
    /// later steps return [`Error::Other`].
    pub fn step(&mut self) -> Result<Option<IterationReport>> {
        if let Some(reason) = &self.aborted {
            return Err(Error::Other(format!("session aborted earlier: {reason}")));
        }
        if matches!(self.phase, Phase::Stopped(_)) {
            return Ok(None);
        }
        if self.iteration >= self.config.max_iterations as u64 {
            self.stop(StopReason::MaxIterations);
            return Ok(None);
        }

        let result = self.iterate();
        if let Err(e) = &result {
            if e.is_fatal_for_session() {
                error!(iteration = self.iteration, phase = ?self.phase, error = %e, "session aborted");
                self.aborted = Some(e.to_string());
            } else {
                warn!(iteration = self.iteration, phase = ?self.phase, error = %e, "iteration failed");
            }
        }
        result.map(Some)
    }

    /// Step until the session stops.
    ///
    /// # Errors
    ///
    /// Returns the first error from [`ActiveLearningEngine::step`].
    pub fn run(&mut self) -> Result<SessionReport> {
        let mut iterations = Vec::new();
        while let Some(report) = self.step()? {
            iterations.push(report);
        }
        let stop_reason = self.phase.stop_reason().unwrap_or(StopReason::MaxIterations);
        Ok(SessionReport {
            iterations,
            stop_reason,
        })
    }

    fn iterate(&mut self) -> Result<IterationReport> {
        self.enter(Phase::TrainEval);
        self.corpus.validate()?;
        let (model, run_id, metrics) = self.train_eval()?;
        let training_size = self.corpus.training().len();
        let accuracy = metrics.get(&Metric::Accuracy).copied().unwrap_or(0.0);

        let mut report = IterationReport {
            iteration: self.iteration,
            run_id,
            metrics,
            training_size,
            pool_size: self.corpus.unlabeled().len(),
            queried: Vec::new(),
            stop: None,
        };

        if self.converged(accuracy) {
            self.last_accuracy = Some(accuracy);
            self.iteration += 1;
            report.stop = Some(self.stop(StopReason::Converged { accuracy }));
            return Ok(report);
        }
        if self.corpus.unlabeled().is_empty() {
            self.last_accuracy = Some(accuracy);
            self.iteration += 1;
            report.stop = Some(self.stop(StopReason::Exhausted));
            return Ok(report);
        }

        self.enter(Phase::Score);
        let scores = self.score(model.as_ref())?;

        self.enter(Phase::Select);
        let selection = self.sampler.select(&scores, self.config.batch_size)?;

        self.enter(Phase::Label);
        let labels = self.oracle.label_batch(selection.ids())?;

        self.enter(Phase::Append);
        self.corpus.transfer(&labels)?;
        report.queried = selection.into_ids();
        report.pool_size = self.corpus.unlabeled().len();
        self.last_accuracy = Some(accuracy);
        self.iteration += 1;

        info!(
            iteration = report.iteration,
            accuracy,
            queried = report.queried.len(),
            training = self.corpus.training().len(),
            unlabeled = report.pool_size,
            "iteration complete"
        );

        if self.iteration >= self.config.max_iterations as u64 {
            report.stop = Some(self.stop(StopReason::MaxIterations));
        }
        Ok(report)
    }

    fn converged(&self, accuracy: f64) -> bool {
        let stopping = self.config.stopping;
        if stopping.target_accuracy.is_some_and(|target| accuracy >= target) {
            return true;
        }
        match (stopping.min_improvement, self.last_accuracy) {
            (Some(delta), Some(previous)) => accuracy - previous < delta,
            _ => false,
        }
    }

    fn run_draft(&self) -> RunDraft {
        let config = &self.config;
        let mut draft = RunDraft::new(&config.experiment_id)
            .model_type(config.model.model_type())
            .iteration(self.iteration)
            .config("normalizer", serde_json::json!(config.normalizer))
            .config("uncertainty", serde_json::json!(config.uncertainty))
            .config("batch_size", serde_json::json!(config.batch_size))
            .config("seed", serde_json::json!(config.seed))
            .config(
                "training_size",
                serde_json::json!(self.corpus.training().len()),
            );
        for (key, value) in &config.tags {
            draft = draft.tag(key, value);
        }
        draft
    }

    fn train_eval(&self) -> Result<(Box<dyn Classifier>, String, BTreeMap<Metric, f64>)> {
        let draft = self.run_draft();
        let mut model = self.config.model.build(self.config.vectorizer)?;
        let draft = draft.config_object(model.params());

        match self.fit_and_evaluate(model.as_mut()) {
            Ok(report) => {
                let metrics = report.to_map();
                let run = self
                    .tracker
                    .log_run(draft.metrics(metrics.clone()), model.as_ref())?;
                Ok((model, run.run_id().to_string(), metrics))
            }
            Err(e) => {
                if let Err(log_err) = self.tracker.log_failed_run(draft, &e) {
                    warn!(error = %log_err, "could not record failed run");
                }
                Err(e)
            }
        }
    }

    fn fit_and_evaluate(&self, model: &mut dyn Classifier) -> Result<ClassificationReport> {
        let training = self.corpus.training();
        let ids: Vec<ExampleId> = training.ids().collect();
        let labels: Vec<Sentiment> = training.iter().filter_map(|e| e.label).collect();
        if labels.len() != ids.len() {
            return Err(Error::DataIntegrity(
                "training pool holds unlabeled examples".to_string(),
            ));
        }
        model.fit(&self.texts(&ids)?, &labels)?;

        let validation = self.corpus.validation();
        let val_ids: Vec<ExampleId> = validation.ids().collect();
        let truth: Vec<Sentiment> = validation.iter().filter_map(|e| e.label).collect();
        let probabilities = model.predict_proba(&self.texts(&val_ids)?)?;
        check_probabilities(&probabilities, val_ids.len())?;
        ClassificationReport::evaluate(&probabilities, &truth)
    }

    fn score(&self, model: &dyn Classifier) -> Result<BTreeMap<ExampleId, Probabilities>> {
        let ids: Vec<ExampleId> = self.corpus.unlabeled().ids().collect();
        let texts = self.texts(&ids)?;

        #[cfg(feature = "parallel")]
        let chunks: Vec<Vec<Probabilities>> = {
            use rayon::prelude::*;
            texts
                .par_chunks(SCORE_CHUNK)
                .map(|chunk| model.predict_proba(chunk))
                .collect::<Result<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let chunks: Vec<Vec<Probabilities>> = texts
            .chunks(SCORE_CHUNK)
            .map(|chunk| model.predict_proba(chunk))
            .collect::<Result<_>>()?;

        let probabilities: Vec<Probabilities> = chunks.into_iter().flatten().collect();
        check_probabilities(&probabilities, ids.len())?;
        debug!(scored = ids.len(), "unlabeled pool scored");
        Ok(ids.into_iter().zip(probabilities).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Example, Pool};
    use crate::oracle::SimulatedOracle;

    fn tiny() -> (Corpus, Arc<dyn LabelOracle>) {
        let pos = ["great fun film", "wonderful acting", "loved the story"];
        let neg = ["boring dull film", "awful acting", "hated the story"];
        let mut training = Vec::new();
        let mut validation = Vec::new();
        let mut unlabeled = Vec::new();
        let mut withheld = BTreeMap::new();
        let mut id = 0u64;
        for round in 0..4 {
            for (texts, label) in [(pos, Sentiment::Positive), (neg, Sentiment::Negative)] {
                for text in texts {
                    id += 1;
                    match round {
                        0 => training.push(Example::labeled(id, text, label)),
                        1 => validation.push(Example::labeled(id, text, label)),
                        _ => {
                            unlabeled.push(Example::unlabeled(id, text));
                            withheld.insert(ExampleId(id), label);
                        }
                    }
                }
            }
        }
        let corpus = Corpus::new(
            Pool::from_examples(training),
            Pool::from_examples(validation),
            Pool::from_examples(unlabeled),
        )
        .unwrap();
        let oracle: Arc<dyn LabelOracle> = Arc::new(SimulatedOracle::new(withheld));
        (corpus, oracle)
    }

    #[test]
    fn test_step_moves_one_batch() {
        let (corpus, oracle) = tiny();
        let config = SessionConfig::builder()
            .batch_size(4)
            .max_iterations(2)
            .build()
            .unwrap();
        let tracker = Arc::new(ExperimentTracker::in_memory());
        let mut engine = ActiveLearningEngine::new(config, corpus, oracle, tracker).unwrap();
        assert_eq!(engine.phase(), Phase::Init);

        let report = engine.step().unwrap().unwrap();
        assert_eq!(report.queried.len(), 4);
        assert_eq!(report.training_size, 6);
        assert_eq!(engine.corpus().training().len(), 10);
        assert_eq!(engine.corpus().unlabeled().len(), 8);
        assert!(report.stop.is_none());
        assert_eq!(engine.phase(), Phase::Append);
    }

    #[test]
    fn test_stopped_engine_returns_none() {
        let (corpus, oracle) = tiny();
        let config = SessionConfig::builder().max_iterations(1).build().unwrap();
        let tracker = Arc::new(ExperimentTracker::in_memory());
        let mut engine = ActiveLearningEngine::new(config, corpus, oracle, tracker).unwrap();
        let report = engine.step().unwrap().unwrap();
        assert_eq!(report.stop, Some(StopReason::MaxIterations));
        assert!(engine.step().unwrap().is_none());
    }
}
