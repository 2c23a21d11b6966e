//! Classifier adapter
//!
//! Every model family implements [`Classifier`]. The engine and the sampler
//! only see this trait; the family is chosen once, from a [`ModelSpec`], when
//! a session is configured.
//!
//! ## Probability contract
//!
//! `predict_proba` returns one `[p_negative, p_positive]` row per input, each
//! entry finite and in `[0, 1]`, summing to 1 within [`PROBABILITY_TOLERANCE`].
//! [`check_probabilities`] enforces this at the adapter boundary.
//!
//! ## Persistence
//!
//! A trained model is captured as a [`ModelArtifact`], a tagged serde enum
//! that round-trips back into a `Box<dyn Classifier>`.

mod forest;
mod naive_bayes;
mod sgd;
mod vectorizer;

pub use forest::RandomForest;
pub use naive_bayes::NaiveBayes;
pub use sgd::SgdClassifier;
pub use vectorizer::{SparseVector, Vectorizer, VectorizerConfig};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::corpus::Sentiment;
use crate::{Error, Result};

/// Allowed deviation of a probability row sum from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Probability row: `[p_negative, p_positive]`.
pub type Probabilities = [f64; 2];

/// Model family identifier, recorded as the `model_type` tag of every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Multinomial Naive Bayes
    NaiveBayes,
    /// Logistic regression trained with SGD
    Sgd,
    /// Bagged decision trees
    RandomForest,
}

impl ModelType {
    /// Tag value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NaiveBayes => "naive_bayes",
            Self::Sgd => "sgd",
            Self::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform capability surface over model families.
pub trait Classifier: Send + Sync {
    /// Train on normalized documents. Replaces any previous training.
    ///
    /// # Errors
    ///
    /// - [`Error::DataIntegrity`] for an empty training set or mismatched lengths
    /// - [`Error::ModelFailure`] for a single-class label distribution
    fn fit(&mut self, docs: &[&str], labels: &[Sentiment]) -> Result<()>;

    /// Class probabilities per document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFailure`] if the model is not fitted.
    fn predict_proba(&self, docs: &[&str]) -> Result<Vec<Probabilities>>;

    /// Most probable class per document (ties go to negative).
    ///
    /// # Errors
    ///
    /// Same as [`Classifier::predict_proba`].
    fn predict(&self, docs: &[&str]) -> Result<Vec<Sentiment>> {
        Ok(self
            .predict_proba(docs)?
            .iter()
            .map(|p| {
                if p[1] > p[0] {
                    Sentiment::Positive
                } else {
                    Sentiment::Negative
                }
            })
            .collect())
    }

    /// Family of this model.
    fn model_type(&self) -> ModelType;

    /// Hyperparameters, including the vectorizer settings.
    fn params(&self) -> serde_json::Value;

    /// Whether `fit` has completed.
    fn is_fitted(&self) -> bool;

    /// Snapshot of the trained state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFailure`] if the model is not fitted.
    fn to_artifact(&self) -> Result<ModelArtifact>;
}

/// Serialized classifier state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Multinomial Naive Bayes
    NaiveBayes(NaiveBayes),
    /// SGD logistic regression
    Sgd(SgdClassifier),
    /// Random forest
    RandomForest(RandomForest),
}

impl ModelArtifact {
    /// Family of the stored model.
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        match self {
            Self::NaiveBayes(_) => ModelType::NaiveBayes,
            Self::Sgd(_) => ModelType::Sgd,
            Self::RandomForest(_) => ModelType::RandomForest,
        }
    }

    /// Encode as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the bytes are not a valid artifact.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Turn the stored state back into a usable classifier.
    #[must_use]
    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self {
            Self::NaiveBayes(model) => Box::new(model),
            Self::Sgd(model) => Box::new(model),
            Self::RandomForest(model) => Box::new(model),
        }
    }
}

const fn default_nb_alpha() -> f64 {
    1.0
}

const fn default_sgd_alpha() -> f64 {
    1e-4
}

const fn default_epochs() -> usize {
    5
}

const fn default_learning_rate() -> f64 {
    0.5
}

const fn default_n_trees() -> usize {
    25
}

const fn default_max_depth() -> usize {
    8
}

const fn default_min_samples_split() -> usize {
    4
}

const fn default_forest_features() -> usize {
    2_000
}

const fn default_seed() -> u64 {
    42
}

/// Model family plus its hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ModelSpec {
    /// Multinomial Naive Bayes with additive smoothing
    NaiveBayes {
        /// Laplace/Lidstone smoothing
        #[serde(default = "default_nb_alpha")]
        alpha: f64,
    },
    /// Logistic regression trained with SGD
    Sgd {
        /// L2 regularization strength
        #[serde(default = "default_sgd_alpha")]
        alpha: f64,
        /// Passes over the training set
        #[serde(default = "default_epochs")]
        epochs: usize,
        /// Initial learning rate
        #[serde(default = "default_learning_rate")]
        learning_rate: f64,
        /// Shuffle seed
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// Bagged Gini decision trees on term presence
    RandomForest {
        /// Number of trees
        #[serde(default = "default_n_trees")]
        n_trees: usize,
        /// Maximum tree depth
        #[serde(default = "default_max_depth")]
        max_depth: usize,
        /// Smallest node that may still be split
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
        /// Vocabulary cap for the presence features
        #[serde(default = "default_forest_features")]
        max_features: usize,
        /// Bootstrap and feature-sampling seed
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::NaiveBayes {
            alpha: default_nb_alpha(),
        }
    }
}

impl ModelSpec {
    /// SGD logistic regression with default hyperparameters.
    #[must_use]
    pub const fn sgd() -> Self {
        Self::Sgd {
            alpha: default_sgd_alpha(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
        }
    }

    /// Random forest with default hyperparameters.
    #[must_use]
    pub const fn random_forest() -> Self {
        Self::RandomForest {
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            max_features: default_forest_features(),
            seed: default_seed(),
        }
    }

    /// Family this model spec builds.
    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        match self {
            Self::NaiveBayes { .. } => ModelType::NaiveBayes,
            Self::Sgd { .. } => ModelType::Sgd,
            Self::RandomForest { .. } => ModelType::RandomForest,
        }
    }

    /// Check hyperparameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the offending hyperparameter.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: &str| -> Result<()> { Err(Error::Configuration(msg.to_string())) };
        match *self {
            Self::NaiveBayes { alpha } if !(alpha.is_finite() && alpha > 0.0) => {
                bad("naive_bayes.alpha must be a positive finite number")
            }
            Self::Sgd { alpha, .. } if !(alpha.is_finite() && alpha >= 0.0) => {
                bad("sgd.alpha must be a non-negative finite number")
            }
            Self::Sgd { epochs: 0, .. } => bad("sgd.epochs must be at least 1"),
            Self::Sgd { learning_rate, .. }
                if !(learning_rate.is_finite() && learning_rate > 0.0) =>
            {
                bad("sgd.learning_rate must be a positive finite number")
            }
            Self::RandomForest { n_trees: 0, .. } => bad("random_forest.n_trees must be at least 1"),
            Self::RandomForest { max_depth: 0, .. } => {
                bad("random_forest.max_depth must be at least 1")
            }
            Self::RandomForest {
                min_samples_split, ..
            } if min_samples_split < 2 => bad("random_forest.min_samples_split must be at least 2"),
            Self::RandomForest { max_features: 0, .. } => {
                bad("random_forest.max_features must be at least 1")
            }
            _ => Ok(()),
        }
    }

    /// Build an untrained classifier of this family.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the hyperparameters or vectorizer settings are invalid.
    pub fn build(&self, vectorizer: VectorizerConfig) -> Result<Box<dyn Classifier>> {
        self.validate()?;
        vectorizer.validate()?;
        Ok(match *self {
            Self::NaiveBayes { alpha } => Box::new(NaiveBayes::new(alpha, vectorizer)),
            Self::Sgd {
                alpha,
                epochs,
                learning_rate,
                seed,
            } => Box::new(SgdClassifier::new(alpha, epochs, learning_rate, seed, vectorizer)),
            Self::RandomForest {
                n_trees,
                max_depth,
                min_samples_split,
                max_features,
                seed,
            } => Box::new(RandomForest::new(
                n_trees,
                max_depth,
                min_samples_split,
                seed,
                VectorizerConfig {
                    max_features: Some(
                        vectorizer
                            .max_features
                            .map_or(max_features, |m| m.min(max_features)),
                    ),
                    ..vectorizer
                },
            )),
        })
    }
}

/// Check training inputs shared by all families; returns per-class counts.
pub(crate) fn check_training_set(docs: &[&str], labels: &[Sentiment]) -> Result<[usize; 2]> {
    if docs.is_empty() {
        return Err(Error::DataIntegrity(
            "cannot fit a classifier on an empty training set".to_string(),
        ));
    }
    if docs.len() != labels.len() {
        return Err(Error::DataIntegrity(format!(
            "{} documents but {} labels",
            docs.len(),
            labels.len()
        )));
    }
    let mut counts = [0usize; 2];
    for label in labels {
        counts[label.index()] += 1;
    }
    if counts.contains(&0) {
        return Err(Error::ModelFailure(format!(
            "degenerate label distribution (negative={}, positive={}); both classes are required",
            counts[0], counts[1]
        )));
    }
    Ok(counts)
}

pub(crate) fn not_fitted(model: ModelType) -> Error {
    Error::ModelFailure(format!("{model} classifier used before fit"))
}

/// Two-class softmax from joint log-likelihoods, as `[p_negative, p_positive]`.
pub(crate) fn softmax2(log_neg: f64, log_pos: f64) -> Probabilities {
    let max = log_neg.max(log_pos);
    let neg = (log_neg - max).exp();
    let pos = (log_pos - max).exp();
    let total = neg + pos;
    [neg / total, pos / total]
}

/// Enforce the probability contract on classifier output.
///
/// # Errors
///
/// Returns [`Error::ModelFailure`] if the row count differs from `expected_rows`
/// or any row is not a valid two-class distribution.
pub fn check_probabilities(rows: &[Probabilities], expected_rows: usize) -> Result<()> {
    if rows.len() != expected_rows {
        return Err(Error::ModelFailure(format!(
            "predict_proba returned {} rows for {expected_rows} inputs",
            rows.len()
        )));
    }
    for (row_index, row) in rows.iter().enumerate() {
        let valid_entries = row.iter().all(|p| p.is_finite() && (0.0..=1.0).contains(p));
        if !valid_entries || (row[0] + row[1] - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::ModelFailure(format!(
                "malformed probabilities at row {row_index}: {row:?}"
            )));
        }
    }
    Ok(())
}
