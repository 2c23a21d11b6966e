//! Session configuration
//!
//! A session is fully described by one [`SessionConfig`] value: no
//! process-wide settings. Configs load from JSON and every field has a default.
//!
//! ```rust
//! use active_sentiment::engine::SessionConfig;
//! use active_sentiment::normalize::NormalizerMode;
//!
//! let config = SessionConfig::from_json_str(
//!     r#"{ "experiment_id": "imdb", "batch_size": 50,
//!          "normalizer": { "mode": "lemmatize" },
//!          "model": { "family": "sgd", "epochs": 3 } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.batch_size, 50);
//! assert_eq!(config.normalizer.mode, NormalizerMode::Lemmatize);
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::classifier::{ModelSpec, VectorizerConfig};
use crate::normalize::{NormalizerConfig, NormalizerMode};
use crate::sampler::UncertaintyPolicy;
use crate::{Error, Result};

/// Default query batch size.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Optional early-stopping thresholds, checked after each TrainEval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StoppingCriteria {
    /// Stop once validation accuracy reaches this value
    #[serde(default)]
    pub target_accuracy: Option<f64>,
    /// Stop once accuracy improves by less than this over the previous run
    #[serde(default)]
    pub min_improvement: Option<f64>,
}

/// Everything an active-learning session needs besides its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Experiment every run is logged under
    pub experiment_id: String,
    /// Query batch size `k`, constant for the session
    pub batch_size: usize,
    /// Upper bound on completed iterations
    pub max_iterations: usize,
    /// Early stopping
    pub stopping: StoppingCriteria,
    /// Text normalization
    pub normalizer: NormalizerConfig,
    /// Model family and hyperparameters
    pub model: ModelSpec,
    /// Feature extraction
    pub vectorizer: VectorizerConfig,
    /// Uncertainty score used for selection
    pub uncertainty: UncertaintyPolicy,
    /// Seed recorded with every run
    pub seed: u64,
    /// Extra tags attached to every run
    pub tags: BTreeMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            experiment_id: "active-learning".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stopping: StoppingCriteria::default(),
            normalizer: NormalizerConfig::default(),
            model: ModelSpec::default(),
            vectorizer: VectorizerConfig::default(),
            uncertainty: UncertaintyPolicy::default(),
            seed: 42,
            tags: BTreeMap::new(),
        }
    }
}

fn check_unit_interval(name: &str, value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !(0.0..=1.0).contains(&v) => Err(Error::Configuration(format!(
            "{name} must be within [0, 1], got {v}"
        ))),
        _ => Ok(()),
    }
}

impl SessionConfig {
    /// Create a config builder starting from the defaults.
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.experiment_id.trim().is_empty() {
            return Err(Error::Configuration(
                "experiment_id must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(Error::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        check_unit_interval("stopping.target_accuracy", self.stopping.target_accuracy)?;
        check_unit_interval("stopping.min_improvement", self.stopping.min_improvement)?;
        self.model.validate()?;
        self.vectorizer.validate()
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for malformed JSON, unknown enum values
    /// or invalid fields.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Configuration(format!("invalid session config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, otherwise as
    /// [`SessionConfig::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Pretty JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for `SessionConfig`.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Experiment id.
    #[must_use]
    pub fn experiment_id(mut self, experiment_id: impl Into<String>) -> Self {
        self.config.experiment_id = experiment_id.into();
        self
    }

    /// Query batch size `k`.
    #[must_use]
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Stop at this validation accuracy.
    #[must_use]
    pub const fn target_accuracy(mut self, accuracy: f64) -> Self {
        self.config.stopping.target_accuracy = Some(accuracy);
        self
    }

    /// Stop when accuracy gains fall below this.
    #[must_use]
    pub const fn min_improvement(mut self, delta: f64) -> Self {
        self.config.stopping.min_improvement = Some(delta);
        self
    }

    /// Normalizer settings.
    #[must_use]
    pub const fn normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.config.normalizer = normalizer;
        self
    }

    /// Normalizer mode, keeping the other normalizer settings.
    #[must_use]
    pub const fn normalizer_mode(mut self, mode: NormalizerMode) -> Self {
        self.config.normalizer.mode = mode;
        self
    }

    /// Model family and hyperparameters.
    #[must_use]
    pub const fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = model;
        self
    }

    /// Vectorizer settings.
    #[must_use]
    pub const fn vectorizer(mut self, vectorizer: VectorizerConfig) -> Self {
        self.config.vectorizer = vectorizer;
        self
    }

    /// Uncertainty policy.
    #[must_use]
    pub const fn uncertainty(mut self, policy: UncertaintyPolicy) -> Self {
        self.config.uncertainty = policy;
        self
    }

    /// Seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Tag every run.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.tags.insert(key.into(), value.into());
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// See [`SessionConfig::validate`].
    pub fn build(self) -> Result<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
