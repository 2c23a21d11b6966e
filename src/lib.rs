//! # active-sentiment: Uncertainty-Sampling Active Learning
//!
//! Simulates an active-learning workflow for binary review sentiment: most
//! labels of a corpus are withheld, and the model repeatedly asks for the
//! labels of the reviews it is least sure about.
//!
//! ## Pipeline
//!
//! ```text
//! Partitioner → {Training, Validation, Unlabeled}
//!                          │
//!              ActiveLearningEngine ⇄ TextNormalizer / Classifier / UncertaintySampler
//!                          │
//!                  ExperimentTracker (runs, metrics, model artifacts)
//! ```
//!
//! - **Validation is static**: every run is compared on the same held-out set
//! - **Training only grows** through labeled query batches
//! - **Runs are immutable**: a new training round produces a new record
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use active_sentiment::corpus::read_partition;
//! use active_sentiment::engine::{ActiveLearningEngine, SessionConfig};
//! use active_sentiment::experiment::ExperimentTracker;
//! use active_sentiment::metrics::Metric;
//!
//! let (corpus, oracle) = read_partition("data/imdb")?.into_parts();
//! let config = SessionConfig::from_json_file("session.json")?;
//! let tracker = Arc::new(ExperimentTracker::open("mlruns")?);
//!
//! let mut engine = ActiveLearningEngine::new(config, corpus, Arc::new(oracle), tracker.clone())?;
//! let report = engine.run()?;
//! println!("stopped: {}", report.stop_reason);
//!
//! let best = tracker.best_run(&engine.config().experiment_id, Metric::Accuracy)?;
//! # Ok::<(), active_sentiment::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod classifier;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod normalize;
pub mod oracle;
pub mod sampler;
pub mod sweep;

pub use classifier::{Classifier, ModelSpec, ModelType};
pub use corpus::{Corpus, Example, ExampleId, Sentiment};
pub use engine::{ActiveLearningEngine, SessionConfig, StopReason};
pub use error::{Error, Result};
pub use experiment::ExperimentTracker;
pub use normalize::{NormalizerMode, TextNormalizer};
pub use oracle::{LabelOracle, SimulatedOracle};
pub use sampler::{UncertaintyPolicy, UncertaintySampler};
pub use sweep::Sweep;
