//! Experiment tracking for active-learning runs
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< MetricRecord (N) [learning curve, step = iteration]
//!                              └──  ArtifactRecord (0..1) [xxh3-hashed model]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use active_sentiment::classifier::{Classifier, NaiveBayes, VectorizerConfig};
//! use active_sentiment::corpus::Sentiment;
//! use active_sentiment::experiment::{ExperimentTracker, OrderBy, RunDraft, RunFilter};
//! use active_sentiment::metrics::Metric;
//!
//! let mut model = NaiveBayes::new(1.0, VectorizerConfig::default());
//! model
//!     .fit(&["fun", "dull"], &[Sentiment::Positive, Sentiment::Negative])
//!     .unwrap();
//!
//! let tracker = ExperimentTracker::in_memory();
//! let run = tracker
//!     .log_run(RunDraft::new("exp-001").metric(Metric::Accuracy, 0.8), &model)
//!     .unwrap();
//!
//! let best = tracker.search(&RunFilter::all(), OrderBy::desc(Metric::Accuracy), 1);
//! assert_eq!(best, vec![run.run_id().to_string()]);
//! let reloaded = tracker.load_model(run.run_id()).unwrap();
//! assert!(reloaded.is_fitted());
//! ```

mod artifact_record;
mod artifact_store;
mod experiment_record;
mod metric_record;
mod query;
mod run_record;
mod tracker;

pub use artifact_record::{content_hash, ArtifactRecord};
#[cfg(feature = "compression")]
pub use artifact_store::{ArtifactCodec, CompressedArtifactStore};
pub use artifact_store::{ArtifactStore, FileArtifactStore, MemoryArtifactStore};
pub use experiment_record::ExperimentRecord;
pub use metric_record::MetricRecord;
pub use query::{OrderBy, OrderDirection, RunFilter, RunSummary};
pub use run_record::{RunDraft, RunRecord, RunStatus, TAG_ITERATION, TAG_MODEL_TYPE};
pub use tracker::ExperimentTracker;
