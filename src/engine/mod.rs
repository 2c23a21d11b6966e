//! Active Learning Engine
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use active_sentiment::corpus::{Example, Partitioner, Sentiment};
//! use active_sentiment::engine::{ActiveLearningEngine, SessionConfig};
//! use active_sentiment::experiment::ExperimentTracker;
//!
//! let examples: Vec<Example> = (0..40u64)
//!     .map(|id| {
//!         if id % 2 == 0 {
//!             Example::labeled(id, "a wonderful, touching film", Sentiment::Positive)
//!         } else {
//!             Example::labeled(id, "a dull and boring mess", Sentiment::Negative)
//!         }
//!     })
//!     .collect();
//! let (corpus, oracle) = Partitioner::new(10, 10, 7).partition(examples).unwrap().into_parts();
//!
//! let config = SessionConfig::builder().batch_size(5).max_iterations(2).build().unwrap();
//! let tracker = Arc::new(ExperimentTracker::in_memory());
//! let mut engine =
//!     ActiveLearningEngine::new(config, corpus, Arc::new(oracle), tracker.clone()).unwrap();
//!
//! let report = engine.run().unwrap();
//! assert_eq!(report.iterations.len(), 2);
//! assert_eq!(engine.corpus().training().len(), 20);
//! assert_eq!(tracker.run_count(), 2);
//! ```

mod config;
mod session;

pub use config::{
    SessionConfig, SessionConfigBuilder, StoppingCriteria, DEFAULT_BATCH_SIZE,
    DEFAULT_MAX_ITERATIONS,
};
pub use session::{ActiveLearningEngine, IterationReport, Phase, SessionReport, StopReason};
