//! Labeling oracle
//!
//! The engine obtains ground truth for queried examples only through
//! [`LabelOracle`]. A simulated session answers from labels withheld at
//! partition time; a real deployment plugs in a human-facing interface.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::corpus::{ExampleId, Sentiment};
use crate::{Error, Result};

/// Source of ground-truth labels.
pub trait LabelOracle: Send + Sync {
    /// Return the label for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the oracle has no answer for `id`.
    fn get_label(&self, id: ExampleId) -> Result<Sentiment>;

    /// Label a whole query batch, preserving its order.
    ///
    /// # Errors
    ///
    /// Fails on the first id the oracle cannot answer.
    fn label_batch(&self, ids: &[ExampleId]) -> Result<Vec<(ExampleId, Sentiment)>> {
        ids.iter()
            .map(|id| self.get_label(*id).map(|label| (*id, label)))
            .collect()
    }
}

/// Oracle answering from withheld ground truth.
#[derive(Debug, Default)]
pub struct SimulatedOracle {
    labels: BTreeMap<ExampleId, Sentiment>,
    answered: AtomicUsize,
}

impl SimulatedOracle {
    /// Create an oracle over the withheld labels.
    #[must_use]
    pub fn new(labels: BTreeMap<ExampleId, Sentiment>) -> Self {
        Self {
            labels,
            answered: AtomicUsize::new(0),
        }
    }

    /// Number of labels the oracle knows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when the oracle knows no labels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of successful `get_label` calls so far.
    #[must_use]
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::Relaxed)
    }
}

impl LabelOracle for SimulatedOracle {
    fn get_label(&self, id: ExampleId) -> Result<Sentiment> {
        let label = self
            .labels
            .get(&id)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("no withheld label for example {id}")))?;
        self.answered.fetch_add(1, Ordering::Relaxed);
        Ok(label)
    }
}
