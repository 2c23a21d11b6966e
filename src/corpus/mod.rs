//! Corpus data model
//!
//! A labeled corpus is split into three disjoint pools:
//!
//! ```text
//! Corpus ──┬── training    (labeled, grows only via transfer())
//!          ├── validation  (labeled, never mutated)
//!          └── unlabeled   (labels withheld, shrinks via transfer())
//! ```
//!
//! Every [`ExampleId`] lives in exactly one pool at any time. A label is
//! present iff the example is not in the unlabeled pool.

mod partition;
mod pool;
mod storage;

pub use partition::{Partition, Partitioner};
pub use pool::Pool;
pub use storage::{read_partition, read_pool, write_partition, write_pool};

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Binary sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    /// Negative review (class index 0)
    Negative,
    /// Positive review (class index 1)
    Positive,
}

impl Sentiment {
    /// Both classes in class-index order.
    pub const ALL: [Self; 2] = [Self::Negative, Self::Positive];

    /// Column index of this class in a probability row.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }

    /// Class for a probability-row column index (anything non-zero is positive).
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        if index == 0 {
            Self::Negative
        } else {
            Self::Positive
        }
    }

    /// Lowercase name as stored in the `sentiment` column.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Positive => "positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Self::Positive),
            "negative" => Ok(Self::Negative),
            other => Err(Error::DataIntegrity(format!(
                "unknown sentiment label '{other}' (expected 'positive' or 'negative')"
            ))),
        }
    }
}

/// Stable example identifier carried from the source corpus row position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExampleId(pub u64);

impl fmt::Display for ExampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ExampleId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A single review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Unique id across all pools
    pub id: ExampleId,
    /// Raw review text
    pub text: String,
    /// Ground truth, absent while the example sits in the unlabeled pool
    pub label: Option<Sentiment>,
}

impl Example {
    /// Create a labeled example.
    #[must_use]
    pub fn labeled(id: impl Into<ExampleId>, text: impl Into<String>, label: Sentiment) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            label: Some(label),
        }
    }

    /// Create an unlabeled example.
    #[must_use]
    pub fn unlabeled(id: impl Into<ExampleId>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            label: None,
        }
    }
}

/// The three pools of an active-learning session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    training: Pool,
    validation: Pool,
    unlabeled: Pool,
}

impl Corpus {
    /// Assemble a corpus from its pools and check every invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if an id appears in more than one pool,
    /// a labeled pool holds an unlabeled example (or vice versa), or the
    /// training or validation pool is empty.
    pub fn new(training: Pool, validation: Pool, unlabeled: Pool) -> Result<Self> {
        let corpus = Self {
            training,
            validation,
            unlabeled,
        };
        corpus.validate()?;
        Ok(corpus)
    }

    /// Training pool.
    #[must_use]
    pub const fn training(&self) -> &Pool {
        &self.training
    }

    /// Validation pool.
    #[must_use]
    pub const fn validation(&self) -> &Pool {
        &self.validation
    }

    /// Unlabeled pool.
    #[must_use]
    pub const fn unlabeled(&self) -> &Pool {
        &self.unlabeled
    }

    /// Total number of examples across all pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.training.len() + self.validation.len() + self.unlabeled.len()
    }

    /// True when all pools are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check pool disjointness and label placement.
    ///
    /// # Errors
    ///
    /// See [`Corpus::new`].
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<ExampleId> = HashSet::with_capacity(self.len());
        let pools = [
            ("training", &self.training, true),
            ("validation", &self.validation, true),
            ("unlabeled", &self.unlabeled, false),
        ];

        for (name, pool, labeled) in pools {
            for example in pool.iter() {
                if !seen.insert(example.id) {
                    return Err(Error::DataIntegrity(format!(
                        "example {} appears in more than one pool (found again in {name})",
                        example.id
                    )));
                }
                if labeled && example.label.is_none() {
                    return Err(Error::DataIntegrity(format!(
                        "example {} in {name} pool has no label",
                        example.id
                    )));
                }
                if !labeled && example.label.is_some() {
                    return Err(Error::DataIntegrity(format!(
                        "example {} in unlabeled pool carries a label",
                        example.id
                    )));
                }
            }
        }

        if self.training.is_empty() {
            return Err(Error::DataIntegrity(
                "training pool is empty; at least one labeled example is required".to_string(),
            ));
        }
        if self.validation.is_empty() {
            return Err(Error::DataIntegrity(
                "validation pool is empty; runs cannot be scored without held-out labels"
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Move newly labeled examples from the unlabeled pool to training.
    ///
    /// This is the only mutation path for the training pool. The batch is
    /// checked in full before anything moves, so a rejected batch leaves the
    /// corpus untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if an id is not in the unlabeled pool
    /// or appears twice in the batch.
    pub fn transfer(&mut self, labeled: &[(ExampleId, Sentiment)]) -> Result<usize> {
        let mut batch_ids = HashSet::with_capacity(labeled.len());
        for (id, _) in labeled {
            if !batch_ids.insert(*id) {
                return Err(Error::DataIntegrity(format!(
                    "example {id} queried twice in one batch"
                )));
            }
            if !self.unlabeled.contains(*id) {
                return Err(Error::DataIntegrity(format!(
                    "example {id} is not in the unlabeled pool"
                )));
            }
        }

        for (id, label) in labeled {
            if let Some(mut example) = self.unlabeled.remove(*id) {
                example.label = Some(*label);
                self.training.insert(example);
            }
        }

        Ok(labeled.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_corpus() -> Corpus {
        let training = Pool::from_examples([
            Example::labeled(1, "great film", Sentiment::Positive),
            Example::labeled(2, "awful plot", Sentiment::Negative),
        ]);
        let validation = Pool::from_examples([Example::labeled(3, "fine", Sentiment::Positive)]);
        let unlabeled = Pool::from_examples([
            Example::unlabeled(4, "boring"),
            Example::unlabeled(5, "lovely"),
        ]);
        Corpus::new(training, validation, unlabeled).unwrap()
    }

    #[test]
    fn test_sentiment_parse_and_index() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" negative ".parse::<Sentiment>().unwrap(), Sentiment::Negative);
        assert!("neutral".parse::<Sentiment>().is_err());
        assert_eq!(Sentiment::from_index(Sentiment::Positive.index()), Sentiment::Positive);
    }

    fn one_validation_row() -> Pool {
        Pool::from_examples([Example::labeled(9, "fine", Sentiment::Negative)])
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let training = Pool::from_examples([Example::labeled(1, "a", Sentiment::Positive)]);
        let unlabeled = Pool::from_examples([Example::unlabeled(1, "a")]);
        let err = Corpus::new(training, one_validation_row(), unlabeled).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_label_in_unlabeled_pool_rejected() {
        let training = Pool::from_examples([Example::labeled(1, "a", Sentiment::Positive)]);
        let unlabeled = Pool::from_examples([Example::labeled(2, "b", Sentiment::Negative)]);
        let err = Corpus::new(training, one_validation_row(), unlabeled).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_empty_training_rejected() {
        let unlabeled = Pool::from_examples([Example::unlabeled(2, "b")]);
        assert!(Corpus::new(Pool::new(), one_validation_row(), unlabeled).is_err());
    }

    #[test]
    fn test_empty_validation_rejected() {
        let training = Pool::from_examples([
            Example::labeled(1, "a", Sentiment::Positive),
            Example::labeled(2, "b", Sentiment::Negative),
        ]);
        let unlabeled = Pool::from_examples([Example::unlabeled(3, "c")]);
        let err = Corpus::new(training, Pool::new(), unlabeled).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(msg) if msg.contains("validation")));
    }

    #[test]
    fn test_transfer_moves_exclusively() {
        let mut corpus = small_corpus();
        let moved = corpus.transfer(&[(ExampleId(4), Sentiment::Negative)]).unwrap();
        assert_eq!(moved, 1);
        assert_eq!(corpus.training().len(), 3);
        assert_eq!(corpus.unlabeled().len(), 1);
        assert!(!corpus.unlabeled().contains(ExampleId(4)));
        assert_eq!(
            corpus.training().get(ExampleId(4)).and_then(|e| e.label),
            Some(Sentiment::Negative)
        );
        corpus.validate().unwrap();
    }

    #[test]
    fn test_transfer_rejects_whole_batch_on_unknown_id() {
        let mut corpus = small_corpus();
        let before = corpus.clone();
        let err = corpus
            .transfer(&[(ExampleId(5), Sentiment::Positive), (ExampleId(3), Sentiment::Positive)])
            .unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
        assert_eq!(corpus, before);
    }
}
