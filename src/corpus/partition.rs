//! Partitioner - split a fully labeled corpus into the three session pools

use std::collections::{BTreeMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use super::{Corpus, Example, ExampleId, Pool, Sentiment};
use crate::oracle::SimulatedOracle;
use crate::{Error, Result};

/// Default size of the initial training pool.
pub const DEFAULT_TRAIN_SIZE: usize = 5_000;

/// Default size of the validation pool.
pub const DEFAULT_VALIDATION_SIZE: usize = 2_000;

/// Seeded splitter of a labeled corpus.
///
/// Rows are shuffled once with the seed; the first `train_size` become the
/// initial training pool, the next `validation_size` the validation pool and
/// everything else the unlabeled pool, whose labels are withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partitioner {
    train_size: usize,
    validation_size: usize,
    seed: u64,
}

impl Default for Partitioner {
    fn default() -> Self {
        Self::new(DEFAULT_TRAIN_SIZE, DEFAULT_VALIDATION_SIZE, 42)
    }
}

/// Output of [`Partitioner::partition`].
#[derive(Debug, Clone)]
pub struct Partition {
    /// The three pools; unlabeled examples carry no label
    pub corpus: Corpus,
    /// Ground truth removed from the unlabeled pool
    pub withheld: BTreeMap<ExampleId, Sentiment>,
}

impl Partition {
    /// Split into the corpus and an oracle answering from the withheld labels.
    #[must_use]
    pub fn into_parts(self) -> (Corpus, SimulatedOracle) {
        (self.corpus, SimulatedOracle::new(self.withheld))
    }
}

impl Partitioner {
    /// Create a partitioner.
    #[must_use]
    pub const fn new(train_size: usize, validation_size: usize, seed: u64) -> Self {
        Self {
            train_size,
            validation_size,
            seed,
        }
    }

    /// Partition `examples`, all of which must be labeled and uniquely identified.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if either labeled pool size is zero or the requested pool
    ///   sizes exceed the corpus
    /// - [`Error::DataIntegrity`] on duplicate ids or unlabeled rows
    pub fn partition(&self, mut examples: Vec<Example>) -> Result<Partition> {
        if self.train_size == 0 {
            return Err(Error::Configuration(
                "train_size must be greater than 0".to_string(),
            ));
        }
        if self.validation_size == 0 {
            return Err(Error::Configuration(
                "validation_size must be greater than 0".to_string(),
            ));
        }
        let requested = self.train_size + self.validation_size;
        if requested > examples.len() {
            return Err(Error::Configuration(format!(
                "requested {requested} labeled rows (train {} + validation {}) but corpus has {}",
                self.train_size,
                self.validation_size,
                examples.len()
            )));
        }

        let mut seen = HashSet::with_capacity(examples.len());
        for example in &examples {
            if !seen.insert(example.id) {
                return Err(Error::DataIntegrity(format!(
                    "duplicate example id {} in source corpus",
                    example.id
                )));
            }
            if example.label.is_none() {
                return Err(Error::DataIntegrity(format!(
                    "example {} in source corpus has no label",
                    example.id
                )));
            }
        }

        // Sort first so the shuffle depends only on the seed, not input order
        examples.sort_by_key(|e| e.id);
        let mut rng = StdRng::seed_from_u64(self.seed);
        examples.shuffle(&mut rng);

        let mut rest = examples.split_off(self.train_size);
        let training: Pool = examples.into_iter().collect();
        let unlabeled_rows = rest.split_off(self.validation_size);
        let validation: Pool = rest.into_iter().collect();

        let mut withheld = BTreeMap::new();
        let unlabeled: Pool = unlabeled_rows
            .into_iter()
            .map(|mut example| {
                if let Some(label) = example.label.take() {
                    withheld.insert(example.id, label);
                }
                example
            })
            .collect();

        info!(
            training = training.len(),
            validation = validation.len(),
            unlabeled = unlabeled.len(),
            seed = self.seed,
            "partitioned corpus"
        );

        Ok(Partition {
            corpus: Corpus::new(training, validation, unlabeled)?,
            withheld,
        })
    }
}
