//! Pool - id-keyed set of examples

use std::collections::BTreeMap;

use super::{Example, ExampleId, Sentiment};

/// A set of examples keyed by id.
///
/// Backed by a `BTreeMap` so iteration is always in ascending id order,
/// which keeps training, scoring and persistence reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pool {
    examples: BTreeMap<ExampleId, Example>,
}

impl Pool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from examples. A later example replaces an earlier one with the same id.
    #[must_use]
    pub fn from_examples(examples: impl IntoIterator<Item = Example>) -> Self {
        Self {
            examples: examples.into_iter().map(|e| (e.id, e)).collect(),
        }
    }

    /// Number of examples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// True when the pool holds no examples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: ExampleId) -> bool {
        self.examples.contains_key(&id)
    }

    /// Look up an example.
    #[must_use]
    pub fn get(&self, id: ExampleId) -> Option<&Example> {
        self.examples.get(&id)
    }

    /// Insert an example, returning the one it replaced.
    pub fn insert(&mut self, example: Example) -> Option<Example> {
        self.examples.insert(example.id, example)
    }

    /// Remove an example.
    pub fn remove(&mut self, id: ExampleId) -> Option<Example> {
        self.examples.remove(&id)
    }

    /// Examples in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Example> {
        self.examples.values()
    }

    /// Ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = ExampleId> + '_ {
        self.examples.keys().copied()
    }

    /// Count of examples per label (unlabeled examples are not counted).
    #[must_use]
    pub fn label_distribution(&self) -> BTreeMap<Sentiment, usize> {
        let mut dist = BTreeMap::new();
        for label in self.examples.values().filter_map(|e| e.label) {
            *dist.entry(label).or_insert(0) += 1;
        }
        dist
    }
}

impl FromIterator<Example> for Pool {
    fn from_iter<I: IntoIterator<Item = Example>>(iter: I) -> Self {
        Self::from_examples(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_iterates_in_id_order() {
        let pool = Pool::from_examples([
            Example::unlabeled(9, "c"),
            Example::unlabeled(2, "a"),
            Example::unlabeled(5, "b"),
        ]);
        let ids: Vec<u64> = pool.ids().map(|id| id.0).collect();
        assert_eq!(ids, vec![2, 5, 9]);
    }

    #[test]
    fn test_label_distribution() {
        let pool = Pool::from_examples([
            Example::labeled(1, "a", Sentiment::Positive),
            Example::labeled(2, "b", Sentiment::Positive),
            Example::labeled(3, "c", Sentiment::Negative),
            Example::unlabeled(4, "d"),
        ]);
        let dist = pool.label_distribution();
        assert_eq!(dist.get(&Sentiment::Positive), Some(&2));
        assert_eq!(dist.get(&Sentiment::Negative), Some(&1));
    }
}
