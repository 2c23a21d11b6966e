//! Uncertainty sampling
//!
//! Picks the `k` unlabeled examples whose predicted class distribution is
//! closest to the decision boundary.
//!
//! **Selection**: min-heap top-k over `(score, id)`, O(N log K) instead of a
//! full sort of the pool.
//!
//! **Order**: descending score, ties broken by ascending id. The result is a
//! pure function of the probability mapping, `k` and the policy.
//!
//! ## Usage
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use active_sentiment::corpus::ExampleId;
//! use active_sentiment::sampler::UncertaintySampler;
//!
//! let mut probs = BTreeMap::new();
//! probs.insert(ExampleId(1), [0.5, 0.5]);
//! probs.insert(ExampleId(2), [0.9, 0.1]);
//!
//! let selection = UncertaintySampler::default().select(&probs, 1).unwrap();
//! assert_eq!(selection.ids(), &[ExampleId(1)]);
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classifier::{check_probabilities, Probabilities};
use crate::corpus::ExampleId;
use crate::{Error, Result};

/// How uncertain a two-class prediction is. Higher is more uncertain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncertaintyPolicy {
    /// `1 - |p_pos - p_neg|`, in [0, 1]
    #[default]
    Margin,
    /// Binary entropy in bits, in [0, 1]
    Entropy,
    /// `1 - max(p)`, in [0, 0.5]
    LeastConfidence,
}

impl UncertaintyPolicy {
    /// Uncertainty score of one probability row.
    #[must_use]
    pub fn score(self, p: Probabilities) -> f64 {
        match self {
            Self::Margin => 1.0 - (p[1] - p[0]).abs(),
            Self::Entropy => {
                -p.iter()
                    .filter(|&&q| q > 0.0)
                    .map(|&q| q * q.log2())
                    .sum::<f64>()
            }
            Self::LeastConfidence => 1.0 - p[0].max(p[1]),
        }
    }

    /// Stable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Margin => "margin",
            Self::Entropy => "entropy",
            Self::LeastConfidence => "least_confidence",
        }
    }
}

impl fmt::Display for UncertaintyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UncertaintyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "margin" => Ok(Self::Margin),
            "entropy" => Ok(Self::Entropy),
            "least_confidence" => Ok(Self::LeastConfidence),
            other => Err(Error::Configuration(format!(
                "unknown uncertainty policy '{other}' (expected margin, entropy or least_confidence)"
            ))),
        }
    }
}

/// Ordered query batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    ids: Vec<ExampleId>,
    scores: Vec<f64>,
    capped: bool,
}

impl Selection {
    /// Selected ids, most uncertain first.
    #[must_use]
    pub fn ids(&self) -> &[ExampleId] {
        &self.ids
    }

    /// Scores aligned with [`Selection::ids`].
    #[must_use]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// True if `k` exceeded the pool and was reduced to its size.
    #[must_use]
    pub const fn capped(&self) -> bool {
        self.capped
    }

    /// Number of selected ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Consume into the id sequence.
    #[must_use]
    pub fn into_ids(self) -> Vec<ExampleId> {
        self.ids
    }
}

// Heap item: greater means "should be queried earlier". Reversed so the
// BinaryHeap top is the weakest of the current top-k.
#[derive(Debug)]
struct MinHeapItem {
    score: f64,
    id: ExampleId,
}

impl MinHeapItem {
    fn rank(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialEq for MinHeapItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MinHeapItem {}

impl Ord for MinHeapItem {
    fn cmp(&self, other: &Self) -> Ordering {
        other.rank(self)
    }
}

impl PartialOrd for MinHeapItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Selects query batches under one [`UncertaintyPolicy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UncertaintySampler {
    policy: UncertaintyPolicy,
}

impl UncertaintySampler {
    /// Sampler with the given policy.
    #[must_use]
    pub const fn new(policy: UncertaintyPolicy) -> Self {
        Self { policy }
    }

    /// Active policy.
    #[must_use]
    pub const fn policy(&self) -> UncertaintyPolicy {
        self.policy
    }

    /// Select the `k` most uncertain ids.
    ///
    /// `k` larger than the mapping is capped to its size and logged.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `k` is zero
    /// - [`Error::ModelFailure`] if any probability row is malformed
    pub fn select(
        &self,
        probabilities: &BTreeMap<ExampleId, Probabilities>,
        k: usize,
    ) -> Result<Selection> {
        if k == 0 {
            return Err(Error::Configuration(
                "batch size k must be greater than 0".to_string(),
            ));
        }
        let rows: Vec<Probabilities> = probabilities.values().copied().collect();
        check_probabilities(&rows, probabilities.len())?;

        let capped = k > probabilities.len();
        let k = if capped {
            warn!(
                requested = k,
                pool_size = probabilities.len(),
                "batch size exceeds unlabeled pool, capping"
            );
            probabilities.len()
        } else {
            k
        };

        let mut heap: BinaryHeap<MinHeapItem> = BinaryHeap::with_capacity(k + 1);
        for (&id, &p) in probabilities {
            let item = MinHeapItem {
                score: self.policy.score(p),
                id,
            };
            if heap.len() < k {
                heap.push(item);
            } else if let Some(weakest) = heap.peek() {
                if item.rank(weakest) == Ordering::Greater {
                    heap.pop();
                    heap.push(item);
                }
            }
        }

        // Ascending by the reversed Ord is descending by rank.
        let ranked = heap.into_sorted_vec();
        debug!(
            policy = %self.policy,
            selected = ranked.len(),
            top_score = ranked.first().map(|item| item.score),
            "uncertainty selection complete"
        );
        let (ids, scores) = ranked.into_iter().map(|item| (item.id, item.score)).unzip();
        Ok(Selection {
            ids,
            scores,
            capped,
        })
    }
}
