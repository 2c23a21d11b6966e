//! Bagged Gini decision trees over binary term-presence features

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{
    check_training_set, not_fitted, Classifier, ModelArtifact, ModelType, Probabilities,
    Vectorizer, VectorizerConfig,
};
use crate::corpus::Sentiment;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    /// `absent` is taken when the feature does not occur in the document
    Split {
        feature: u32,
        absent: usize,
        present: usize,
    },
    Leaf {
        p_positive: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn p_positive(&self, features: &[u32]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { p_positive } => return *p_positive,
                Node::Split {
                    feature,
                    absent,
                    present,
                } => {
                    at = if features.binary_search(feature).is_ok() {
                        *present
                    } else {
                        *absent
                    };
                }
            }
        }
    }
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<u32>],
    positive: &'a [bool],
    n_features: usize,
    features_per_split: usize,
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<Node>,
}

#[allow(clippy::cast_precision_loss)]
fn gini(positive: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positive as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

impl TreeBuilder<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn leaf(&mut self, samples: &[usize]) -> usize {
        let positives = samples.iter().filter(|&&i| self.positive[i]).count();
        self.nodes.push(Node::Leaf {
            p_positive: positives as f64 / samples.len().max(1) as f64,
        });
        self.nodes.len() - 1
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn best_split(&self, samples: &[usize], rng: &mut StdRng) -> Option<u32> {
        let candidates = sample(rng, self.n_features, self.features_per_split);
        let mut tally: FxHashMap<u32, (usize, usize)> = candidates
            .iter()
            .map(|f| (f as u32, (0usize, 0usize)))
            .collect();
        for &i in samples {
            for feature in &self.rows[i] {
                if let Some((present, present_pos)) = tally.get_mut(feature) {
                    *present += 1;
                    if self.positive[i] {
                        *present_pos += 1;
                    }
                }
            }
        }

        let total = samples.len();
        let total_pos = samples.iter().filter(|&&i| self.positive[i]).count();
        let parent = gini(total_pos, total);

        let mut best: Option<(f64, u32)> = None;
        let mut ordered: Vec<(u32, (usize, usize))> = tally.into_iter().collect();
        ordered.sort_unstable_by_key(|(feature, _)| *feature);
        for (feature, (present, present_pos)) in ordered {
            if present == 0 || present == total {
                continue;
            }
            let absent = total - present;
            let absent_pos = total_pos - present_pos;
            let weighted = (present as f64 * gini(present_pos, present)
                + absent as f64 * gini(absent_pos, absent))
                / total as f64;
            let gain = parent - weighted;
            if gain > 1e-12 && best.map_or(true, |(g, _)| gain > g) {
                best = Some((gain, feature));
            }
        }
        best.map(|(_, feature)| feature)
    }

    fn grow(&mut self, samples: &[usize], depth: usize, rng: &mut StdRng) -> usize {
        let positives = samples.iter().filter(|&&i| self.positive[i]).count();
        let pure = positives == 0 || positives == samples.len();
        if pure || depth >= self.max_depth || samples.len() < self.min_samples_split {
            return self.leaf(samples);
        }
        let Some(feature) = self.best_split(samples, rng) else {
            return self.leaf(samples);
        };

        let (present, absent): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .copied()
            .partition(|&i| self.rows[i].binary_search(&feature).is_ok());

        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { p_positive: 0.0 });
        let absent_child = self.grow(&absent, depth + 1, rng);
        let present_child = self.grow(&present, depth + 1, rng);
        self.nodes[index] = Node::Split {
            feature,
            absent: absent_child,
            present: present_child,
        };
        index
    }
}

/// Random forest: bootstrap-sampled trees, `sqrt(n_features)` candidates per split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    min_samples_split: usize,
    seed: u64,
    vectorizer: Vectorizer,
    trees: Vec<Tree>,
    fitted: bool,
}

impl RandomForest {
    /// Untrained forest.
    #[must_use]
    pub fn new(
        n_trees: usize,
        max_depth: usize,
        min_samples_split: usize,
        seed: u64,
        vectorizer: VectorizerConfig,
    ) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split,
            seed,
            vectorizer: Vectorizer::new(vectorizer),
            trees: Vec::new(),
            fitted: false,
        }
    }

    /// Number of trained trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn fit(&mut self, docs: &[&str], labels: &[Sentiment]) -> Result<()> {
        check_training_set(docs, labels)?;

        self.vectorizer.fit(docs);
        let rows: Vec<Vec<u32>> = docs.iter().map(|d| self.vectorizer.presence(d)).collect();
        let positive: Vec<bool> = labels.iter().map(|l| *l == Sentiment::Positive).collect();
        let n_features = self.vectorizer.len();
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees = Vec::with_capacity(self.n_trees);
        for _ in 0..self.n_trees {
            let bootstrap: Vec<usize> = (0..rows.len())
                .map(|_| rng.gen_range(0..rows.len()))
                .collect();
            let mut builder = TreeBuilder {
                rows: &rows,
                positive: &positive,
                n_features,
                features_per_split: ((n_features as f64).sqrt().ceil() as usize)
                    .clamp(1, n_features.max(1)),
                max_depth: self.max_depth,
                min_samples_split: self.min_samples_split,
                nodes: Vec::new(),
            };
            if n_features == 0 {
                builder.leaf(&bootstrap);
            } else {
                builder.grow(&bootstrap, 0, &mut rng);
            }
            self.trees.push(Tree {
                nodes: builder.nodes,
            });
        }
        self.fitted = true;
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_proba(&self, docs: &[&str]) -> Result<Vec<Probabilities>> {
        if !self.fitted {
            return Err(not_fitted(self.model_type()));
        }
        let n_trees = self.trees.len() as f64;
        Ok(docs
            .iter()
            .map(|doc| {
                let features = self.vectorizer.presence(doc);
                let p = self.trees.iter().map(|t| t.p_positive(&features)).sum::<f64>() / n_trees;
                let p = p.clamp(0.0, 1.0);
                [1.0 - p, p]
            })
            .collect())
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "n_trees": self.n_trees,
            "max_depth": self.max_depth,
            "min_samples_split": self.min_samples_split,
            "seed": self.seed,
            "vectorizer": self.vectorizer.config(),
        })
    }

    fn is_fitted(&self) -> bool {
        self.fitted
    }

    fn to_artifact(&self) -> Result<ModelArtifact> {
        if !self.fitted {
            return Err(not_fitted(self.model_type()));
        }
        Ok(ModelArtifact::RandomForest(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forest_learns_separable_data() {
        let mut docs = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            if i % 2 == 0 {
                docs.push("great wonderful fun");
                labels.push(Sentiment::Positive);
            } else {
                docs.push("awful boring mess");
                labels.push(Sentiment::Negative);
            }
        }
        let mut forest = RandomForest::new(15, 4, 2, 3, VectorizerConfig::default());
        forest.fit(&docs, &labels).unwrap();
        assert_eq!(forest.tree_count(), 15);
        let p = forest.predict_proba(&["great fun", "boring mess"]).unwrap();
        assert!(p[0][1] > 0.5, "{p:?}");
        assert!(p[1][1] < 0.5, "{p:?}");
        for row in &p {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_gini() {
        assert!(gini(0, 10).abs() < 1e-12);
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
    }
}
