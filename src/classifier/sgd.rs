//! Logistic regression trained with stochastic gradient descent

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{
    check_training_set, not_fitted, Classifier, ModelArtifact, ModelType, Probabilities,
    SparseVector, Vectorizer, VectorizerConfig,
};
use crate::corpus::Sentiment;
use crate::Result;

/// Below this the lazy weight scale is folded back into the weights.
const MIN_WEIGHT_SCALE: f64 = 1e-9;

/// Logistic-loss linear model over TF-IDF features with L2 regularization.
///
/// L2 decay is applied through a scalar `w = scale * v` so each update
/// touches only the non-zero features of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SgdClassifier {
    alpha: f64,
    epochs: usize,
    learning_rate: f64,
    seed: u64,
    vectorizer: Vectorizer,
    weights: Vec<f64>,
    bias: f64,
    fitted: bool,
}

impl SgdClassifier {
    /// Untrained model.
    #[must_use]
    pub fn new(
        alpha: f64,
        epochs: usize,
        learning_rate: f64,
        seed: u64,
        vectorizer: VectorizerConfig,
    ) -> Self {
        Self {
            alpha,
            epochs,
            learning_rate,
            seed,
            vectorizer: Vectorizer::new(vectorizer),
            weights: Vec::new(),
            bias: 0.0,
            fitted: false,
        }
    }

    fn decision(&self, row: &SparseVector) -> f64 {
        row.iter()
            .map(|(index, value)| self.weights[*index as usize] * f64::from(*value))
            .sum::<f64>()
            + self.bias
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl Classifier for SgdClassifier {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, docs: &[&str], labels: &[Sentiment]) -> Result<()> {
        check_training_set(docs, labels)?;

        self.vectorizer.fit(docs);
        let rows: Vec<SparseVector> = docs
            .iter()
            .map(|d| self.vectorizer.tfidf(d))
            .collect::<Result<_>>()?;
        let targets: Vec<f64> = labels
            .iter()
            .map(|l| if *l == Sentiment::Positive { 1.0 } else { 0.0 })
            .collect();

        let mut v = vec![0.0f64; self.vectorizer.len()];
        let mut scale = 1.0f64;
        let mut bias = 0.0f64;
        let mut order: Vec<usize> = (0..rows.len()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut step = 0usize;

        for _ in 0..self.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let eta = self.learning_rate / (1.0 + self.learning_rate * self.alpha * step as f64);
                step += 1;

                let row = &rows[i];
                let z = scale
                    * row
                        .iter()
                        .map(|(index, value)| v[*index as usize] * f64::from(*value))
                        .sum::<f64>()
                    + bias;
                let gradient = sigmoid(z) - targets[i];

                scale *= 1.0 - eta * self.alpha;
                if scale < MIN_WEIGHT_SCALE {
                    for w in &mut v {
                        *w *= scale;
                    }
                    scale = 1.0;
                }
                for (index, value) in row {
                    v[*index as usize] -= eta * gradient * f64::from(*value) / scale;
                }
                bias -= eta * gradient;
            }
        }

        self.weights = v.into_iter().map(|w| w * scale).collect();
        self.bias = bias;
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, docs: &[&str]) -> Result<Vec<Probabilities>> {
        if !self.fitted {
            return Err(not_fitted(self.model_type()));
        }
        docs.iter()
            .map(|doc| {
                let p = sigmoid(self.decision(&self.vectorizer.tfidf(doc)?));
                Ok([1.0 - p, p])
            })
            .collect()
    }

    fn model_type(&self) -> ModelType {
        ModelType::Sgd
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "alpha": self.alpha,
            "epochs": self.epochs,
            "learning_rate": self.learning_rate,
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
        Ok(ModelArtifact::Sgd(self.clone()))
    }
}
