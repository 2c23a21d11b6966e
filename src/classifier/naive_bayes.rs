//! Multinomial Naive Bayes over term counts

use serde::{Deserialize, Serialize};

use super::{
    check_training_set, not_fitted, softmax2, Classifier, ModelArtifact, ModelType, Probabilities,
    Vectorizer, VectorizerConfig,
};
use crate::corpus::Sentiment;
use crate::Result;

/// Multinomial Naive Bayes with additive smoothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayes {
    alpha: f64,
    vectorizer: Vectorizer,
    class_log_prior: [f64; 2],
    feature_log_prob: [Vec<f64>; 2],
    fitted: bool,
}

impl NaiveBayes {
    /// Untrained model.
    #[must_use]
    pub fn new(alpha: f64, vectorizer: VectorizerConfig) -> Self {
        Self {
            alpha,
            vectorizer: Vectorizer::new(vectorizer),
            class_log_prior: [0.0; 2],
            feature_log_prob: [Vec::new(), Vec::new()],
            fitted: false,
        }
    }

    /// Smoothing parameter.
    #[must_use]
    pub const fn alpha(&self) -> f64 {
        self.alpha
    }

    fn joint_log_likelihood(&self, doc: &str) -> [f64; 2] {
        let counts = self.vectorizer.counts(doc);
        let mut jll = self.class_log_prior;
        for (class, log_prob) in self.feature_log_prob.iter().enumerate() {
            jll[class] += counts
                .iter()
                .map(|(index, count)| f64::from(*count) * log_prob[*index as usize])
                .sum::<f64>();
        }
        jll
    }
}

impl Classifier for NaiveBayes {
    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, docs: &[&str], labels: &[Sentiment]) -> Result<()> {
        let class_counts = check_training_set(docs, labels)?;

        self.vectorizer.fit(docs);
        let n_features = self.vectorizer.len();
        let mut feature_counts = [vec![0.0f64; n_features], vec![0.0f64; n_features]];
        for (doc, label) in docs.iter().zip(labels) {
            let row = self.vectorizer.counts(doc);
            let class = &mut feature_counts[label.index()];
            for (index, count) in row {
                class[index as usize] += f64::from(count);
            }
        }

        let total = docs.len() as f64;
        for class in 0..2 {
            self.class_log_prior[class] = (class_counts[class] as f64 / total).ln();
            let smoothed_total: f64 =
                feature_counts[class].iter().sum::<f64>() + self.alpha * n_features as f64;
            self.feature_log_prob[class] = feature_counts[class]
                .iter()
                .map(|count| ((count + self.alpha) / smoothed_total).ln())
                .collect();
        }
        self.fitted = true;
        Ok(())
    }

    fn predict_proba(&self, docs: &[&str]) -> Result<Vec<Probabilities>> {
        if !self.fitted {
            return Err(not_fitted(self.model_type()));
        }
        Ok(docs
            .iter()
            .map(|doc| {
                let jll = self.joint_log_likelihood(doc);
                softmax2(jll[0], jll[1])
            })
            .collect())
    }

    fn model_type(&self) -> ModelType {
        ModelType::NaiveBayes
    }

    fn params(&self) -> serde_json::Value {
        serde_json::json!({
            "alpha": self.alpha,
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
        Ok(ModelArtifact::NaiveBayes(self.clone()))
    }
}
