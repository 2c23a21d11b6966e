//! Validation metrics for binary sentiment classification
//!
//! Positive is the positive class for precision, recall and F1.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::Probabilities;
use crate::corpus::Sentiment;
use crate::{Error, Result};

/// Probabilities are clipped to `[EPS, 1 - EPS]` before taking logs.
const LOG_LOSS_EPS: f64 = 1e-15;

/// Metrics recorded for every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// (TP + TN) / total
    Accuracy,
    /// TP / (TP + FP)
    Precision,
    /// TP / (TP + FN)
    Recall,
    /// Harmonic mean of precision and recall
    F1,
    /// Mean negative log-likelihood of the true class
    LogLoss,
}

impl Metric {
    /// Every metric, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::Accuracy,
        Self::Precision,
        Self::Recall,
        Self::F1,
        Self::LogLoss,
    ];

    /// Stable name used as the metric key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1 => "f1",
            Self::LogLoss => "log_loss",
        }
    }

    /// Whether larger values are better.
    #[must_use]
    pub const fn higher_is_better(self) -> bool {
        !matches!(self, Self::LogLoss)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| Error::Configuration(format!("unknown metric '{s}'")))
    }
}

/// Confusion matrix with Positive as the positive class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Positive predicted positive
    pub tp: usize,
    /// Negative predicted negative
    pub tn: usize,
    /// Negative predicted positive
    pub fp: usize,
    /// Positive predicted negative
    pub fn_: usize,
}

impl ConfusionMatrix {
    /// Tally predictions against ground truth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFailure`] if the lengths differ.
    pub fn from_predictions(predictions: &[Sentiment], truth: &[Sentiment]) -> Result<Self> {
        if predictions.len() != truth.len() {
            return Err(Error::ModelFailure(format!(
                "{} predictions for {} labels",
                predictions.len(),
                truth.len()
            )));
        }
        let mut matrix = Self::default();
        for (pred, actual) in predictions.iter().zip(truth) {
            match (pred, actual) {
                (Sentiment::Positive, Sentiment::Positive) => matrix.tp += 1,
                (Sentiment::Negative, Sentiment::Negative) => matrix.tn += 1,
                (Sentiment::Positive, Sentiment::Negative) => matrix.fp += 1,
                (Sentiment::Negative, Sentiment::Positive) => matrix.fn_ += 1,
            }
        }
        Ok(matrix)
    }

    /// Number of tallied examples.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    #[allow(clippy::cast_precision_loss)]
    fn ratio(num: usize, denom: usize) -> f64 {
        if denom == 0 {
            0.0
        } else {
            num as f64 / denom as f64
        }
    }

    /// (TP + TN) / total
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        Self::ratio(self.tp + self.tn, self.total())
    }

    /// TP / (TP + FP)
    #[must_use]
    pub fn precision(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fp)
    }

    /// TP / (TP + FN)
    #[must_use]
    pub fn recall(&self) -> f64 {
        Self::ratio(self.tp, self.tp + self.fn_)
    }

    /// 2PR / (P + R)
    #[must_use]
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Everything TrainEval measures on the validation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Raw counts
    pub confusion_matrix: ConfusionMatrix,
    /// Accuracy
    pub accuracy: f64,
    /// Precision
    pub precision: f64,
    /// Recall
    pub recall: f64,
    /// F1
    pub f1_score: f64,
    /// Log loss
    pub log_loss: f64,
    /// Number of validation examples
    pub support: usize,
}

impl ClassificationReport {
    /// Evaluate probability rows against ground truth.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFailure`] if the lengths differ or the truth is empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(probabilities: &[Probabilities], truth: &[Sentiment]) -> Result<Self> {
        if truth.is_empty() {
            return Err(Error::ModelFailure(
                "cannot evaluate on an empty validation set".to_string(),
            ));
        }
        let predictions: Vec<Sentiment> = probabilities
            .iter()
            .map(|p| {
                if p[1] > p[0] {
                    Sentiment::Positive
                } else {
                    Sentiment::Negative
                }
            })
            .collect();
        let cm = ConfusionMatrix::from_predictions(&predictions, truth)?;

        let log_loss = probabilities
            .iter()
            .zip(truth)
            .map(|(p, label)| -p[label.index()].clamp(LOG_LOSS_EPS, 1.0 - LOG_LOSS_EPS).ln())
            .sum::<f64>()
            / truth.len() as f64;

        Ok(Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1_score: cm.f1_score(),
            log_loss,
            support: cm.total(),
            confusion_matrix: cm,
        })
    }

    /// Value of one metric.
    #[must_use]
    pub const fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Accuracy => self.accuracy,
            Metric::Precision => self.precision,
            Metric::Recall => self.recall,
            Metric::F1 => self.f1_score,
            Metric::LogLoss => self.log_loss,
        }
    }

    /// All metrics keyed by [`Metric`].
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<Metric, f64> {
        Metric::ALL.into_iter().map(|m| (m, self.get(m))).collect()
    }
}
