//! Bag-of-n-grams vectorizer shared by all model families

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use trueno::Vector;

use crate::{Error, Result};

/// Sparse row: `(feature index, value)` pairs sorted by index.
pub type SparseVector = Vec<(u32, f32)>;

/// Vocabulary settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VectorizerConfig {
    /// Largest n-gram length (1 = unigrams only)
    #[serde(default = "default_ngram_max")]
    pub ngram_max: usize,
    /// Minimum number of training documents a term must occur in
    #[serde(default = "default_min_df")]
    pub min_df: usize,
    /// Keep only the most frequent terms (by document frequency)
    #[serde(default)]
    pub max_features: Option<usize>,
}

const fn default_ngram_max() -> usize {
    1
}

const fn default_min_df() -> usize {
    1
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            ngram_max: default_ngram_max(),
            min_df: default_min_df(),
            max_features: None,
        }
    }
}

impl VectorizerConfig {
    /// Check ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `ngram_max` is outside 1..=3,
    /// `min_df` is zero or `max_features` is zero.
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.ngram_max) {
            return Err(Error::Configuration(format!(
                "ngram_max must be in 1..=3, got {}",
                self.ngram_max
            )));
        }
        if self.min_df == 0 {
            return Err(Error::Configuration("min_df must be at least 1".to_string()));
        }
        if self.max_features == Some(0) {
            return Err(Error::Configuration(
                "max_features must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fitted vocabulary with smoothed inverse document frequencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vectorizer {
    config: VectorizerConfig,
    vocabulary: FxHashMap<String, u32>,
    idf: Vec<f32>,
}

impl Vectorizer {
    /// Unfitted vectorizer.
    #[must_use]
    pub fn new(config: VectorizerConfig) -> Self {
        Self {
            config,
            vocabulary: FxHashMap::default(),
            idf: Vec::new(),
        }
    }

    /// Settings this vectorizer was built with.
    #[must_use]
    pub const fn config(&self) -> VectorizerConfig {
        self.config
    }

    /// Number of features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.idf.len()
    }

    /// True before `fit` or when no term passed `min_df`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// Index of a term, if in the vocabulary.
    #[must_use]
    pub fn index_of(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    fn terms(&self, doc: &str) -> Vec<String> {
        let words: Vec<&str> = doc.split_whitespace().collect();
        let mut terms = Vec::with_capacity(words.len() * self.config.ngram_max);
        for n in 1..=self.config.ngram_max {
            terms.extend(words.windows(n).map(|w| w.join(" ")));
        }
        terms
    }

    /// Learn the vocabulary from normalized documents.
    ///
    /// Indices are assigned in lexicographic term order, so the same
    /// documents always produce the same feature layout.
    pub fn fit(&mut self, docs: &[&str]) {
        let mut df: FxHashMap<String, usize> = FxHashMap::default();
        for doc in docs {
            let mut terms = self.terms(doc);
            terms.sort_unstable();
            terms.dedup();
            for term in terms {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let mut kept: Vec<(String, usize)> = df
            .into_iter()
            .filter(|(_, count)| *count >= self.config.min_df)
            .collect();
        if let Some(limit) = self.config.max_features {
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(limit);
        }
        kept.sort_by(|a, b| a.0.cmp(&b.0));

        #[allow(clippy::cast_precision_loss)]
        let n_docs = docs.len() as f32;
        self.vocabulary = FxHashMap::default();
        self.idf = Vec::with_capacity(kept.len());
        for (index, (term, count)) in kept.into_iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let idf = ((1.0 + n_docs) / (1.0 + count as f32)).ln() + 1.0;
            #[allow(clippy::cast_possible_truncation)]
            let index = index as u32;
            self.vocabulary.insert(term, index);
            self.idf.push(idf);
        }
    }

    /// Raw term counts.
    #[must_use]
    pub fn counts(&self, doc: &str) -> SparseVector {
        let mut counts: FxHashMap<u32, f32> = FxHashMap::default();
        for term in self.terms(doc) {
            if let Some(index) = self.vocabulary.get(&term) {
                *counts.entry(*index).or_insert(0.0) += 1.0;
            }
        }
        let mut row: SparseVector = counts.into_iter().collect();
        row.sort_unstable_by_key(|(index, _)| *index);
        row
    }

    /// L2-normalised TF-IDF weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModelFailure`] if the SIMD norm cannot be computed.
    pub fn tfidf(&self, doc: &str) -> Result<SparseVector> {
        let mut row = self.counts(doc);
        if row.is_empty() {
            return Ok(row);
        }
        let weights: Vec<f32> = row
            .iter()
            .map(|(index, count)| count * self.idf[*index as usize])
            .collect();
        let norm = Vector::from_slice(&weights)
            .norm_l2()
            .map_err(|e| Error::ModelFailure(format!("TF-IDF norm failed: {e:?}")))?;
        for ((_, value), weight) in row.iter_mut().zip(weights) {
            *value = if norm > 0.0 { weight / norm } else { weight };
        }
        Ok(row)
    }

    /// Sorted indices of the terms present in `doc`.
    #[must_use]
    pub fn presence(&self, doc: &str) -> Vec<u32> {
        self.counts(doc).into_iter().map(|(index, _)| index).collect()
    }
}
