//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;

use active_sentiment::corpus::{Corpus, Example, Pool, Sentiment};
use active_sentiment::oracle::SimulatedOracle;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const POSITIVE_WORDS: &[&str] = &[
    "wonderful", "brilliant", "superb", "moving", "delightful", "masterpiece", "charming",
    "excellent", "beautiful", "gripping", "hilarious", "touching",
];

pub const NEGATIVE_WORDS: &[&str] = &[
    "awful", "boring", "terrible", "dreadful", "waste", "clumsy", "tedious", "predictable",
    "dull", "horrible", "painful", "mediocre",
];

pub const NEUTRAL_WORDS: &[&str] = &[
    "movie", "film", "plot", "actor", "scene", "director", "story", "character", "camera",
    "ending", "music", "script", "cast", "screen", "minute", "sequel",
];

/// Noisy synthetic reviews with ids `0..n`, half positive on average.
pub fn synthetic_reviews(n: u64, seed: u64) -> Vec<Example> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|id| {
            let label = if rng.gen_bool(0.5) {
                Sentiment::Positive
            } else {
                Sentiment::Negative
            };
            let (own, other) = match label {
                Sentiment::Positive => (POSITIVE_WORDS, NEGATIVE_WORDS),
                Sentiment::Negative => (NEGATIVE_WORDS, POSITIVE_WORDS),
            };
            let mut words = Vec::with_capacity(14);
            for _ in 0..rng.gen_range(8..14) {
                let roll: f64 = rng.gen();
                let pool = if roll < 0.25 {
                    own
                } else if roll < 0.35 {
                    other
                } else {
                    NEUTRAL_WORDS
                };
                words.push(*pool.choose(&mut rng).unwrap_or(&"film"));
            }
            let mut text = words.join(" ");
            if rng.gen_bool(0.2) {
                text.push_str("<br /><br />The end!");
            }
            Example::labeled(id, text, label)
        })
        .collect()
}

/// Reviews that are trivially separable.
pub fn separable_reviews(n: u64) -> Vec<Example> {
    (0..n)
        .map(|id| {
            if id % 2 == 0 {
                Example::labeled(id, format!("wonderful brilliant film number{id}"), Sentiment::Positive)
            } else {
                Example::labeled(id, format!("awful boring film number{id}"), Sentiment::Negative)
            }
        })
        .collect()
}

/// Split in id order without shuffling: first `train` rows train, next
/// `validation` rows validate, the rest become unlabeled.
pub fn fixed_split(examples: Vec<Example>, train: usize, validation: usize) -> (Corpus, SimulatedOracle) {
    let mut training = Vec::new();
    let mut held_out = Vec::new();
    let mut unlabeled = Vec::new();
    let mut withheld = BTreeMap::new();
    for (i, mut example) in examples.into_iter().enumerate() {
        if i < train {
            training.push(example);
        } else if i < train + validation {
            held_out.push(example);
        } else {
            if let Some(label) = example.label.take() {
                withheld.insert(example.id, label);
            }
            unlabeled.push(example);
        }
    }
    let corpus = Corpus::new(
        Pool::from_examples(training),
        Pool::from_examples(held_out),
        Pool::from_examples(unlabeled),
    )
    .unwrap();
    (corpus, SimulatedOracle::new(withheld))
}
