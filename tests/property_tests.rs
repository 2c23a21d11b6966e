//! Property-based tests for active-sentiment
//!
//! - Selection invariants of the uncertainty sampler
//! - Idempotence of text normalization
//! - Disjointness and conservation of corpus partitions
//! - Run with ProptestConfig::with_cases(100)

use std::collections::{BTreeMap, BTreeSet};

use active_sentiment::classifier::Probabilities;
use active_sentiment::corpus::{Example, ExampleId, Partitioner, Sentiment};
use active_sentiment::normalize::{NormalizerConfig, NormalizerMode, TextNormalizer};
use active_sentiment::sampler::{UncertaintyPolicy, UncertaintySampler};
use proptest::prelude::*;

// ============================================================================
// Property Test Generators (Strategies)
// ============================================================================

/// Probability mapping with up to `max_rows` distinct ids
fn arb_probabilities(max_rows: usize) -> impl Strategy<Value = BTreeMap<ExampleId, Probabilities>> {
    proptest::collection::btree_map(0u64..10_000, 0.0f64..=1.0, 0..=max_rows).prop_map(|rows| {
        rows.into_iter()
            .map(|(id, pos)| (ExampleId(id), [1.0 - pos, pos]))
            .collect()
    })
}

fn arb_policy() -> impl Strategy<Value = UncertaintyPolicy> {
    prop_oneof![
        Just(UncertaintyPolicy::Margin),
        Just(UncertaintyPolicy::Entropy),
        Just(UncertaintyPolicy::LeastConfidence),
    ]
}

/// Review-like text: words, punctuation, markup and entities
fn arb_review() -> impl Strategy<Value = String> {
    proptest::collection::vec(
        prop_oneof![
            "[A-Za-z]{1,12}",
            Just("<br />".to_string()),
            Just("&amp;".to_string()),
            "[!?.,;:'\"-]{1,3}",
            "[0-9]{1,4}",
        ],
        0..30,
    )
    .prop_map(|parts| parts.join(" "))
}

fn arb_labeled_corpus() -> impl Strategy<Value = Vec<Example>> {
    proptest::collection::btree_set(0u64..100_000, 10..200).prop_map(|ids| {
        ids.into_iter()
            .map(|id| {
                let label = if id % 3 == 0 {
                    Sentiment::Negative
                } else {
                    Sentiment::Positive
                };
                Example::labeled(id, format!("review {id}"), label)
            })
            .collect()
    })
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ========================================================================
    // Sampler Properties
    // ========================================================================

    /// Property: selection size is min(k, pool) with unique ids from the pool
    #[test]
    fn prop_selection_size_and_membership(
        probs in arb_probabilities(200),
        k in 1usize..300,
        policy in arb_policy()
    ) {
        let selection = UncertaintySampler::new(policy).select(&probs, k).unwrap();
        prop_assert_eq!(selection.len(), k.min(probs.len()));
        prop_assert_eq!(selection.capped(), k > probs.len());
        let unique: BTreeSet<_> = selection.ids().iter().collect();
        prop_assert_eq!(unique.len(), selection.len());
        prop_assert!(selection.ids().iter().all(|id| probs.contains_key(id)));
    }

    /// Property: scores are non-increasing, ties ordered by ascending id
    #[test]
    fn prop_selection_order(
        probs in arb_probabilities(200),
        k in 1usize..200,
        policy in arb_policy()
    ) {
        let selection = UncertaintySampler::new(policy).select(&probs, k).unwrap();
        for i in 1..selection.len() {
            let (prev, next) = (selection.scores()[i - 1], selection.scores()[i]);
            prop_assert!(prev >= next);
            if prev.total_cmp(&next).is_eq() {
                prop_assert!(selection.ids()[i - 1] < selection.ids()[i]);
            }
        }
    }

    /// Property: the selection equals the head of a full sort
    #[test]
    fn prop_selection_matches_full_sort(
        probs in arb_probabilities(150),
        k in 1usize..150,
        policy in arb_policy()
    ) {
        let mut ranked: Vec<(f64, ExampleId)> =
            probs.iter().map(|(id, p)| (policy.score(*p), *id)).collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        let expected: Vec<ExampleId> = ranked.into_iter().take(k).map(|(_, id)| id).collect();

        let selection = UncertaintySampler::new(policy).select(&probs, k).unwrap();
        prop_assert_eq!(selection.ids(), expected.as_slice());
    }

    /// Property: selection is a pure function of its inputs
    #[test]
    fn prop_selection_deterministic(probs in arb_probabilities(100), k in 1usize..50) {
        let sampler = UncertaintySampler::default();
        prop_assert_eq!(sampler.select(&probs, k).unwrap(), sampler.select(&probs, k).unwrap());
    }

    // ========================================================================
    // Normalizer Properties
    // ========================================================================

    /// Property: normalize(normalize(x)) == normalize(x)
    #[test]
    fn prop_normalize_idempotent(text in arb_review(), lemmatize in any::<bool>()) {
        let mode = if lemmatize { NormalizerMode::Lemmatize } else { NormalizerMode::Stem };
        let normalizer = TextNormalizer::new(NormalizerConfig::with_mode(mode)).unwrap();
        let once = normalizer.normalize(&text);
        prop_assert_eq!(normalizer.normalize(&once), once.clone());
    }

    /// Property: output is lowercase tokens joined by single spaces
    #[test]
    fn prop_normalize_token_shape(text in arb_review()) {
        let once = TextNormalizer::new(NormalizerConfig::default()).unwrap().normalize(&text);
        prop_assert!(!once.contains("  "));
        prop_assert_eq!(once.trim(), once.as_str());
        prop_assert!(!once.contains('<') && !once.contains('&'));
        prop_assert_eq!(once.to_lowercase(), once.clone());
    }

    // ========================================================================
    // Partition Properties
    // ========================================================================

    /// Property: pools are disjoint, sized as requested and cover the corpus
    #[test]
    fn prop_partition_disjoint_and_complete(
        examples in arb_labeled_corpus(),
        train_frac in 0.05f64..0.5,
        seed in any::<u64>()
    ) {
        let total = examples.len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let train = ((total as f64 * train_frac) as usize).max(1);
        let validation = (total - train) / 2;
        let all_ids: BTreeSet<ExampleId> = examples.iter().map(|e| e.id).collect();

        let partition = Partitioner::new(train, validation, seed).partition(examples).unwrap();
        let corpus = &partition.corpus;
        prop_assert_eq!(corpus.training().len(), train);
        prop_assert_eq!(corpus.validation().len(), validation);
        prop_assert_eq!(corpus.len(), total);
        prop_assert!(corpus.validate().is_ok());

        let covered: BTreeSet<ExampleId> = corpus
            .training()
            .ids()
            .chain(corpus.validation().ids())
            .chain(corpus.unlabeled().ids())
            .collect();
        prop_assert_eq!(covered, all_ids);
        let withheld: BTreeSet<ExampleId> = partition.withheld.keys().copied().collect();
        let unlabeled: BTreeSet<ExampleId> = corpus.unlabeled().ids().collect();
        prop_assert_eq!(withheld, unlabeled);
    }
}
