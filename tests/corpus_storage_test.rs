//! Corpus partitioning and Parquet persistence

mod common;

use std::collections::BTreeSet;

use active_sentiment::corpus::{
    read_partition, read_pool, write_partition, write_pool, Example, ExampleId, Partitioner, Pool,
    Sentiment,
};
use active_sentiment::oracle::LabelOracle;
use active_sentiment::Error;
use common::{separable_reviews, synthetic_reviews};

// =============================================================================
// Partitioner
// =============================================================================

#[test]
fn test_partition_sizes_and_disjointness() {
    let examples = synthetic_reviews(1_000, 1);
    let partition = Partitioner::new(100, 50, 9).partition(examples).unwrap();
    let corpus = &partition.corpus;

    assert_eq!(corpus.training().len(), 100);
    assert_eq!(corpus.validation().len(), 50);
    assert_eq!(corpus.unlabeled().len(), 850);
    assert_eq!(partition.withheld.len(), 850);

    let ids: BTreeSet<ExampleId> = corpus
        .training()
        .ids()
        .chain(corpus.validation().ids())
        .chain(corpus.unlabeled().ids())
        .collect();
    assert_eq!(ids.len(), 1_000);
    assert!(corpus.unlabeled().iter().all(|e| e.label.is_none()));
}

#[test]
fn test_partition_is_seed_deterministic_and_order_independent() {
    let examples = synthetic_reviews(300, 2);
    let mut reversed = examples.clone();
    reversed.reverse();

    let a = Partitioner::new(30, 30, 5).partition(examples).unwrap();
    let b = Partitioner::new(30, 30, 5).partition(reversed).unwrap();
    assert_eq!(a.corpus, b.corpus);
    assert_eq!(a.withheld, b.withheld);
}

#[test]
fn test_partition_rejects_oversized_request() {
    let err = Partitioner::new(80, 30, 1)
        .partition(separable_reviews(100))
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[test]
fn test_partition_rejects_duplicate_ids() {
    let mut examples = separable_reviews(10);
    examples.push(Example::labeled(3, "again", Sentiment::Positive));
    let err = Partitioner::new(2, 2, 1).partition(examples).unwrap_err();
    assert!(matches!(err, Error::DataIntegrity(_)));
}

#[test]
fn test_oracle_answers_withheld_labels() {
    let examples = separable_reviews(40);
    let truth: Vec<(ExampleId, Sentiment)> = examples
        .iter()
        .map(|e| (e.id, e.label.unwrap()))
        .collect();
    let (corpus, oracle) = Partitioner::new(10, 10, 3)
        .partition(examples)
        .unwrap()
        .into_parts();

    for id in corpus.unlabeled().ids() {
        let expected = truth.iter().find(|(i, _)| *i == id).unwrap().1;
        assert_eq!(oracle.get_label(id).unwrap(), expected);
    }
    let training_id = corpus.training().ids().next().unwrap();
    assert!(matches!(oracle.get_label(training_id), Err(Error::NotFound(_))));
    assert_eq!(oracle.answered(), corpus.unlabeled().len());
}

// =============================================================================
// Parquet persistence
// =============================================================================

#[test]
fn test_pool_parquet_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pool.parquet");
    let pool = Pool::from_examples([
        Example::labeled(1, "A <b>great</b> film", Sentiment::Positive),
        Example::unlabeled(2, "unknown"),
        Example::labeled(3, "dull", Sentiment::Negative),
    ]);

    write_pool(&path, &pool).unwrap();
    let loaded = read_pool(&path).unwrap();
    assert_eq!(loaded, pool);
}

#[test]
fn test_partition_directory_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let partition = Partitioner::new(20, 10, 4)
        .partition(synthetic_reviews(60, 3))
        .unwrap();

    write_partition(dir.path(), &partition).unwrap();
    for file in ["train.parquet", "validation.parquet", "unlabeled.parquet", "oracle.parquet"] {
        assert!(dir.path().join(file).exists(), "{file} missing");
    }

    let loaded = read_partition(dir.path()).unwrap();
    assert_eq!(loaded.corpus, partition.corpus);
    assert_eq!(loaded.withheld, partition.withheld);
}

#[test]
fn test_read_partition_without_oracle_file() {
    let dir = tempfile::tempdir().unwrap();
    let partition = Partitioner::new(5, 5, 4).partition(separable_reviews(20)).unwrap();
    write_partition(dir.path(), &partition).unwrap();
    std::fs::remove_file(dir.path().join("oracle.parquet")).unwrap();

    let loaded = read_partition(dir.path()).unwrap();
    assert!(loaded.withheld.is_empty());
    assert_eq!(loaded.corpus.unlabeled().len(), 10);
}

#[test]
fn test_read_missing_pool_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = read_pool(dir.path().join("missing.parquet")).unwrap_err();
    assert!(matches!(err, Error::StorageError(_)));
}

#[test]
fn test_label_distribution() {
    let partition = Partitioner::new(10, 10, 1).partition(separable_reviews(40)).unwrap();
    let distribution = partition.corpus.training().label_distribution();
    let total: usize = distribution.values().sum();
    assert_eq!(total, 10);
}
