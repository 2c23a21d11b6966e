//! Experiment tracker integration tests
//!
//! Covers run publication, ordered queries, metric history, model reload
//! and persistence across reopen.

use std::sync::Arc;
use std::thread;

use active_sentiment::classifier::{Classifier, ModelType, NaiveBayes, VectorizerConfig};
use active_sentiment::corpus::Sentiment;
use active_sentiment::experiment::{
    ExperimentTracker, FileArtifactStore, OrderBy, RunDraft, RunFilter, RunStatus, TAG_MODEL_TYPE,
};
use active_sentiment::metrics::Metric;
use active_sentiment::Error;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn fitted_model() -> NaiveBayes {
    let mut model = NaiveBayes::new(1.0, VectorizerConfig::default());
    model
        .fit(
            &["great fun film", "dull awful plot", "fun great cast", "awful dull acting"],
            &[
                Sentiment::Positive,
                Sentiment::Negative,
                Sentiment::Positive,
                Sentiment::Negative,
            ],
        )
        .unwrap();
    model
}

fn log_accuracy(tracker: &ExperimentTracker, experiment: &str, iteration: u64, accuracy: f64) -> String {
    let draft = RunDraft::new(experiment)
        .model_type(ModelType::NaiveBayes)
        .iteration(iteration)
        .metric(Metric::Accuracy, accuracy)
        .metric(Metric::LogLoss, 1.0 - accuracy);
    tracker
        .log_run(draft, &fitted_model())
        .unwrap()
        .run_id()
        .to_string()
}

// ============================================================================
// Queries
// ============================================================================

#[test]
fn test_search_orders_by_accuracy_desc() {
    let tracker = ExperimentTracker::in_memory();
    log_accuracy(&tracker, "exp", 0, 0.80);
    log_accuracy(&tracker, "exp", 1, 0.75);
    log_accuracy(&tracker, "exp", 2, 0.81);

    let summaries = tracker
        .search_runs("exp", &RunFilter::all(), OrderBy::desc(Metric::Accuracy), 10)
        .unwrap();
    let accuracies: Vec<f64> = summaries
        .iter()
        .map(|s| s.metric(Metric::Accuracy).unwrap())
        .collect();
    assert_eq!(accuracies, vec![0.81, 0.80, 0.75]);

    let ascending = tracker
        .search_runs("exp", &RunFilter::all(), OrderBy::asc(Metric::Accuracy), 1)
        .unwrap();
    assert_eq!(ascending[0].metric(Metric::Accuracy), Some(0.75));
}

#[test]
fn test_best_run_respects_metric_direction() {
    let tracker = ExperimentTracker::in_memory();
    log_accuracy(&tracker, "exp", 0, 0.6);
    let best = log_accuracy(&tracker, "exp", 1, 0.9);

    let by_accuracy = tracker.best_run("exp", Metric::Accuracy).unwrap().unwrap();
    assert_eq!(by_accuracy.run_id, best);
    let by_loss = tracker.best_run("exp", Metric::LogLoss).unwrap().unwrap();
    assert_eq!(by_loss.run_id, best);
}

#[test]
fn test_unknown_experiment_is_not_found() {
    let tracker = ExperimentTracker::in_memory();
    assert!(matches!(
        tracker.search_runs("missing", &RunFilter::all(), OrderBy::desc(Metric::Accuracy), 5),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        tracker.best_run("missing", Metric::Accuracy),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(tracker.get_run("nope"), Err(Error::NotFound(_))));
    assert!(matches!(tracker.load_model("nope"), Err(Error::NotFound(_))));
}

#[test]
fn test_experiment_without_runs_returns_empty() {
    let tracker = ExperimentTracker::in_memory();
    tracker.create_experiment("empty", "Empty").unwrap();
    assert!(tracker
        .search_runs("empty", &RunFilter::all(), OrderBy::desc(Metric::Accuracy), 5)
        .unwrap()
        .is_empty());
    assert!(tracker.best_run("empty", Metric::Accuracy).unwrap().is_none());
}

#[test]
fn test_filters_exclude_failed_and_low_runs() {
    let tracker = ExperimentTracker::in_memory();
    let good = log_accuracy(&tracker, "exp", 0, 0.9);
    log_accuracy(&tracker, "exp", 1, 0.5);
    tracker
        .log_failed_run(
            RunDraft::new("exp").metric(Metric::Accuracy, 0.99),
            &Error::ModelFailure("diverged".to_string()),
        )
        .unwrap();

    let filter = RunFilter::successful()
        .with_model_type(ModelType::NaiveBayes)
        .with_min_metric(Metric::Accuracy, 0.7)
        .with_tag(TAG_MODEL_TYPE, "naive_bayes");
    let ids = tracker.search(&filter, OrderBy::desc(Metric::Accuracy), 10);
    assert_eq!(ids, vec![good]);

    let failed = tracker.search(
        &RunFilter::all().with_status(RunStatus::Failed),
        OrderBy::desc(Metric::Accuracy),
        10,
    );
    assert_eq!(failed.len(), 1);
    assert!(tracker.get_run(&failed[0]).unwrap().error().is_some());
}

#[test]
fn test_search_spans_experiments_and_truncates() {
    let tracker = ExperimentTracker::in_memory();
    for (experiment, accuracy) in [("a", 0.5), ("b", 0.6), ("c", 0.7)] {
        log_accuracy(&tracker, experiment, 0, accuracy);
    }
    assert_eq!(tracker.experiment_count(), 3);
    let top = tracker.search(&RunFilter::all(), OrderBy::desc(Metric::Accuracy), 2);
    assert_eq!(top.len(), 2);
    assert_eq!(tracker.get_run(&top[0]).unwrap().experiment_id(), "c");
}

#[test]
fn test_metric_history_follows_iterations() {
    let tracker = ExperimentTracker::in_memory();
    for (iteration, accuracy) in [(2, 0.8), (0, 0.6), (1, 0.7)] {
        log_accuracy(&tracker, "curve", iteration, accuracy);
    }
    let history = tracker.metric_history("curve", Metric::Accuracy);
    let steps: Vec<u64> = history.iter().map(|p| p.step()).collect();
    let values: Vec<f64> = history.iter().map(|p| p.value()).collect();
    assert_eq!(steps, vec![0, 1, 2]);
    assert_eq!(values, vec![0.6, 0.7, 0.8]);
    assert!(tracker.metric_history("curve", Metric::F1).is_empty());
}

// ============================================================================
// Models and concurrency
// ============================================================================

#[test]
fn test_loaded_model_predicts_like_the_trained_one() {
    let tracker = ExperimentTracker::in_memory();
    let model = fitted_model();
    let run = tracker.log_run(RunDraft::new("exp"), &model).unwrap();
    let loaded = tracker.load_model(run.run_id()).unwrap();

    let docs = ["great fun", "awful plot", "unseen words"];
    assert_eq!(loaded.model_type(), ModelType::NaiveBayes);
    assert_eq!(
        loaded.predict_proba(&docs).unwrap(),
        model.predict_proba(&docs).unwrap()
    );
}

#[test]
fn test_concurrent_logging_keeps_every_run() {
    let tracker = Arc::new(ExperimentTracker::in_memory());
    let handles: Vec<_> = (0..8u32)
        .map(|i| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                log_accuracy(&tracker, "parallel", u64::from(i), f64::from(i) / 10.0)
            })
        })
        .collect();
    let mut ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 8);
    assert_eq!(tracker.runs("parallel").len(), 8);
    assert_eq!(tracker.experiment_count(), 1);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_reopen_restores_runs_and_models() {
    let dir = TempDir::new().unwrap();
    let run_id = {
        let tracker = ExperimentTracker::open(dir.path()).unwrap();
        tracker.create_experiment("persisted", "Persisted runs").unwrap();
        log_accuracy(&tracker, "persisted", 0, 0.7);
        log_accuracy(&tracker, "persisted", 1, 0.85)
    };

    let reopened = ExperimentTracker::open(dir.path()).unwrap();
    assert_eq!(reopened.run_count(), 2);
    assert_eq!(
        reopened.get_experiment("persisted").unwrap().name(),
        "Persisted runs"
    );

    let best = reopened
        .best_run("persisted", Metric::Accuracy)
        .unwrap()
        .unwrap();
    assert_eq!(best.run_id, run_id);
    let accuracy = best.metric(Metric::Accuracy).unwrap();
    assert!((accuracy - 0.85).abs() < 1e-12);

    assert_eq!(reopened.metric_history("persisted", Metric::Accuracy).len(), 2);
    assert!(reopened.load_model(&run_id).unwrap().is_fitted());
}

#[test]
fn test_missing_artifact_file_is_not_found_after_reopen() {
    let dir = TempDir::new().unwrap();
    let run_id = {
        let tracker = ExperimentTracker::open(dir.path()).unwrap();
        log_accuracy(&tracker, "exp", 0, 0.7)
    };
    std::fs::remove_file(dir.path().join("artifacts").join(format!("{run_id}.json"))).unwrap();

    let reopened = ExperimentTracker::open(dir.path()).unwrap();
    assert!(reopened.get_run(&run_id).is_ok());
    assert!(matches!(reopened.load_model(&run_id), Err(Error::NotFound(_))));
}

#[test]
fn test_deleted_artifact_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(dir.path()).unwrap();
    let tracker = ExperimentTracker::with_artifact_store(Box::new(store));
    let run_id = log_accuracy(&tracker, "exp", 0, 0.7);
    assert!(tracker.load_model(&run_id).is_ok());

    std::fs::remove_file(dir.path().join(format!("{run_id}.json"))).unwrap();
    assert!(matches!(tracker.load_model(&run_id), Err(Error::NotFound(_))));
}

#[test]
fn test_unreadable_artifact_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(dir.path()).unwrap();
    let tracker = ExperimentTracker::with_artifact_store(Box::new(store));
    let run_id = log_accuracy(&tracker, "exp", 0, 0.7);

    // A directory in place of the artifact makes the read fail with an I/O error.
    let path = dir.path().join(format!("{run_id}.json"));
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    assert!(matches!(tracker.load_model(&run_id), Err(Error::NotFound(_))));
}

#[test]
fn test_truncated_artifact_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let store = FileArtifactStore::open(dir.path()).unwrap();
    let tracker = ExperimentTracker::with_artifact_store(Box::new(store));
    let run_id = log_accuracy(&tracker, "exp", 0, 0.7);

    std::fs::write(dir.path().join(format!("{run_id}.json")), b"{\"family\":").unwrap();
    assert!(matches!(tracker.load_model(&run_id), Err(Error::NotFound(_))));
}

// ============================================================================
// Compressed artifacts
// ============================================================================

#[cfg(feature = "compression")]
mod compressed {
    use super::*;
    use active_sentiment::experiment::{ArtifactCodec, CompressedArtifactStore};

    fn compressed_tracker(dir: &TempDir, codec: ArtifactCodec) -> ExperimentTracker {
        let store = CompressedArtifactStore::new(FileArtifactStore::open(dir.path()).unwrap(), codec);
        ExperimentTracker::with_artifact_store(Box::new(store))
    }

    #[test]
    fn test_compressed_models_reload() {
        for codec in [ArtifactCodec::Lz4, ArtifactCodec::Zstd] {
            let dir = TempDir::new().unwrap();
            let tracker = compressed_tracker(&dir, codec);
            let run_id = log_accuracy(&tracker, "exp", 0, 0.7);
            let loaded = tracker.load_model(&run_id).unwrap();
            assert_eq!(
                loaded.predict(&["great fun"]).unwrap(),
                fitted_model().predict(&["great fun"]).unwrap()
            );
        }
    }

    #[test]
    fn test_corrupted_compressed_artifact_is_not_found() {
        for codec in [ArtifactCodec::Lz4, ArtifactCodec::Zstd] {
            let dir = TempDir::new().unwrap();
            let tracker = compressed_tracker(&dir, codec);
            let run_id = log_accuracy(&tracker, "exp", 0, 0.7);

            let path = dir.path().join(format!("{run_id}.json"));
            let mut blob = std::fs::read(&path).unwrap();
            // Keep the codec tag, replace the payload.
            blob.truncate(1);
            blob.extend_from_slice(b"\x08\x00\x00\x00\xff\xff\xff\xffgarbage");
            std::fs::write(&path, &blob).unwrap();

            match tracker.load_model(&run_id) {
                Err(Error::NotFound(_)) => {}
                Err(other) => panic!("{codec:?}: expected NotFound, got {other:?}"),
                Ok(_) => panic!("{codec:?}: corrupted artifact loaded"),
            }
        }
    }

    #[test]
    fn test_garbage_without_codec_tag_is_not_found() {
        let dir = TempDir::new().unwrap();
        let tracker = compressed_tracker(&dir, ArtifactCodec::Zstd);
        let run_id = log_accuracy(&tracker, "exp", 0, 0.7);

        std::fs::write(dir.path().join(format!("{run_id}.json")), b"\xff\xff\xff\xffgarbage").unwrap();
        assert!(matches!(tracker.load_model(&run_id), Err(Error::NotFound(_))));
    }
}
