//! Active Learning Example
//!
//! Simulates uncertainty-sampling active learning on a synthetic review
//! corpus:
//!
//! 1. Generate labeled reviews and partition them (labels withheld)
//! 2. Write the partition to Parquet and read it back
//! 3. Run a sweep of model variants into one experiment
//! 4. Print the learning curve and reload the best model
//!
//! Run with: cargo run --example active_learning
//! Verbose:  RUST_LOG=active_sentiment=debug cargo run --example active_learning

use std::sync::Arc;

use active_sentiment::classifier::ModelSpec;
use active_sentiment::corpus::{read_partition, write_partition, Example, Partitioner, Sentiment};
use active_sentiment::engine::SessionConfig;
use active_sentiment::experiment::ExperimentTracker;
use active_sentiment::metrics::Metric;
use active_sentiment::normalize::NormalizerMode;
use active_sentiment::oracle::LabelOracle;
use active_sentiment::sampler::UncertaintyPolicy;
use active_sentiment::sweep::{Sweep, TAG_VARIANT};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

const POSITIVE: &[&str] = &["wonderful", "moving", "superb", "charming", "gripping"];
const NEGATIVE: &[&str] = &["boring", "dreadful", "clumsy", "tedious", "predictable"];
const NEUTRAL: &[&str] = &["film", "plot", "cast", "scene", "ending", "script", "camera"];

fn reviews(n: u64) -> Vec<Example> {
    let mut rng = StdRng::seed_from_u64(7);
    (0..n)
        .map(|id| {
            let label = if rng.gen_bool(0.5) {
                Sentiment::Positive
            } else {
                Sentiment::Negative
            };
            let (own, other) = match label {
                Sentiment::Positive => (POSITIVE, NEGATIVE),
                Sentiment::Negative => (NEGATIVE, POSITIVE),
            };
            let words: Vec<&str> = (0..10)
                .filter_map(|_| {
                    let roll: f64 = rng.gen();
                    let pool = if roll < 0.2 {
                        own
                    } else if roll < 0.3 {
                        other
                    } else {
                        NEUTRAL
                    };
                    pool.choose(&mut rng).copied()
                })
                .collect();
            Example::labeled(id, words.join(" "), label)
        })
        .collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Active Learning: Uncertainty Sampling ===\n");

    // -------------------------------------------------------------------------
    // 1. Partition
    // -------------------------------------------------------------------------
    let partition = Partitioner::new(200, 500, 42).partition(reviews(5_000))?;
    let workdir = tempfile::tempdir().context("creating scratch directory")?;
    let data_dir = workdir.path().join("data");
    write_partition(&data_dir, &partition)?;
    let (corpus, oracle) = read_partition(&data_dir)?.into_parts();
    println!(
        "1. Partitioned: training={}, validation={}, unlabeled={}",
        corpus.training().len(),
        corpus.validation().len(),
        corpus.unlabeled().len()
    );

    // -------------------------------------------------------------------------
    // 2. Sweep
    // -------------------------------------------------------------------------
    let tracker = Arc::new(ExperimentTracker::open(workdir.path().join("mlruns"))?);
    let base = SessionConfig::builder()
        .batch_size(100)
        .max_iterations(5)
        .min_improvement(0.001)
        .build()?;
    let sweep = Sweep::new("demo-sweep", Arc::clone(&tracker))
        .variant("naive-bayes", base.clone())
        .variant(
            "sgd-lemmatize",
            SessionConfig::builder()
                .batch_size(100)
                .max_iterations(5)
                .model(ModelSpec::sgd())
                .normalizer_mode(NormalizerMode::Lemmatize)
                .uncertainty(UncertaintyPolicy::Entropy)
                .build()?,
        );

    let oracle: Arc<dyn LabelOracle> = Arc::new(oracle);
    println!("\n2. Running {} variants...", sweep.len());
    for outcome in sweep.run(&corpus, &oracle)? {
        match (&outcome.report, &outcome.error) {
            (Some(report), _) => println!(
                "   {:<14} {} iterations, stopped: {}, final accuracy {:.4}",
                outcome.variant,
                report.iterations.len(),
                report.stop_reason,
                report.final_accuracy().unwrap_or(f64::NAN)
            ),
            (None, Some(error)) => println!("   {:<14} failed: {error}", outcome.variant),
            (None, None) => {}
        }
    }

    // -------------------------------------------------------------------------
    // 3. Learning curve
    // -------------------------------------------------------------------------
    println!("\n3. Accuracy by iteration:");
    for point in tracker.metric_history("demo-sweep", Metric::Accuracy) {
        let run = tracker.get_run(point.run_id())?;
        println!(
            "   step {:>2}  {:<14} {:.4}",
            point.step(),
            run.tags().get(TAG_VARIANT).map_or("-", String::as_str),
            point.value()
        );
    }

    // -------------------------------------------------------------------------
    // 4. Model selection
    // -------------------------------------------------------------------------
    let (best, model) = sweep.select_best(Metric::Accuracy)?;
    println!(
        "\n4. Best run {} ({}), accuracy {:.4}",
        best.run_id,
        best.tags.get(TAG_VARIANT).map_or("-", String::as_str),
        best.metric(Metric::Accuracy).unwrap_or(f64::NAN)
    );
    let probe = ["a wonderful and gripping film", "a tedious, predictable script"];
    for (text, p) in probe.iter().zip(model.predict_proba(&probe)?) {
        println!("   P(positive | {text:?}) = {:.3}", p[1]);
    }

    println!("\n=== Done ===");
    Ok(())
}
