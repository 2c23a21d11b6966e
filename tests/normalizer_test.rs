//! Text normalizer contract tests

use active_sentiment::normalize::{NormalizerConfig, NormalizerMode, TextNormalizer};
use active_sentiment::Error;

fn normalizer(mode: NormalizerMode) -> TextNormalizer {
    TextNormalizer::new(NormalizerConfig::with_mode(mode)).unwrap()
}

#[test]
fn test_mode_names() {
    for (name, mode) in [
        ("stem", NormalizerMode::Stem),
        ("stemming", NormalizerMode::Stem),
        ("lemmatize", NormalizerMode::Lemmatize),
        ("lemmatization", NormalizerMode::Lemmatize),
    ] {
        assert_eq!(name.parse::<NormalizerMode>().unwrap(), mode);
    }
    assert!(matches!(
        "porter".parse::<NormalizerMode>(),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_markup_and_separators_collapse() {
    let out = normalizer(NormalizerMode::Stem)
        .normalize("  Loved   it!!!<br /><br />Brilliant---acting;  superb\tscore ");
    assert!(!out.contains("  "));
    assert!(!out.starts_with(' ') && !out.ends_with(' '));
    assert!(out.split(' ').all(|t| t != "br"));
    assert!(out.split(' ').all(|t| t.chars().all(char::is_alphanumeric)));
}

#[test]
fn test_modes_differ() {
    let text = "The studios were making generous promises";
    let stemmed = normalizer(NormalizerMode::Stem).normalize(text);
    let lemmatized = normalizer(NormalizerMode::Lemmatize).normalize(text);
    assert_ne!(stemmed, lemmatized);
    assert!(lemmatized.contains("studio"));
    assert!(lemmatized.contains("make"));
}

#[test]
fn test_pure_and_deterministic() {
    let n = normalizer(NormalizerMode::Lemmatize);
    let other = normalizer(NormalizerMode::Stem);
    let text = "Two <em>different</em> normalizers can coexist";
    assert_eq!(n.normalize(text), n.normalize(text));
    assert_eq!(other.normalize(text), other.normalize(text));
    assert_eq!(other.config().mode, NormalizerMode::Stem);
    assert_eq!(n.config().mode, NormalizerMode::Lemmatize);
}

#[test]
fn test_stopword_removal_can_be_disabled() {
    let keep = TextNormalizer::new(NormalizerConfig {
        mode: NormalizerMode::Lemmatize,
        remove_stopwords: false,
    })
    .unwrap();
    assert!(keep.normalize("the plot").starts_with("the"));
    assert_eq!(normalizer(NormalizerMode::Lemmatize).normalize("the plot"), "plot");
}

#[test]
fn test_idempotent_on_review_like_text() {
    let reviews = [
        "I <b>really</b> enjoyed this movie... 10/10 would watch again!",
        "Terrible pacing; the director's choices were baffling &amp; confusing.",
        "<p>Beautifully shot, wonderfully acted, painfully slow.</p>",
        "",
        "!!!",
    ];
    for mode in [NormalizerMode::Stem, NormalizerMode::Lemmatize] {
        let n = normalizer(mode);
        for review in reviews {
            let once = n.normalize(review);
            assert_eq!(n.normalize(&once), once, "{mode}: {review}");
        }
    }
}

#[test]
fn test_empty_input() {
    assert_eq!(normalizer(NormalizerMode::Stem).normalize(""), "");
    assert!(normalizer(NormalizerMode::Stem).normalize_batch(&[]).is_empty());
}
