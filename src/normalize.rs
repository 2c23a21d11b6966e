//! Text normalization
//!
//! Maps raw review text to the token string every classifier sees:
//!
//! 1. lowercase
//! 2. strip markup tags and HTML entities
//! 3. collapse non-alphanumeric runs to a single separator
//! 4. collapse whitespace
//! 5. drop English stopwords (optional)
//! 6. apply exactly one of stemming or lemmatization
//!
//! The mode is part of the normalizer value, not process-wide state, so two
//! sessions with different modes can run side by side. Token transforms are
//! iterated to a fixed point, which makes `normalize` idempotent.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on transform passes per token.
const MAX_FIXPOINT_PASSES: usize = 8;

/// Which morphological reduction to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerMode {
    /// Snowball English stemming
    #[default]
    Stem,
    /// Rule-based lemmatization guided by a part-of-speech tag
    Lemmatize,
}

impl NormalizerMode {
    /// Name used in configs and run records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stem => "stem",
            Self::Lemmatize => "lemmatize",
        }
    }
}

impl fmt::Display for NormalizerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stem" | "stemming" => Ok(Self::Stem),
            "lemmatize" | "lemmatization" | "lemma" => Ok(Self::Lemmatize),
            other => Err(Error::Configuration(format!(
                "unknown normalizer mode '{other}' (expected 'stem' or 'lemmatize')"
            ))),
        }
    }
}

/// Normalizer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Stemming or lemmatization
    #[serde(default)]
    pub mode: NormalizerMode,
    /// Drop English stopwords before and after the morphological step
    #[serde(default = "default_remove_stopwords")]
    pub remove_stopwords: bool,
}

const fn default_remove_stopwords() -> bool {
    true
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            mode: NormalizerMode::default(),
            remove_stopwords: default_remove_stopwords(),
        }
    }
}

impl NormalizerConfig {
    /// Config with the given mode and stopword removal on.
    #[must_use]
    pub const fn with_mode(mode: NormalizerMode) -> Self {
        Self {
            mode,
            remove_stopwords: true,
        }
    }
}

/// Deterministic, side-effect-free text normalizer.
pub struct TextNormalizer {
    config: NormalizerConfig,
    markup: Regex,
    separators: Regex,
    reducer: Reducer,
}

enum Reducer {
    Stem(Stemmer),
    Lemmatize,
}

impl fmt::Debug for TextNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextNormalizer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TextNormalizer {
    /// Build a normalizer for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if an internal pattern fails to compile.
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        let markup = Regex::new(r"<[^>]*>|&#?[a-z0-9]+;")
            .map_err(|e| Error::Configuration(format!("markup pattern: {e}")))?;
        let separators = Regex::new(r"[^\p{L}\p{N}]+")
            .map_err(|e| Error::Configuration(format!("separator pattern: {e}")))?;
        let reducer = match config.mode {
            NormalizerMode::Stem => Reducer::Stem(Stemmer::create(Algorithm::English)),
            NormalizerMode::Lemmatize => Reducer::Lemmatize,
        };
        Ok(Self {
            config,
            markup,
            separators,
            reducer,
        })
    }

    /// Build a normalizer from a mode name such as `"stem"` or `"lemmatize"`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for any other name.
    pub fn from_mode_name(mode: &str) -> Result<Self> {
        Self::new(NormalizerConfig::with_mode(mode.parse()?))
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> NormalizerConfig {
        self.config
    }

    /// Normalize one text.
    #[must_use]
    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let stripped = self.markup.replace_all(&lowered, " ");
        let separated = self.separators.replace_all(&stripped, " ");

        let mut out = String::with_capacity(separated.len());
        for token in separated.split_whitespace() {
            if self.config.remove_stopwords && is_stopword(token) {
                continue;
            }
            let reduced = self.reduce_to_fixpoint(token);
            if reduced.is_empty() || (self.config.remove_stopwords && is_stopword(&reduced)) {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(&reduced);
        }
        out
    }

    /// Normalize a batch, preserving order.
    #[must_use]
    pub fn normalize_batch(&self, texts: &[&str]) -> Vec<String> {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            texts.par_iter().map(|t| self.normalize(t)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            texts.iter().map(|t| self.normalize(t)).collect()
        }
    }

    fn reduce_once(&self, token: &str) -> String {
        match &self.reducer {
            Reducer::Stem(stemmer) => stemmer.stem(token).into_owned(),
            Reducer::Lemmatize => lemmatize(token, PartOfSpeech::tag(token)),
        }
    }

    fn reduce_to_fixpoint(&self, token: &str) -> String {
        let mut current = token.to_string();
        for _ in 0..MAX_FIXPOINT_PASSES {
            let next = self.reduce_once(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

/// Coarse part-of-speech classes used to pick lemmatization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartOfSpeech {
    /// Default when no other tag is recognised
    Noun,
    /// Verb
    Verb,
    /// Adjective
    Adjective,
    /// Adverb
    Adverb,
}

impl PartOfSpeech {
    /// Suffix-heuristic tagger. Unrecognised tokens are nouns.
    #[must_use]
    pub fn tag(token: &str) -> Self {
        let len = token.chars().count();
        if irregular_lemma(token).is_some_and(|(_, pos)| pos == Self::Verb) {
            Self::Verb
        } else if len > 4 && token.ends_with("ly") {
            Self::Adverb
        } else if (len > 5 && token.ends_with("ing")) || (len > 4 && token.ends_with("ed")) {
            Self::Verb
        } else if (len > 5 && token.ends_with("est"))
            || ["ous", "ful", "ive", "able", "ible", "less", "ish"]
                .iter()
                .any(|suffix| len > suffix.len() + 2 && token.ends_with(suffix))
        {
            Self::Adjective
        } else {
            Self::Noun
        }
    }
}

/// Irregular forms: (inflected, lemma, part of speech).
const IRREGULAR: &[(&str, &str, PartOfSpeech)] = &[
    ("am", "be", PartOfSpeech::Verb),
    ("is", "be", PartOfSpeech::Verb),
    ("are", "be", PartOfSpeech::Verb),
    ("was", "be", PartOfSpeech::Verb),
    ("were", "be", PartOfSpeech::Verb),
    ("been", "be", PartOfSpeech::Verb),
    ("has", "have", PartOfSpeech::Verb),
    ("had", "have", PartOfSpeech::Verb),
    ("does", "do", PartOfSpeech::Verb),
    ("did", "do", PartOfSpeech::Verb),
    ("done", "do", PartOfSpeech::Verb),
    ("went", "go", PartOfSpeech::Verb),
    ("gone", "go", PartOfSpeech::Verb),
    ("made", "make", PartOfSpeech::Verb),
    ("saw", "see", PartOfSpeech::Verb),
    ("seen", "see", PartOfSpeech::Verb),
    ("got", "get", PartOfSpeech::Verb),
    ("took", "take", PartOfSpeech::Verb),
    ("taken", "take", PartOfSpeech::Verb),
    ("gave", "give", PartOfSpeech::Verb),
    ("given", "give", PartOfSpeech::Verb),
    ("felt", "feel", PartOfSpeech::Verb),
    ("thought", "think", PartOfSpeech::Verb),
    ("found", "find", PartOfSpeech::Verb),
    ("told", "tell", PartOfSpeech::Verb),
    ("knew", "know", PartOfSpeech::Verb),
    ("known", "know", PartOfSpeech::Verb),
    ("came", "come", PartOfSpeech::Verb),
    ("began", "begin", PartOfSpeech::Verb),
    ("begun", "begin", PartOfSpeech::Verb),
    ("wrote", "write", PartOfSpeech::Verb),
    ("written", "write", PartOfSpeech::Verb),
    ("ran", "run", PartOfSpeech::Verb),
    ("better", "good", PartOfSpeech::Adjective),
    ("best", "good", PartOfSpeech::Adjective),
    ("worse", "bad", PartOfSpeech::Adjective),
    ("worst", "bad", PartOfSpeech::Adjective),
    ("children", "child", PartOfSpeech::Noun),
    ("men", "man", PartOfSpeech::Noun),
    ("women", "woman", PartOfSpeech::Noun),
    ("people", "person", PartOfSpeech::Noun),
    ("movies", "movie", PartOfSpeech::Noun),
    ("feet", "foot", PartOfSpeech::Noun),
    ("teeth", "tooth", PartOfSpeech::Noun),
    ("mice", "mouse", PartOfSpeech::Noun),
];

fn irregular_lemma(token: &str) -> Option<(&'static str, PartOfSpeech)> {
    IRREGULAR
        .iter()
        .find(|(form, _, _)| *form == token)
        .map(|(_, lemma, pos)| (*lemma, *pos))
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Undo doubling and restore a dropped silent `e` after stripping an inflection.
fn repair_stem(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();
    if n >= 3 && chars[n - 1] == chars[n - 2] && !is_vowel(chars[n - 1]) && !matches!(chars[n - 1], 'l' | 's' | 'z') {
        return chars[..n - 1].iter().collect();
    }
    if n == 3 && !is_vowel(chars[0]) && is_vowel(chars[1]) && !is_vowel(chars[2]) && !matches!(chars[2], 'w' | 'x' | 'y') {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn strip_suffix_min<'a>(token: &'a str, suffix: &str, min_stem: usize) -> Option<&'a str> {
    token
        .strip_suffix(suffix)
        .filter(|stem| stem.chars().count() >= min_stem)
}

/// Lemmatize one token given its part of speech.
#[must_use]
pub fn lemmatize(token: &str, pos: PartOfSpeech) -> String {
    if let Some((lemma, _)) = irregular_lemma(token) {
        return lemma.to_string();
    }

    match pos {
        PartOfSpeech::Noun => {
            for (suffix, replacement) in [
                ("ies", "y"),
                ("sses", "ss"),
                ("ches", "ch"),
                ("shes", "sh"),
                ("xes", "x"),
                ("zes", "z"),
            ] {
                if let Some(stem) = strip_suffix_min(token, suffix, 2) {
                    return format!("{stem}{replacement}");
                }
            }
            if token.chars().count() > 3
                && token.ends_with('s')
                && !["ss", "us", "is"].iter().any(|s| token.ends_with(s))
            {
                return token[..token.len() - 1].to_string();
            }
            token.to_string()
        }
        PartOfSpeech::Verb => {
            if let Some(stem) = strip_suffix_min(token, "ies", 2) {
                return format!("{stem}y");
            }
            if let Some(stem) = strip_suffix_min(token, "ing", 3) {
                return repair_stem(stem);
            }
            if let Some(stem) = strip_suffix_min(token, "ied", 2) {
                return format!("{stem}y");
            }
            if let Some(stem) = strip_suffix_min(token, "ed", 3) {
                return repair_stem(stem);
            }
            if let Some(stem) = strip_suffix_min(token, "es", 3) {
                if ["ch", "sh", "ss", "x", "z"].iter().any(|s| stem.ends_with(s)) {
                    return stem.to_string();
                }
            }
            if token.chars().count() > 3 && token.ends_with('s') && !token.ends_with("ss") {
                return token[..token.len() - 1].to_string();
            }
            token.to_string()
        }
        PartOfSpeech::Adjective => {
            for suffix in ["iest", "ier"] {
                if let Some(stem) = strip_suffix_min(token, suffix, 2) {
                    return format!("{stem}y");
                }
            }
            for suffix in ["est", "er"] {
                if let Some(stem) = strip_suffix_min(token, suffix, 3) {
                    return repair_stem(stem);
                }
            }
            token.to_string()
        }
        PartOfSpeech::Adverb => token.to_string(),
    }
}

/// English stopwords. Negations are kept; they carry sentiment.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "an", "and", "any", "as", "at", "be",
    "because", "before", "being", "below", "between", "both", "br", "but", "by", "can", "could",
    "d", "do", "doing", "down", "during", "each", "few", "for", "from", "further", "he", "her",
    "here", "hers", "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "it",
    "its", "itself", "just", "ll", "m", "me", "more", "most", "my", "myself", "now", "o", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "re", "s", "same", "she", "should", "so", "some", "such", "t", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "ve", "very", "we", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "y", "you", "your",
    "yours", "yourself", "yourselves",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}
