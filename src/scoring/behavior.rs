//! Keyword scorer for behavioural-impact answers. Holds no learned state.

use crate::types::SentimentCategory;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static NON_LETTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z\s]").expect("Valid non-letter regex"));

const HIGHLY_NEGATIVE: &[&str] = &[
    "severe", "serious", "critical", "extreme", "very bad", "very poor", "worse",
];
const NEGATIVE: &[&str] = &[
    "difficult", "problem", "issue", "poor", "bad", "worse", "negative", "lack",
];
const POSITIVE: &[&str] = &[
    "excellent", "outstanding", "improved", "better", "positive", "good", "well", "progress",
    "no effect",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorScore {
    pub score: f64,
    pub category: SentimentCategory,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BehaviorScorer;

impl BehaviorScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score a free-text answer on the 1–5 scale
    ///
    /// Any highly negative keyword gives 1, else any negative keyword 2.
    /// Otherwise two or more positive keywords give 5, one gives 4, and none
    /// gives neutral 3.
    pub fn score(&self, text: &str) -> BehaviorScore {
        let cleaned = clean_text(text);
        let hits = |keywords: &[&str]| keywords.iter().filter(|k| cleaned.contains(*k)).count();

        let score = if hits(HIGHLY_NEGATIVE) > 0 {
            1.0
        } else if hits(NEGATIVE) > 0 {
            2.0
        } else {
            match hits(POSITIVE) {
                0 => 3.0,
                1 => 4.0,
                _ => 5.0,
            }
        };

        BehaviorScore {
            score,
            category: SentimentCategory::from_score(score),
        }
    }
}

/// Lower-case and drop everything but letters and whitespace
fn clean_text(text: &str) -> String {
    NON_LETTERS
        .replace_all(&text.to_lowercase(), "")
        .trim()
        .to_string()
}
