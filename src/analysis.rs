//! Batch summaries over survey rows
//!
//! Each summary reads one column, skips rows where that column is missing or
//! blank, and aggregates per-category counts. Averages are rounded to two
//! decimal places and are 0 when no row contributed.

use crate::scoring::{
    BackgroundScorer, BehaviorScorer, IncomeThresholdClassifier, RankedTrait, ThresholdVector,
    TraitFrequency, TraitWeighter,
};
use crate::types::{ImpactCategory, IncomeBand, SentimentCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// How many ranked traits a role-model summary keeps
pub const TOP_TRAITS: usize = 5;

/// One survey response; column names from the survey export are accepted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyRow {
    #[serde(default, alias = "Background of the Child ", alias = "Background of the Child")]
    pub background: Option<String>,

    #[serde(default, alias = "Family Income ", alias = "Family Income")]
    pub family_income: Option<IncomeValue>,

    #[serde(default, alias = "Role models", alias = "Role Models")]
    pub role_models: Option<String>,

    #[serde(default, alias = "Behavioral Impact", alias = "Behavioural Impact")]
    pub behavioral_impact: Option<String>,
}

/// Income cell: a number, or text holding one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncomeValue {
    Number(f64),
    Text(String),
}

impl IncomeValue {
    /// Numeric value; `None` for text that does not parse or is not finite
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            IncomeValue::Number(n) => *n,
            IncomeValue::Text(s) => s.trim().replace(',', "").parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for IncomeValue {
    fn from(value: f64) -> Self {
        IncomeValue::Number(value)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        round2(total / count as f64)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn empty_sentiment_counts() -> BTreeMap<SentimentCategory, usize> {
    SentimentCategory::ALL.iter().map(|c| (*c, 0)).collect()
}

/// Per-row detail in a [`BackgroundSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundDetail {
    pub background: String,
    pub score: f64,
    pub category: SentimentCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSummary {
    pub counts: BTreeMap<SentimentCategory, usize>,
    pub positive_count: usize,
    pub neutral_count: usize,
    pub negative_count: usize,
    pub average_score: f64,
    pub details: Vec<BackgroundDetail>,
}

impl BackgroundSummary {
    pub fn collect(scorer: &BackgroundScorer, rows: &[SurveyRow]) -> Self {
        let mut counts = empty_sentiment_counts();
        let mut details = Vec::new();
        let mut total = 0.0;

        for label in rows.iter().filter_map(|row| non_blank(&row.background)) {
            let Ok(result) = scorer.score(label) else {
                continue;
            };
            total += result.score;
            *counts.entry(result.category).or_default() += 1;
            details.push(BackgroundDetail {
                background: label.to_string(),
                score: round2(result.score),
                category: result.category,
            });
        }

        let sum_where = |pred: fn(&SentimentCategory) -> bool| {
            counts
                .iter()
                .filter(|(c, _)| pred(c))
                .map(|(_, n)| n)
                .sum::<usize>()
        };

        Self {
            positive_count: sum_where(SentimentCategory::is_positive),
            neutral_count: counts[&SentimentCategory::Neutral],
            negative_count: sum_where(SentimentCategory::is_negative),
            average_score: average(total, details.len()),
            counts,
            details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSummary {
    pub counts: BTreeMap<IncomeBand, usize>,
    pub households: usize,
    pub average_income: f64,
    pub thresholds: ThresholdVector,
}

impl IncomeSummary {
    pub fn collect(classifier: &IncomeThresholdClassifier, rows: &[SurveyRow]) -> Self {
        let mut counts: BTreeMap<IncomeBand, usize> =
            IncomeBand::ALL.iter().map(|b| (*b, 0)).collect();
        let mut households = 0;
        let mut total = 0.0;

        for income in rows
            .iter()
            .filter_map(|row| row.family_income.as_ref().and_then(IncomeValue::as_f64))
        {
            *counts.entry(classifier.classify(income)).or_default() += 1;
            households += 1;
            total += income;
        }

        Self {
            counts,
            households,
            average_income: average(total, households),
            thresholds: classifier.thresholds(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModelSummary {
    pub positive_impact: usize,
    pub neutral_impact: usize,
    pub negative_impact: usize,
    /// Matched role-model categories across all rows
    pub influential_count: usize,
    pub total_traits: u64,
    pub top_traits: Vec<RankedTrait>,
}

impl RoleModelSummary {
    /// Runs every answer through the trait pipeline, reinforcing weights as it goes
    pub fn collect(weighter: &TraitWeighter, rows: &[SurveyRow]) -> Self {
        let mut frequency = TraitFrequency::new();
        let mut summary = Self {
            positive_impact: 0,
            neutral_impact: 0,
            negative_impact: 0,
            influential_count: 0,
            total_traits: 0,
            top_traits: Vec::new(),
        };

        for text in rows.iter().filter_map(|row| non_blank(&row.role_models)) {
            let observation = weighter.observe(text);
            summary.influential_count += observation.extraction.matched_categories.len();
            frequency.extend(&observation.extraction.traits);

            match observation.impact {
                Some(ImpactCategory::Positive) => summary.positive_impact += 1,
                Some(ImpactCategory::Neutral) => summary.neutral_impact += 1,
                Some(ImpactCategory::Negative) => summary.negative_impact += 1,
                None => {}
            }
        }

        summary.total_traits = frequency.total();
        summary.top_traits = weighter
            .ranked_traits(&frequency)
            .into_iter()
            .take(TOP_TRAITS)
            .collect();
        debug!(distinct = frequency.len(), "Role-model traits ranked");
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSummary {
    pub counts: BTreeMap<SentimentCategory, usize>,
    pub average_score: f64,
    pub responses: usize,
}

impl BehaviorSummary {
    pub fn collect(scorer: &BehaviorScorer, rows: &[SurveyRow]) -> Self {
        let mut counts = empty_sentiment_counts();
        let mut responses = 0;
        let mut total = 0.0;

        for text in rows.iter().filter_map(|row| non_blank(&row.behavioral_impact)) {
            let result = scorer.score(text);
            *counts.entry(result.category).or_default() += 1;
            responses += 1;
            total += result.score;
        }

        Self {
            counts,
            average_score: average(total, responses),
            responses,
        }
    }
}

/// Summaries for every column of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyReport {
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub background: BackgroundSummary,
    pub income: IncomeSummary,
    pub role_models: RoleModelSummary,
    pub behavior: BehaviorSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_accepts_export_column_names() {
        let json = r#"{
            "Background of the Child ": "Tailor",
            "Family Income ": "12,500",
            "Role models": "a doctor",
            "Behavioral Impact": "improved"
        }"#;
        let row: SurveyRow = serde_json::from_str(json).unwrap();
        assert_eq!(row.background.as_deref(), Some("Tailor"));
        assert_eq!(row.family_income.and_then(|v| v.as_f64()), Some(12500.0));
        assert_eq!(row.role_models.as_deref(), Some("a doctor"));
        assert_eq!(row.behavioral_impact.as_deref(), Some("improved"));
    }

    #[test]
    fn test_row_missing_fields() {
        let row: SurveyRow = serde_json::from_str(r#"{"family_income": 3000}"#).unwrap();
        assert!(row.background.is_none());
        assert_eq!(row.family_income, Some(IncomeValue::Number(3000.0)));
    }

    #[test]
    fn test_income_value_parsing() {
        assert_eq!(IncomeValue::Text("n/a".into()).as_f64(), None);
        assert_eq!(IncomeValue::Text(" 4000 ".into()).as_f64(), Some(4000.0));
        assert_eq!(IncomeValue::Number(f64::NAN).as_f64(), None);
    }

    #[test]
    fn test_behavior_summary() {
        let rows = vec![
            SurveyRow {
                behavioral_impact: Some("excellent and improved".into()),
                ..Default::default()
            },
            SurveyRow {
                behavioral_impact: Some("a serious issue".into()),
                ..Default::default()
            },
            SurveyRow {
                behavioral_impact: Some("   ".into()),
                ..Default::default()
            },
            SurveyRow::default(),
        ];
        let summary = BehaviorSummary::collect(&BehaviorScorer::new(), &rows);
        assert_eq!(summary.responses, 2);
        assert_eq!(summary.average_score, 3.0);
        assert_eq!(summary.counts[&SentimentCategory::HighlyPositive], 1);
        assert_eq!(summary.counts[&SentimentCategory::HighlyNegative], 1);
        assert_eq!(summary.counts[&SentimentCategory::Neutral], 0);
    }

    #[test]
    fn test_empty_behavior_summary_average_is_zero() {
        let summary = BehaviorSummary::collect(&BehaviorScorer::new(), &[]);
        assert_eq!(summary.responses, 0);
        assert_eq!(summary.average_score, 0.0);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(average(10.0, 3), 3.33);
    }
}
