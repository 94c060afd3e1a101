//! Core data types shared by the scorers
//!
//! Defines the bounded category sets each scorer produces, the feedback
//! records the scorers buffer between updates, and the status report every
//! `update()` returns.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Five-way sentiment bucket for a 1–5 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentCategory {
    HighlyPositive,
    Positive,
    Neutral,
    Negative,
    HighlyNegative,
}

impl SentimentCategory {
    /// All categories, most positive first
    pub const ALL: [SentimentCategory; 5] = [
        SentimentCategory::HighlyPositive,
        SentimentCategory::Positive,
        SentimentCategory::Neutral,
        SentimentCategory::Negative,
        SentimentCategory::HighlyNegative,
    ];

    /// Bucket a score on the 1–5 scale
    ///
    /// - `>= 4.5` → HighlyPositive
    /// - `>= 3.5` → Positive
    /// - `>= 2.5` → Neutral
    /// - `>= 1.5` → Negative
    /// - otherwise → HighlyNegative
    pub fn from_score(score: f64) -> Self {
        if score >= 4.5 {
            SentimentCategory::HighlyPositive
        } else if score >= 3.5 {
            SentimentCategory::Positive
        } else if score >= 2.5 {
            SentimentCategory::Neutral
        } else if score >= 1.5 {
            SentimentCategory::Negative
        } else {
            SentimentCategory::HighlyNegative
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            SentimentCategory::HighlyPositive | SentimentCategory::Positive
        )
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            SentimentCategory::Negative | SentimentCategory::HighlyNegative
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentCategory::HighlyPositive => "highly_positive",
            SentimentCategory::Positive => "positive",
            SentimentCategory::Neutral => "neutral",
            SentimentCategory::Negative => "negative",
            SentimentCategory::HighlyNegative => "highly_negative",
        }
    }
}

impl std::fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentCategory::HighlyPositive => write!(f, "Highly Positive"),
            SentimentCategory::Positive => write!(f, "Positive"),
            SentimentCategory::Neutral => write!(f, "Neutral"),
            SentimentCategory::Negative => write!(f, "Negative"),
            SentimentCategory::HighlyNegative => write!(f, "Highly Negative"),
        }
    }
}

/// Ordered income band, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeBand {
    BelowPoverty,
    Low,
    BelowAverage,
    Average,
    AboveAverage,
}

impl IncomeBand {
    /// All bands in ascending order
    pub const ALL: [IncomeBand; 5] = [
        IncomeBand::BelowPoverty,
        IncomeBand::Low,
        IncomeBand::BelowAverage,
        IncomeBand::Average,
        IncomeBand::AboveAverage,
    ];

    /// Position in the ascending band order (0..=4)
    pub fn index(&self) -> usize {
        match self {
            IncomeBand::BelowPoverty => 0,
            IncomeBand::Low => 1,
            IncomeBand::BelowAverage => 2,
            IncomeBand::Average => 3,
            IncomeBand::AboveAverage => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeBand::BelowPoverty => "below_poverty",
            IncomeBand::Low => "low",
            IncomeBand::BelowAverage => "below_average",
            IncomeBand::Average => "average",
            IncomeBand::AboveAverage => "above_average",
        }
    }
}

impl std::fmt::Display for IncomeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IncomeBand::BelowPoverty => write!(f, "Below Poverty Line"),
            IncomeBand::Low => write!(f, "Low Income"),
            IncomeBand::BelowAverage => write!(f, "Below Average"),
            IncomeBand::Average => write!(f, "Average"),
            IncomeBand::AboveAverage => write!(f, "Above Average"),
        }
    }
}

impl FromStr for IncomeBand {
    type Err = EngineError;

    /// Accepts snake_case, the long survey labels, and CamelCase names
    fn from_str(s: &str) -> Result<Self> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "belowpoverty" | "belowpovertyline" | "poverty" => Ok(IncomeBand::BelowPoverty),
            "low" | "lowincome" => Ok(IncomeBand::Low),
            "belowaverage" | "belowavg" => Ok(IncomeBand::BelowAverage),
            "average" | "avg" => Ok(IncomeBand::Average),
            "aboveaverage" | "aboveavg" => Ok(IncomeBand::AboveAverage),
            _ => Err(EngineError::InvalidLabel(s.to_string())),
        }
    }
}

/// Aggregate impact of the role models named in one answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactCategory {
    Positive,
    Neutral,
    Negative,
}

impl ImpactCategory {
    /// `avg >= 4` → Positive, `avg >= 3` → Neutral, else Negative
    pub fn from_average(avg: f64) -> Self {
        if avg >= 4.0 {
            ImpactCategory::Positive
        } else if avg >= 3.0 {
            ImpactCategory::Neutral
        } else {
            ImpactCategory::Negative
        }
    }
}

impl std::fmt::Display for ImpactCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImpactCategory::Positive => write!(f, "positive"),
            ImpactCategory::Neutral => write!(f, "neutral"),
            ImpactCategory::Negative => write!(f, "negative"),
        }
    }
}

/// Correction of a previously returned occupation score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundFeedback {
    /// Normalized occupation label
    pub label: String,
    pub predicted: f64,
    pub observed: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Correction of a previously returned income band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeFeedback {
    pub income: f64,
    pub predicted: IncomeBand,
    pub observed: IncomeBand,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of an `update()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// Buffer was empty; nothing was read, changed, or written
    NoOp,
    /// Buffered feedback was folded into the table
    Applied,
}

/// Report generated after folding feedback into a scorer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub status: UpdateStatus,

    /// Feedback records drained from the buffer
    pub records: usize,

    /// Table entries (scores or boundaries) whose value moved
    pub changed: usize,

    /// Whether a snapshot write happened and succeeded
    pub persisted: bool,
}

impl UpdateReport {
    pub fn noop() -> Self {
        Self {
            status: UpdateStatus::NoOp,
            records: 0,
            changed: 0,
            persisted: false,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.status == UpdateStatus::NoOp
    }

    pub fn applied(&self) -> bool {
        self.status == UpdateStatus::Applied
    }
}

/// Reject values the clamp arithmetic cannot carry
pub(crate) fn ensure_finite(name: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(EngineError::InvalidFeedback(format!(
            "{} must be a finite number, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_thresholds() {
        assert_eq!(SentimentCategory::from_score(5.0), SentimentCategory::HighlyPositive);
        assert_eq!(SentimentCategory::from_score(4.5), SentimentCategory::HighlyPositive);
        assert_eq!(SentimentCategory::from_score(4.49), SentimentCategory::Positive);
        assert_eq!(SentimentCategory::from_score(3.5), SentimentCategory::Positive);
        assert_eq!(SentimentCategory::from_score(3.0), SentimentCategory::Neutral);
        assert_eq!(SentimentCategory::from_score(2.5), SentimentCategory::Neutral);
        assert_eq!(SentimentCategory::from_score(1.5), SentimentCategory::Negative);
        assert_eq!(SentimentCategory::from_score(1.0), SentimentCategory::HighlyNegative);
    }

    #[test]
    fn test_income_band_parsing_aliases() {
        assert_eq!("below_poverty_line".parse::<IncomeBand>().unwrap(), IncomeBand::BelowPoverty);
        assert_eq!("BelowPoverty".parse::<IncomeBand>().unwrap(), IncomeBand::BelowPoverty);
        assert_eq!("low_income".parse::<IncomeBand>().unwrap(), IncomeBand::Low);
        assert_eq!("Below Average".parse::<IncomeBand>().unwrap(), IncomeBand::BelowAverage);
        assert_eq!("average".parse::<IncomeBand>().unwrap(), IncomeBand::Average);
        assert_eq!("above-average".parse::<IncomeBand>().unwrap(), IncomeBand::AboveAverage);
        assert!(matches!(
            "middle class".parse::<IncomeBand>(),
            Err(EngineError::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_income_band_index_round_trip() {
        for band in IncomeBand::ALL {
            assert_eq!(IncomeBand::from_index(band.index()), Some(band));
        }
        assert_eq!(IncomeBand::from_index(5), None);
    }

    #[test]
    fn test_impact_from_average() {
        assert_eq!(ImpactCategory::from_average(5.0), ImpactCategory::Positive);
        assert_eq!(ImpactCategory::from_average(4.0), ImpactCategory::Positive);
        assert_eq!(ImpactCategory::from_average(3.5), ImpactCategory::Neutral);
        assert_eq!(ImpactCategory::from_average(2.9), ImpactCategory::Negative);
    }

    #[test]
    fn test_ensure_finite() {
        assert!(ensure_finite("observed", 3.0).is_ok());
        assert!(ensure_finite("observed", f64::NAN).is_err());
        assert!(ensure_finite("income", f64::INFINITY).is_err());
    }

    #[test]
    fn test_noop_report() {
        let report = UpdateReport::noop();
        assert!(report.is_noop());
        assert!(!report.applied());
        assert!(!report.persisted);
    }
}
