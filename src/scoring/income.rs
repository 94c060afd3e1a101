//! Income band classification over four learned boundaries.

use super::{current, publish};
use crate::audit::{AuditEntry, ThresholdAuditLog};
use crate::error::Result;
use crate::feedback::FeedbackBuffer;
use crate::storage::{load_snapshot, save_snapshot, LoadSource, ScoreStore, Snapshot};
use crate::types::{ensure_finite, IncomeBand, IncomeFeedback, UpdateReport, UpdateStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

/// Smallest allowed distance between adjacent boundaries
pub const MIN_GAP: f64 = 100.0;

/// Lowest allowed poverty line
pub const POVERTY_FLOOR: f64 = 500.0;

/// Distance a corrected boundary is placed away from the triggering income
pub const ADJUSTMENT_MARGIN: f64 = 100.0;

/// Highest value any boundary may take
pub const MAX_BOUNDARY: f64 = 1.0e12;

/// One of the four cut points, named after the band directly below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    PovertyLine,
    LowIncome,
    BelowAverage,
    Average,
}

impl Boundary {
    pub const ALL: [Boundary; 4] = [
        Boundary::PovertyLine,
        Boundary::LowIncome,
        Boundary::BelowAverage,
        Boundary::Average,
    ];

    pub fn index(&self) -> usize {
        match self {
            Boundary::PovertyLine => 0,
            Boundary::LowIncome => 1,
            Boundary::BelowAverage => 2,
            Boundary::Average => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Boundary::PovertyLine => "poverty_line",
            Boundary::LowIncome => "low_income",
            Boundary::BelowAverage => "below_average",
            Boundary::Average => "average",
        }
    }
}

impl std::fmt::Display for Boundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strictly increasing boundaries `poverty_line < low_income < below_average < average`
///
/// Adjacent boundaries are at least [`MIN_GAP`] apart and the poverty line
/// never drops below [`POVERTY_FLOOR`]. Boundaries are whole currency units,
/// which keeps the gap arithmetic exact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVector {
    pub poverty_line: f64,
    pub low_income: f64,
    pub below_average: f64,
    pub average: f64,
}

impl Default for ThresholdVector {
    fn default() -> Self {
        Self {
            poverty_line: 2250.0,
            low_income: 10000.0,
            below_average: 25000.0,
            average: 45000.0,
        }
    }
}

impl ThresholdVector {
    pub fn get(&self, boundary: Boundary) -> f64 {
        match boundary {
            Boundary::PovertyLine => self.poverty_line,
            Boundary::LowIncome => self.low_income,
            Boundary::BelowAverage => self.below_average,
            Boundary::Average => self.average,
        }
    }

    fn set(&mut self, boundary: Boundary, value: f64) {
        match boundary {
            Boundary::PovertyLine => self.poverty_line = value,
            Boundary::LowIncome => self.low_income = value,
            Boundary::BelowAverage => self.below_average = value,
            Boundary::Average => self.average = value,
        }
    }

    /// Boundaries in ascending order
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.poverty_line,
            self.low_income,
            self.below_average,
            self.average,
        ]
    }

    /// First band whose upper boundary `income` is strictly below
    pub fn classify(&self, income: f64) -> IncomeBand {
        self.as_array()
            .iter()
            .position(|boundary| income < *boundary)
            .and_then(IncomeBand::from_index)
            .unwrap_or(IncomeBand::AboveAverage)
    }

    /// Check ordering, gap, and floor
    pub fn check(&self) -> std::result::Result<(), String> {
        let values = self.as_array();
        if values.iter().any(|v| !v.is_finite() || *v > MAX_BOUNDARY) {
            return Err("threshold is not a finite value within range".to_string());
        }
        if self.poverty_line < POVERTY_FLOOR {
            return Err(format!(
                "poverty_line {} is below the floor of {}",
                self.poverty_line, POVERTY_FLOOR
            ));
        }
        for (i, pair) in values.windows(2).enumerate() {
            if pair[1] - pair[0] < MIN_GAP {
                return Err(format!(
                    "{} and {} are closer than {}",
                    Boundary::ALL[i],
                    Boundary::ALL[i + 1],
                    MIN_GAP
                ));
            }
        }
        Ok(())
    }

    /// Allowed range for `boundary` given its neighbours
    fn bounds_for(&self, boundary: Boundary) -> (f64, f64) {
        let i = boundary.index();
        let lo = match i.checked_sub(1).and_then(Boundary::from_index) {
            Some(prev) => self.get(prev) + MIN_GAP,
            None => POVERTY_FLOOR,
        };
        let hi = match Boundary::from_index(i + 1) {
            Some(next) => self.get(next) - MIN_GAP,
            None => MAX_BOUNDARY,
        };
        (lo, hi)
    }
}

impl Snapshot for ThresholdVector {
    const KEY: &'static str = "income_thresholds";

    fn sanitize(self) -> std::result::Result<Self, String> {
        let rounded = Self {
            poverty_line: self.poverty_line.round(),
            low_income: self.low_income.round(),
            below_average: self.below_average.round(),
            average: self.average.round(),
        };
        rounded.check().map(|()| rounded)
    }
}

/// Boundary move for one misclassified income
///
/// The moved boundary is the one on the predicted band's side facing the
/// observed band. It is placed [`ADJUSTMENT_MARGIN`] past the income, rounded
/// to a whole unit, then clamped between its neighbours.
fn correction(
    thresholds: &ThresholdVector,
    record: &IncomeFeedback,
) -> Option<(Boundary, f64)> {
    let predicted = record.predicted.index();
    let observed = record.observed.index();

    let (boundary, target) = if observed > predicted {
        (
            Boundary::from_index(predicted)?,
            (record.income - ADJUSTMENT_MARGIN).round(),
        )
    } else if observed < predicted {
        (
            Boundary::from_index(predicted - 1)?,
            (record.income + ADJUSTMENT_MARGIN).round(),
        )
    } else {
        return None;
    };

    let (lo, hi) = thresholds.bounds_for(boundary);
    Some((boundary, target.clamp(lo, hi)))
}

/// Income → band classifier that learns its boundaries from corrections
pub struct IncomeThresholdClassifier {
    thresholds: RwLock<Arc<ThresholdVector>>,
    write_lock: Mutex<()>,
    feedback: FeedbackBuffer<IncomeFeedback>,
    store: Arc<dyn ScoreStore>,
    audit: ThresholdAuditLog,
    load_source: LoadSource,
    /// Set while the in-memory thresholds are ahead of the stored snapshot
    unsaved: AtomicBool,
}

impl IncomeThresholdClassifier {
    pub fn load(store: Arc<dyn ScoreStore>, audit: ThresholdAuditLog) -> Self {
        let loaded = load_snapshot(store.as_ref(), ThresholdVector::default);
        info!(
            source = ?loaded.source,
            thresholds = ?loaded.state.as_array(),
            "Income thresholds ready"
        );

        Self {
            thresholds: RwLock::new(Arc::new(loaded.state)),
            write_lock: Mutex::new(()),
            feedback: FeedbackBuffer::new(),
            store,
            audit,
            load_source: loaded.source,
            unsaved: AtomicBool::new(false),
        }
    }

    pub fn load_source(&self) -> LoadSource {
        self.load_source
    }

    pub fn thresholds(&self) -> ThresholdVector {
        *current(&self.thresholds)
    }

    pub fn classify(&self, income: f64) -> IncomeBand {
        current(&self.thresholds).classify(income)
    }

    /// Buffer a correction, returning the number of buffered records
    pub fn record_feedback(
        &self,
        income: f64,
        predicted: IncomeBand,
        observed: IncomeBand,
    ) -> Result<usize> {
        ensure_finite("income", income)?;
        let pending = self.feedback.push(IncomeFeedback {
            income,
            predicted,
            observed,
            recorded_at: Utc::now(),
        });
        debug!(pending, %predicted, %observed, "Income feedback recorded");
        Ok(pending)
    }

    pub fn pending_feedback(&self) -> usize {
        self.feedback.len()
    }

    /// Fold buffered corrections into the thresholds
    ///
    /// Records whose predicted and observed bands agree carry no signal and
    /// are skipped. The snapshot is written when a boundary moved or when an
    /// earlier write failed; the buffer is cleared either way.
    pub fn update(&self) -> UpdateReport {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.feedback.drain();
        if records.is_empty() {
            debug!("No income feedback to learn from");
            return UpdateReport::noop();
        }

        let mut next = self.thresholds();
        let mut changed = 0;
        for record in &records {
            let Some((boundary, new_value)) = correction(&next, record) else {
                continue;
            };
            let old_value = next.get(boundary);
            if new_value == old_value {
                continue;
            }

            next.set(boundary, new_value);
            changed += 1;
            debug!(%boundary, old_value, new_value, income = record.income, "Income boundary moved");

            self.audit.append(&AuditEntry {
                timestamp: Utc::now(),
                boundary,
                old_value,
                new_value,
                income: record.income,
                reason: format!(
                    "observed {}, predicted {}",
                    record.observed.as_str(),
                    record.predicted.as_str()
                ),
            });
        }

        if changed > 0 {
            publish(&self.thresholds, next);
        }
        let persisted = if changed > 0 || self.unsaved.load(Ordering::SeqCst) {
            let saved = save_snapshot(self.store.as_ref(), &next);
            self.unsaved.store(!saved, Ordering::SeqCst);
            saved
        } else {
            false
        };

        info!(
            records = records.len(),
            changed,
            persisted,
            "Income thresholds updated"
        );

        UpdateReport {
            status: UpdateStatus::Applied,
            records: records.len(),
            changed,
            persisted,
        }
    }
}

impl std::fmt::Debug for IncomeThresholdClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncomeThresholdClassifier")
            .field("thresholds", &self.thresholds())
            .field("pending_feedback", &self.pending_feedback())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::FlakyStore;
    use crate::storage::MemoryStore;
    use tempfile::TempDir;

    fn classifier() -> IncomeThresholdClassifier {
        IncomeThresholdClassifier::load(Arc::new(MemoryStore::new()), ThresholdAuditLog::disabled())
    }

    #[test]
    fn test_default_classification() {
        let c = classifier();
        assert_eq!(c.classify(1500.0), IncomeBand::BelowPoverty);
        assert_eq!(c.classify(2250.0), IncomeBand::Low);
        assert_eq!(c.classify(9999.0), IncomeBand::Low);
        assert_eq!(c.classify(25000.0), IncomeBand::Average);
        assert_eq!(c.classify(30000.0), IncomeBand::Average);
        assert_eq!(c.classify(45000.0), IncomeBand::AboveAverage);
        assert_eq!(c.load_source(), LoadSource::Absent);
    }

    #[test]
    fn test_correct_prediction_skipped() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let c = IncomeThresholdClassifier::load(store.clone(), ThresholdAuditLog::disabled());
        c.record_feedback(5000.0, IncomeBand::Low, IncomeBand::Low).unwrap();

        let report = c.update();
        assert!(report.applied());
        assert_eq!(report.records, 1);
        assert_eq!(report.changed, 0);
        assert!(!report.persisted);
        assert_eq!(store.write_count(), 0);
        assert_eq!(c.pending_feedback(), 0);
        assert_eq!(c.thresholds(), ThresholdVector::default());
    }

    #[test]
    fn test_observed_higher_lowers_upper_boundary() {
        let c = classifier();
        // 9000 predicted Low, actually BelowAverage: low_income moves down to 8900
        c.record_feedback(9000.0, IncomeBand::Low, IncomeBand::BelowAverage)
            .unwrap();
        let report = c.update();
        assert_eq!(report.changed, 1);
        assert!(report.persisted);
        assert_eq!(c.thresholds().low_income, 8900.0);
        assert_eq!(c.classify(9000.0), IncomeBand::BelowAverage);
    }

    #[test]
    fn test_observed_lower_raises_lower_boundary() {
        let c = classifier();
        // 12000 predicted BelowAverage, actually Low: low_income moves up to 12100
        c.record_feedback(12000.0, IncomeBand::BelowAverage, IncomeBand::Low)
            .unwrap();
        c.update();
        assert_eq!(c.thresholds().low_income, 12100.0);
        assert_eq!(c.classify(12000.0), IncomeBand::Low);
    }

    #[test]
    fn test_move_is_clamped_by_neighbours() {
        let c = classifier();
        // Wants low_income at 30100, capped at below_average - 100
        c.record_feedback(30000.0, IncomeBand::BelowAverage, IncomeBand::Low)
            .unwrap();
        c.update();
        assert_eq!(c.thresholds().low_income, 24900.0);
        assert!(c.thresholds().check().is_ok());
    }

    #[test]
    fn test_poverty_floor() {
        let c = classifier();
        c.record_feedback(100.0, IncomeBand::BelowPoverty, IncomeBand::Low)
            .unwrap();
        c.update();
        assert_eq!(c.thresholds().poverty_line, POVERTY_FLOOR);
    }

    #[test]
    fn test_average_moves_up_freely() {
        let c = classifier();
        c.record_feedback(90000.0, IncomeBand::AboveAverage, IncomeBand::Average)
            .unwrap();
        c.update();
        assert_eq!(c.thresholds().average, 90100.0);
    }

    #[test]
    fn test_multi_hop_moves_only_adjacent_boundary() {
        let c = classifier();
        c.record_feedback(9500.0, IncomeBand::Low, IncomeBand::AboveAverage)
            .unwrap();
        c.update();

        let t = c.thresholds();
        assert_eq!(t.low_income, 9400.0);
        assert_eq!(t.poverty_line, 2250.0);
        assert_eq!(t.below_average, 25000.0);
        assert_eq!(t.average, 45000.0);
        // One step closer, not all the way
        assert_eq!(c.classify(9500.0), IncomeBand::BelowAverage);
    }

    #[test]
    fn test_empty_update_is_noop() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let c = IncomeThresholdClassifier::load(store.clone(), ThresholdAuditLog::disabled());
        assert!(c.update().is_noop());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_failed_persist_retried_on_next_update() {
        let store = Arc::new(FlakyStore::new(MemoryStore::new()));
        let c = IncomeThresholdClassifier::load(store.clone(), ThresholdAuditLog::disabled());
        store.fail_writes(true);

        c.record_feedback(9000.0, IncomeBand::Low, IncomeBand::BelowAverage)
            .unwrap();
        let report = c.update();
        assert_eq!(report.changed, 1);
        assert!(!report.persisted);
        assert_eq!(c.thresholds().low_income, 8900.0);

        // A later update with nothing to move still writes the pending table
        store.fail_writes(false);
        c.record_feedback(5000.0, IncomeBand::Low, IncomeBand::Low)
            .unwrap();
        let report = c.update();
        assert_eq!(report.changed, 0);
        assert!(report.persisted);
        assert_eq!(store.write_count(), 1);

        let reloaded = IncomeThresholdClassifier::load(store.clone(), ThresholdAuditLog::disabled());
        assert_eq!(reloaded.load_source(), LoadSource::Snapshot);
        assert_eq!(reloaded.thresholds().low_income, 8900.0);

        // Once saved, agreeing feedback goes back to writing nothing
        c.record_feedback(5000.0, IncomeBand::Low, IncomeBand::Low)
            .unwrap();
        assert!(!c.update().persisted);
        assert_eq!(store.write_count(), 1);
        assert!(c.update().is_noop());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_audit_log_written_per_move() {
        let temp = TempDir::new().unwrap();
        let audit = ThresholdAuditLog::to_file(temp.path().join("audit.jsonl"));
        let c = IncomeThresholdClassifier::load(Arc::new(MemoryStore::new()), audit.clone());

        c.record_feedback(9000.0, IncomeBand::Low, IncomeBand::BelowAverage)
            .unwrap();
        c.record_feedback(5000.0, IncomeBand::Low, IncomeBand::Low)
            .unwrap();
        c.record_feedback(2000.0, IncomeBand::BelowPoverty, IncomeBand::Low)
            .unwrap();
        c.update();

        let entries = audit.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].boundary, Boundary::LowIncome);
        assert_eq!(entries[0].old_value, 10000.0);
        assert_eq!(entries[0].new_value, 8900.0);
        assert_eq!(entries[0].income, 9000.0);
        assert_eq!(entries[1].boundary, Boundary::PovertyLine);
        assert_eq!(entries[1].new_value, 1900.0);
    }

    #[test]
    fn test_invalid_snapshot_is_corrupt() {
        let store = Arc::new(MemoryStore::new());
        store
            .write(
                ThresholdVector::KEY,
                r#"{"poverty_line": 5000, "low_income": 4000, "below_average": 25000, "average": 45000}"#,
            )
            .unwrap();
        let c = IncomeThresholdClassifier::load(store, ThresholdAuditLog::disabled());
        assert_eq!(c.load_source(), LoadSource::Corrupt);
        assert_eq!(c.thresholds(), ThresholdVector::default());
    }

    #[test]
    fn test_boundaries_stay_whole_units() {
        let c = classifier();
        c.record_feedback(12345.67, IncomeBand::BelowAverage, IncomeBand::Low)
            .unwrap();
        c.update();
        assert_eq!(c.thresholds().low_income, 12446.0);
        assert_eq!(c.classify(12345.67), IncomeBand::Low);
    }

    #[test]
    fn test_snapshot_values_rounded_on_load() {
        let raw = ThresholdVector {
            poverty_line: 2250.4,
            low_income: 10000.6,
            below_average: 25000.0,
            average: 45000.0,
        };
        let clean = raw.sanitize().unwrap();
        assert_eq!(clean.poverty_line, 2250.0);
        assert_eq!(clean.low_income, 10001.0);
    }

    #[test]
    fn test_non_finite_income_rejected() {
        let c = classifier();
        assert!(c
            .record_feedback(f64::NAN, IncomeBand::Low, IncomeBand::Average)
            .is_err());
    }
}
