//! Adaptive scorers
//!
//! Each scorer owns one table, serves reads from an immutable `Arc` snapshot
//! of it, and replaces that snapshot wholesale when feedback is folded in.
//! Writers (`update`, `reinforce`, lazy inserts) serialize on a per-scorer
//! mutex; readers never take it, so a score request sees either the table
//! before an update or the table after it, never a mix.
//!
//! - [`background::BackgroundScorer`]: occupation → 1–5 sentiment
//! - [`income::IncomeThresholdClassifier`]: income → ordered band
//! - [`traits::TraitWeighter`]: role-model text → weighted traits
//! - [`behavior::BehaviorScorer`]: behavioural-impact text → 1–5 sentiment (stateless)

pub mod background;
pub mod behavior;
pub mod income;
pub mod traits;

pub use background::{BackgroundScore, BackgroundScorer, ScoreTable};
pub use behavior::{BehaviorScore, BehaviorScorer};
pub use income::{Boundary, IncomeThresholdClassifier, ThresholdVector};
pub use traits::{
    RankedTrait, RoleModelCatalog, RoleModelCategory, TraitExtraction, TraitFrequency,
    TraitObservation, TraitWeightTable, TraitWeighter,
};

use std::sync::{Arc, PoisonError, RwLock};

/// Current table behind a swap lock
pub(crate) fn current<T>(table: &RwLock<Arc<T>>) -> Arc<T> {
    Arc::clone(&table.read().unwrap_or_else(PoisonError::into_inner))
}

/// Publish a new table; readers holding the old `Arc` keep seeing it whole
pub(crate) fn publish<T>(table: &RwLock<Arc<T>>, next: T) {
    *table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
}
