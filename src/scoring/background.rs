//! Occupation sentiment scoring with online correction.
//!
//! Maps the occupation named in a "background of the child" answer to a
//! sentiment score on the 1–5 scale. Unknown occupations enter the table at
//! neutral (3.0) the first time they are scored. Feedback is buffered and
//! folded in on [`BackgroundScorer::update`]:
//!
//! ```text
//! new = clamp(old + learning_rate * (observed - predicted), 1, 5)
//! ```

use super::{current, publish};
use crate::config::BackgroundConfig;
use crate::error::{EngineError, Result};
use crate::exploration::ExplorationPolicy;
use crate::feedback::FeedbackBuffer;
use crate::storage::{load_snapshot, save_snapshot, LoadSource, ScoreStore, Snapshot};
use crate::types::{ensure_finite, BackgroundFeedback, SentimentCategory, UpdateReport, UpdateStatus};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

pub const MIN_SCORE: f64 = 1.0;
pub const MAX_SCORE: f64 = 5.0;

/// Score given to an occupation the first time it is seen
pub const NEUTRAL_SCORE: f64 = 3.0;

/// Built-in occupation scores used when no snapshot exists
const DEFAULT_SCORES: &[(&str, f64)] = &[
    ("Tailor", 3.0), ("Labour", 2.0), ("Driver", 3.0), ("Factory", 2.0), ("Farming", 3.0),
    ("Furniture", 3.0), ("Maid", 2.0), ("Middle Class", 4.0), ("Nan", 1.0), ("No Effect", 3.0),
    ("Painter", 3.0), ("Plumber", 4.0), ("Poor", 1.0), ("Priest", 4.0), ("Private Job", 4.0),
    ("Ragpicker", 1.0), ("Shopkeeper", 3.0), ("Single Mother Parent", 3.0), ("Sweetseller", 3.0),
    ("Tea Seller", 3.0), ("Vendor", 3.0), ("Welding", 3.0), ("Wood Cutter", 2.0),
    ("Security Guard", 2.0), ("Housekeeper", 2.0), ("Daily Wage Worker", 1.0),
    ("Rickshaw Puller", 1.0), ("Street Vendor", 3.0), ("Electrician", 4.0), ("Hawker", 2.0),
    ("Coolie", 1.0), ("Fisherman", 3.0), ("Mechanic", 4.0), ("Construction Worker", 2.0),
    ("Cobbler", 2.0), ("Barber", 3.0), ("Milkman", 3.0), ("Blacksmith", 3.0), ("Goldsmith", 4.0),
    ("Potter", 3.0), ("Weaver", 3.0), ("Shepherd", 3.0), ("Priestess", 4.0), ("Beggar", 1.0),
    ("Fruit Seller", 3.0), ("Florist", 3.0), ("Brick Kiln Worker", 2.0), ("Cook", 4.0),
    ("Watchman", 2.0), ("Sweeper", 2.0), ("Garbage Collector", 1.0), ("Gardener", 3.0),
    ("Newspaper Vendor", 3.0), ("Call Center Employee", 3.0), ("Delivery Person", 3.0),
    ("Small-scale Business Owner", 4.0), ("Government Clerk", 4.0), ("Army Personnel", 5.0),
    ("Police Constable", 4.0), ("NGO Worker", 4.0), ("Taxi Driver", 3.0), ("Truck Driver", 2.0),
    ("Factory Supervisor", 3.0), ("Small Farmer", 2.0), ("Landless Labourer", 1.0),
    ("Carpenter Helper", 2.0), ("Tailoring Assistant", 3.0), ("Street Performer", 4.0),
    ("Singer", 4.0), ("Actor", 5.0), ("Dancer", 4.0), ("Wedding Planner", 4.0),
    ("Laboratory Technician", 4.0), ("Storekeeper", 3.0), ("Beautician", 4.0), ("Housewife", 2.0),
    ("Retired Pensioner", 4.0), ("College Professor", 5.0), ("Shop Assistant", 3.0),
    ("Digital Marketer", 4.0), ("Graphic Designer", 4.0), ("Web Developer", 4.0),
    ("Software Engineer", 5.0), ("Photographer", 4.0), ("Social Worker", 4.0), ("Caregiver", 4.0),
    ("Architect", 5.0), ("Fashion Designer", 5.0), ("Interior Designer", 5.0),
    ("Public Relations Executive", 4.0), ("Marketing Executive", 4.0), ("Researcher", 5.0),
    ("Taxi Owner", 3.0), ("Dry Cleaner", 3.0), ("Food Delivery Executive", 3.0),
    ("Street Food Vendor", 3.0), ("Shoe Polisher", 2.0), ("Travel Agent", 4.0), ("Importer", 5.0),
    ("Exporter", 5.0), ("Corporate Manager", 5.0), ("Teacher", 4.0), ("Journalist", 4.0),
    ("Accountant", 4.0), ("Bank Clerk", 4.0), ("Receptionist", 3.0), ("Hotel Manager", 4.0),
    ("Real Estate Agent", 4.0), ("Entrepreneur", 5.0), ("Consultant", 5.0),
    ("Self-employed Artisan", 4.0), ("Caretaker", 4.0), ("Security Supervisor", 3.0),
    ("Veterinary Doctor", 4.0), ("Government Official", 4.0), ("Real Estate Developer", 5.0),
    ("Telephone Operator", 3.0), ("Travel Guide", 4.0), ("Tailoring Entrepreneur", 4.0),
    ("Rideshare Driver", 3.0), ("Mushroom Cultivator", 3.0), ("Organic Farmer", 4.0),
    ("Biotech Worker", 5.0), ("Supply Chain Manager", 5.0), ("Product Designer", 5.0),
    ("Public Health Worker", 4.0), ("Small-Scale Industrialist", 4.0),
    ("Organic Product Seller", 4.0), ("Community Organizer", 4.0), ("Data Entry Operator", 3.0),
    ("Tiffin Service Provider", 3.0), ("Computer Technician", 4.0),
];

/// Case- and whitespace-insensitive table key for an occupation label
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Occupation → score table; every score lies in `[1, 5]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreTable(BTreeMap<String, f64>);

impl ScoreTable {
    /// Built-in occupation table
    pub fn defaults() -> Self {
        Self(
            DEFAULT_SCORES
                .iter()
                .map(|(label, score)| (normalize_label(label), *score))
                .collect(),
        )
    }

    /// Score for an already-normalized label
    pub fn get(&self, label: &str) -> Option<f64> {
        self.0.get(label).copied()
    }

    /// Insert a score, normalizing the label and clamping the score
    pub fn insert(&mut self, label: &str, score: f64) {
        self.0
            .insert(normalize_label(label), score.clamp(MIN_SCORE, MAX_SCORE));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(label, score)| (label.as_str(), *score))
    }
}

impl Snapshot for ScoreTable {
    const KEY: &'static str = "background_scores";

    fn sanitize(self) -> std::result::Result<Self, String> {
        let mut table = ScoreTable::default();
        for (label, score) in self.0 {
            if !score.is_finite() {
                return Err(format!("score for {:?} is not finite", label));
            }
            table.insert(&label, score);
        }
        Ok(table)
    }
}

/// Result of scoring one occupation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundScore {
    /// Normalized label the score was looked up under
    pub label: String,
    pub score: f64,
    pub category: SentimentCategory,
    /// Whether the exploration policy perturbed the stored score
    pub explored: bool,
}

/// Occupation sentiment scorer
pub struct BackgroundScorer {
    table: RwLock<Arc<ScoreTable>>,
    write_lock: Mutex<()>,
    feedback: FeedbackBuffer<BackgroundFeedback>,
    store: Arc<dyn ScoreStore>,
    policy: ExplorationPolicy,
    learning_rate: f64,
    load_source: LoadSource,
}

impl BackgroundScorer {
    /// Load the table from `store` (defaults when absent or corrupt)
    pub fn load(store: Arc<dyn ScoreStore>, config: &BackgroundConfig, seed: Option<u64>) -> Self {
        let policy = ExplorationPolicy::from_seed(config.exploration_rate, seed);
        Self::with_policy(store, config.learning_rate, policy)
    }

    /// Load the table from `store` with a caller-supplied exploration policy
    pub fn with_policy(
        store: Arc<dyn ScoreStore>,
        learning_rate: f64,
        policy: ExplorationPolicy,
    ) -> Self {
        let loaded = load_snapshot(store.as_ref(), ScoreTable::defaults);
        info!(
            source = ?loaded.source,
            occupations = loaded.state.len(),
            "Background score table ready"
        );

        Self {
            table: RwLock::new(Arc::new(loaded.state)),
            write_lock: Mutex::new(()),
            feedback: FeedbackBuffer::new(),
            store,
            policy,
            learning_rate,
            load_source: loaded.source,
        }
    }

    /// Where the table came from at load time
    pub fn load_source(&self) -> LoadSource {
        self.load_source
    }

    /// Current table
    pub fn snapshot(&self) -> Arc<ScoreTable> {
        current(&self.table)
    }

    /// Stored score without exploration or lazy insertion
    pub fn lookup(&self, label: &str) -> Option<f64> {
        self.snapshot().get(&normalize_label(label))
    }

    /// Score an occupation
    ///
    /// Unknown occupations are inserted at [`NEUTRAL_SCORE`] first. The stored
    /// score then passes through the exploration policy, bounded to `[1, 5]`.
    pub fn score(&self, label: &str) -> Result<BackgroundScore> {
        let key = normalize_label(label);
        if key.is_empty() {
            return Err(EngineError::InvalidLabel(
                "occupation label is blank".to_string(),
            ));
        }

        let stored = match self.snapshot().get(&key) {
            Some(score) => score,
            None => self.insert_neutral(&key),
        };

        let (score, explored) = self.policy.choose(stored, MIN_SCORE..=MAX_SCORE);
        Ok(BackgroundScore {
            label: key,
            score,
            category: SentimentCategory::from_score(score),
            explored,
        })
    }

    fn insert_neutral(&self, key: &str) -> f64 {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let table = self.snapshot();
        if let Some(score) = table.get(key) {
            return score;
        }

        let mut next = (*table).clone();
        next.insert(key, NEUTRAL_SCORE);
        publish(&self.table, next);
        debug!(label = key, "New occupation inserted at neutral score");
        NEUTRAL_SCORE
    }

    /// Buffer a correction; nothing is learned until [`Self::update`]
    ///
    /// Returns the number of buffered records.
    pub fn record_feedback(&self, label: &str, predicted: f64, observed: f64) -> Result<usize> {
        let key = normalize_label(label);
        if key.is_empty() {
            return Err(EngineError::InvalidFeedback(
                "occupation label is blank".to_string(),
            ));
        }
        ensure_finite("predicted score", predicted)?;
        ensure_finite("observed score", observed)?;

        let pending = self.feedback.push(BackgroundFeedback {
            label: key,
            predicted,
            observed,
            recorded_at: Utc::now(),
        });
        debug!(pending, "Background feedback recorded");
        Ok(pending)
    }

    /// Buffered feedback records
    pub fn pending_feedback(&self) -> usize {
        self.feedback.len()
    }

    /// Fold buffered feedback into the table and persist it
    ///
    /// An empty buffer is a no-op that touches neither the table nor the
    /// snapshot. A failed write leaves the in-memory update in place.
    pub fn update(&self) -> UpdateReport {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let records = self.feedback.drain();
        if records.is_empty() {
            debug!("No background feedback to learn from");
            return UpdateReport::noop();
        }

        let mut next = (*self.snapshot()).clone();
        let mut changed = BTreeSet::new();
        for record in &records {
            let old = next.get(&record.label).unwrap_or(NEUTRAL_SCORE);
            let error = record.observed - record.predicted;
            let new = (old + self.learning_rate * error).clamp(MIN_SCORE, MAX_SCORE);
            debug!(label = %record.label, old, new, error, "Background score corrected");

            next.insert(&record.label, new);
            if new != old {
                changed.insert(record.label.clone());
            }
        }

        publish(&self.table, next.clone());
        let persisted = save_snapshot(self.store.as_ref(), &next);

        info!(
            records = records.len(),
            changed = changed.len(),
            persisted,
            "Background score table updated"
        );

        UpdateReport {
            status: UpdateStatus::Applied,
            records: records.len(),
            changed: changed.len(),
            persisted,
        }
    }
}

impl std::fmt::Debug for BackgroundScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundScorer")
            .field("occupations", &self.snapshot().len())
            .field("pending_feedback", &self.pending_feedback())
            .field("learning_rate", &self.learning_rate)
            .field("policy", &self.policy)
            .finish()
    }
}
