//! Engine facade
//!
//! [`SurveyEngine`] owns one instance of every scorer over a shared snapshot
//! store. It is `Send + Sync`; share it behind an `Arc` to serve concurrent
//! scoring requests and feedback submissions.

use crate::analysis::{
    BackgroundSummary, BehaviorSummary, IncomeSummary, RoleModelSummary, SurveyReport, SurveyRow,
};
use crate::audit::ThresholdAuditLog;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::scoring::{
    BackgroundScore, BackgroundScorer, BehaviorScore, BehaviorScorer, IncomeThresholdClassifier,
    TraitObservation, TraitWeighter,
};
use crate::storage::{JsonFileStore, ScoreStore};
use crate::types::{IncomeBand, UpdateReport};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Reports from one [`SurveyEngine::update_all`] pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineUpdateReport {
    pub background: UpdateReport,
    pub income: UpdateReport,
}

impl EngineUpdateReport {
    pub fn is_noop(&self) -> bool {
        self.background.is_noop() && self.income.is_noop()
    }
}

/// Result of submitting one feedback record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackReceipt {
    /// Records buffered after this one was added
    pub pending: usize,
    /// Set when the submission triggered an update
    pub update: Option<UpdateReport>,
}

pub struct SurveyEngine {
    config: EngineConfig,
    background: BackgroundScorer,
    income: IncomeThresholdClassifier,
    traits: TraitWeighter,
    behavior: BehaviorScorer,
}

impl SurveyEngine {
    /// Open an engine persisting JSON snapshots under `config.state_dir`
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(&config.state_dir));
        Self::with_store(config, store)
    }

    /// Open an engine over any snapshot store
    pub fn with_store(config: EngineConfig, store: Arc<dyn ScoreStore>) -> Result<Self> {
        config.validate()?;

        let audit = match config.audit_log_path() {
            Some(path) => ThresholdAuditLog::to_file(path),
            None => ThresholdAuditLog::disabled(),
        };

        let background = BackgroundScorer::load(store.clone(), &config.background, config.seed);
        let income = IncomeThresholdClassifier::load(store.clone(), audit);
        let traits = TraitWeighter::load(store, &config.traits, config.seed);

        info!(
            state_dir = %config.state_dir.display(),
            seeded = config.seed.is_some(),
            "Survey engine opened"
        );

        Ok(Self {
            config,
            background,
            income,
            traits,
            behavior: BehaviorScorer::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn background(&self) -> &BackgroundScorer {
        &self.background
    }

    pub fn income(&self) -> &IncomeThresholdClassifier {
        &self.income
    }

    pub fn traits(&self) -> &TraitWeighter {
        &self.traits
    }

    pub fn score_background(&self, label: &str) -> Result<BackgroundScore> {
        self.background.score(label)
    }

    pub fn classify_income(&self, income: f64) -> IncomeBand {
        self.income.classify(income)
    }

    pub fn observe_role_models(&self, text: &str) -> TraitObservation {
        self.traits.observe(text)
    }

    pub fn score_behavior(&self, text: &str) -> BehaviorScore {
        self.behavior.score(text)
    }

    pub fn submit_background_feedback(
        &self,
        label: &str,
        predicted: f64,
        observed: f64,
    ) -> Result<FeedbackReceipt> {
        let pending = self.background.record_feedback(label, predicted, observed)?;
        Ok(FeedbackReceipt {
            pending,
            update: None,
        })
    }

    /// Buffer an income correction, updating once `income.auto_update_after`
    /// records are pending
    pub fn submit_income_feedback(
        &self,
        income: f64,
        predicted: IncomeBand,
        observed: IncomeBand,
    ) -> Result<FeedbackReceipt> {
        let pending = self.income.record_feedback(income, predicted, observed)?;
        let update = match self.config.income.auto_update_after {
            Some(threshold) if pending >= threshold => {
                info!(pending, threshold, "Income feedback threshold reached, updating");
                Some(self.income.update())
            }
            _ => None,
        };
        Ok(FeedbackReceipt { pending, update })
    }

    /// Fold pending feedback into the background and income scorers
    pub fn update_all(&self) -> EngineUpdateReport {
        EngineUpdateReport {
            background: self.background.update(),
            income: self.income.update(),
        }
    }

    /// Summarize a batch of survey rows
    ///
    /// Role-model answers go through the full trait pipeline, so analysis
    /// reinforces trait weights.
    pub fn analyze(&self, rows: &[SurveyRow]) -> SurveyReport {
        let report = SurveyReport {
            generated_at: Utc::now(),
            rows: rows.len(),
            background: BackgroundSummary::collect(&self.background, rows),
            income: IncomeSummary::collect(&self.income, rows),
            role_models: RoleModelSummary::collect(&self.traits, rows),
            behavior: BehaviorSummary::collect(&self.behavior, rows),
        };
        info!(rows = rows.len(), "Survey batch analyzed");
        report
    }
}

impl std::fmt::Debug for SurveyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurveyEngine")
            .field("state_dir", &self.config.state_dir)
            .field("background", &self.background)
            .field("income", &self.income)
            .field("traits", &self.traits)
            .finish()
    }
}
