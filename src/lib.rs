//! Survey Sentiment - Adaptive Categorization Engine
//!
//! Turns free-text and numeric survey answers into bounded categories using
//! parameters that learn from after-the-fact corrections:
//! - Occupation → 1–5 sentiment score with online correction
//! - Income → one of five ordered bands over four learned boundaries
//! - Role-model text → weighted traits under epsilon-greedy reinforcement
//! - Behavioural-impact text → 1–5 keyword sentiment
//!
//! # Architecture
//!
//! - **Scoring**: one scorer per survey column, each owning its table
//! - **Storage**: whole-table JSON snapshots, default-on-missing-or-corrupt
//! - **Engine**: facade owning every scorer over one store
//! - **Scheduler**: periodic folding of buffered feedback
//!
//! # Example
//!
//! ```ignore
//! use survey_sentiment_core::{EngineConfig, IncomeBand, SurveyEngine};
//!
//! fn main() -> survey_sentiment_core::Result<()> {
//!     let engine = SurveyEngine::open(EngineConfig::load(None)?)?;
//!
//!     let band = engine.classify_income(30000.0);
//!     assert_eq!(band, IncomeBand::Average);
//!
//!     // A reviewer says this household is below average
//!     engine.submit_income_feedback(30000.0, band, IncomeBand::BelowAverage)?;
//!     engine.update_all();
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod exploration;
pub mod feedback;
pub mod scheduler;
pub mod scoring;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use analysis::{SurveyReport, SurveyRow};
pub use config::EngineConfig;
pub use engine::{EngineUpdateReport, FeedbackReceipt, SurveyEngine};
pub use error::{EngineError, Result};
pub use exploration::ExplorationPolicy;
pub use scheduler::{SchedulerError, UpdateScheduler};
pub use scoring::{
    BackgroundScorer, BehaviorScorer, IncomeThresholdClassifier, ThresholdVector, TraitWeighter,
};
pub use storage::{JsonFileStore, LoadSource, MemoryStore, ScoreStore};
pub use types::{
    ImpactCategory, IncomeBand, SentimentCategory, UpdateReport, UpdateStatus,
};
