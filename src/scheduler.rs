// Periodic Update Scheduler
//
// Folds pending feedback into every scorer on a fixed interval so long-lived
// processes learn without an explicit update call.

use crate::config::SchedulerConfig;
use crate::engine::{EngineUpdateReport, SurveyEngine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Scheduler is already running")]
    AlreadyRunning,

    #[error("Update task failed: {0}")]
    TaskFailed(String),
}

/// Record of one update pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Wall time of the pass
    #[serde(with = "serde_duration_millis")]
    pub duration: Duration,

    pub report: EngineUpdateReport,
}

// Custom serde module for Duration (serialize/deserialize as milliseconds)
mod serde_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Runs [`SurveyEngine::update_all`] every `interval`
pub struct UpdateScheduler {
    engine: Arc<SurveyEngine>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl UpdateScheduler {
    pub fn new(engine: Arc<SurveyEngine>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Scheduler for `config`, `None` when periodic updates are disabled
    pub fn from_config(engine: Arc<SurveyEngine>, config: &SchedulerConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(engine, config.interval()))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the scheduler (runs until stopped)
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        tracing::info!("Starting update scheduler (every {:?})", self.interval);

        loop {
            sleep(self.interval).await;

            if !self.running.load(Ordering::SeqCst) {
                tracing::info!("Stopping update scheduler");
                break;
            }

            if let Err(e) = self.run_once().await {
                tracing::error!("Scheduled update failed: {}", e);
            }
        }

        Ok(())
    }

    /// Stop the scheduler after the current tick
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Run one update pass now
    pub async fn run_once(&self) -> Result<UpdateRun, SchedulerError> {
        let id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let clock = Instant::now();

        let engine = Arc::clone(&self.engine);
        let report = tokio::task::spawn_blocking(move || engine.update_all())
            .await
            .map_err(|e| SchedulerError::TaskFailed(e.to_string()))?;

        let run = UpdateRun {
            id,
            started_at,
            completed_at: Utc::now(),
            duration: clock.elapsed(),
            report,
        };

        if run.report.is_noop() {
            tracing::debug!("Update {} found no pending feedback", run.id);
        } else {
            tracing::info!(
                "Update {} applied: {} background, {} income records in {:?}",
                run.id,
                run.report.background.records,
                run.report.income.records,
                run.duration
            );
        }

        Ok(run)
    }
}
