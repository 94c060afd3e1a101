//! Common test utilities and helpers

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use survey_sentiment_core::{EngineConfig, JsonFileStore, SurveyEngine};
use tempfile::TempDir;

/// Config rooted at `dir` with exploration switched off
pub fn quiet_config(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::with_state_dir(dir);
    config.seed = Some(7);
    config.background.exploration_rate = 0.0;
    config.traits.exploration_rate = 0.0;
    config
}

/// Engine over a fresh temporary state directory
pub fn create_test_engine() -> (SurveyEngine, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let engine =
        SurveyEngine::open(quiet_config(temp_dir.path())).expect("Failed to open test engine");
    (engine, temp_dir)
}

/// Reopen an engine over an existing state directory
pub fn reopen(dir: &Path) -> SurveyEngine {
    SurveyEngine::open(quiet_config(dir)).expect("Failed to reopen test engine")
}

/// Shared engine for concurrency tests
pub fn create_shared_engine() -> (Arc<SurveyEngine>, TempDir) {
    let (engine, temp_dir) = create_test_engine();
    (Arc::new(engine), temp_dir)
}

/// Snapshot file contents, `None` if absent
pub fn read_snapshot(dir: &Path, key: &str) -> Option<String> {
    let path = JsonFileStore::new(dir).path_for(key).ok()?;
    std::fs::read_to_string(path).ok()
}

/// Write raw snapshot contents, bypassing the engine
pub fn write_snapshot(dir: &Path, key: &str, contents: &str) {
    std::fs::create_dir_all(dir).expect("Failed to create state dir");
    let path = JsonFileStore::new(dir).path_for(key).expect("Invalid key");
    std::fs::write(path, contents).expect("Failed to write snapshot");
}
