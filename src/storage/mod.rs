//! Storage layer for scorer state
//!
//! Each scorer persists one snapshot of its whole table under a fixed key.
//! Writes always replace the entire snapshot, so the stored state is never a
//! partial update. Reads never fail towards the caller: a missing snapshot,
//! an unreadable one, or one that fails to parse all resolve to the scorer's
//! built-in defaults, and the outcome is reported as a [`LoadSource`].

pub mod file;
pub mod memory;
pub mod test_utils;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Keyed snapshot storage
///
/// Implementations hold opaque text per key and must make `write` replace the
/// previous value as a whole.
pub trait ScoreStore: Send + Sync {
    /// Read the snapshot stored under `key`, `None` if there is none
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the snapshot stored under `key`
    fn write(&self, key: &str, contents: &str) -> Result<()>;
}

/// A scorer table that can be persisted as a snapshot
pub trait Snapshot: Serialize + DeserializeOwned + Sized {
    /// Storage key, one per scorer
    const KEY: &'static str;

    /// Validate (and normalize) a freshly parsed snapshot
    ///
    /// Returning `Err` makes the loader treat the snapshot as corrupt.
    fn sanitize(self) -> std::result::Result<Self, String> {
        Ok(self)
    }
}

/// Where a loaded table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Parsed from the stored snapshot
    Snapshot,
    /// No snapshot stored; built-in defaults
    Absent,
    /// Snapshot unreadable, unparseable, or invalid; built-in defaults
    Corrupt,
}

impl LoadSource {
    pub fn used_defaults(&self) -> bool {
        !matches!(self, LoadSource::Snapshot)
    }
}

/// A table together with the provenance of its contents
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub state: T,
    pub source: LoadSource,
}

/// Load the snapshot for `T`, falling back to `default()` on any failure
pub fn load_snapshot<T, F>(store: &dyn ScoreStore, default: F) -> Loaded<T>
where
    T: Snapshot,
    F: FnOnce() -> T,
{
    let contents = match store.read(T::KEY) {
        Ok(Some(contents)) => contents,
        Ok(None) => {
            info!(key = T::KEY, "No snapshot found, using built-in defaults");
            return Loaded {
                state: default(),
                source: LoadSource::Absent,
            };
        }
        Err(e) => {
            warn!(key = T::KEY, error = %e, "Snapshot unreadable, using built-in defaults");
            return Loaded {
                state: default(),
                source: LoadSource::Corrupt,
            };
        }
    };

    let parsed = serde_json::from_str::<T>(&contents)
        .map_err(|e| e.to_string())
        .and_then(Snapshot::sanitize);

    match parsed {
        Ok(state) => {
            debug!(key = T::KEY, "Loaded snapshot");
            Loaded {
                state,
                source: LoadSource::Snapshot,
            }
        }
        Err(reason) => {
            warn!(key = T::KEY, %reason, "Snapshot corrupt, using built-in defaults");
            Loaded {
                state: default(),
                source: LoadSource::Corrupt,
            }
        }
    }
}

/// Persist `state` as the whole snapshot for `T`
///
/// Returns whether the write succeeded. Failures are logged, never raised:
/// callers keep operating on their in-memory state.
pub fn save_snapshot<T: Snapshot>(store: &dyn ScoreStore, state: &T) -> bool {
    let contents = match serde_json::to_string_pretty(state) {
        Ok(contents) => contents,
        Err(e) => {
            warn!(key = T::KEY, error = %e, "Failed to serialize snapshot");
            return false;
        }
    };

    match store.write(T::KEY, &contents) {
        Ok(()) => {
            debug!(key = T::KEY, bytes = contents.len(), "Snapshot saved");
            true
        }
        Err(e) => {
            warn!(key = T::KEY, error = %e, "Failed to persist snapshot");
            false
        }
    }
}
