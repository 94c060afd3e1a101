//! Directory-backed snapshot store
//!
//! One pretty-printed JSON file per key (`<dir>/<key>.json`). Every write goes
//! to its own uniquely named temp file in the same directory, which is then
//! renamed over the target. A crash mid-write leaves the previous snapshot
//! intact, and concurrent writers never share a temp file.

use super::ScoreStore;
use crate::error::{EngineError, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Snapshot store rooted at a state directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`
    ///
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the snapshot for `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(EngineError::Other(format!("Invalid snapshot key: {:?}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl ScoreStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read snapshot {}: {}", path.display(), e),
            ))),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)?;

        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(contents.as_bytes()).map_err(|e| {
            EngineError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write snapshot {}: {}", tmp.path().display(), e),
            ))
        })?;
        tmp.persist(&path).map_err(|e| EngineError::Io(e.error))?;

        debug!("Wrote snapshot {}", path.display());
        Ok(())
    }
}
