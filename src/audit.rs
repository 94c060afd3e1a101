//! Append-only audit log of income boundary adjustments
//!
//! One JSON object per line. The engine only ever appends; the log exists for
//! diagnostics and is never read back into a scorer.

use crate::error::Result;
use crate::scoring::income::Boundary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One boundary move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub boundary: Boundary,
    pub old_value: f64,
    pub new_value: f64,
    /// Income of the feedback record that triggered the move
    pub income: f64,
    pub reason: String,
}

/// Destination for [`AuditEntry`] lines
#[derive(Debug, Clone, Default)]
pub struct ThresholdAuditLog {
    path: Option<PathBuf>,
}

impl ThresholdAuditLog {
    /// Append to `path`, creating it (and its directory) on first use
    pub fn to_file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Drop every entry
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one entry; failures are logged and reported as `false`
    pub fn append(&self, entry: &AuditEntry) -> bool {
        let Some(path) = &self.path else {
            return true;
        };

        match write_line(path, entry) {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to append threshold audit entry");
                false
            }
        }
    }

    /// Read every entry back, skipping malformed lines (diagnostics only)
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        if !path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(path)?;
        Ok(contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}

fn write_line(path: &Path, entry: &AuditEntry) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let line = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}
