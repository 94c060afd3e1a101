//! Test utilities for storage failure paths
//!
//! Provides a store wrapper whose writes can be switched to fail, so callers
//! can exercise the "update applied but not persisted" path without touching
//! filesystem permissions.

use super::ScoreStore;
use crate::error::{EngineError, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Store wrapper with switchable write failures and a write counter
#[derive(Debug)]
pub struct FlakyStore<S> {
    inner: S,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl<S: ScoreStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make subsequent writes fail (`true`) or pass through (`false`)
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: ScoreStore> ScoreStore for FlakyStore<S> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected write failure for {}", key),
            )));
        }
        self.inner.write(key, contents)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
