//! Append-only feedback buffer
//!
//! Scorers never learn on `record_feedback`; they append here and fold the
//! drained records into their tables on `update()`. Records appended while an
//! update is in progress stay in the buffer for the next one.

use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub struct FeedbackBuffer<T> {
    records: Mutex<Vec<T>>,
}

impl<T> FeedbackBuffer<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Append a record, returning the buffer length afterwards
    pub fn push(&self, record: T) -> usize {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records.push(record);
        records.len()
    }

    /// Take every buffered record, leaving the buffer empty
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> FeedbackBuffer<T> {
    /// Copy of the pending records, oldest first
    pub fn pending(&self) -> Vec<T> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> Default for FeedbackBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
