//! Row sinks: where finished rows go
//!
//! The parser only sees the [`RowSink`] trait. The binary writes JSON
//! lines; tests and dry runs collect rows in memory.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use crate::parsers::OutputRow;

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for output rows. Shared by every task, so implementations
/// serialize concurrent writes themselves.
pub trait RowSink: Send + Sync {
    fn insert_row(&self, row: OutputRow) -> Result<(), InsertError>;

    /// Push out anything buffered
    fn flush(&self) -> Result<(), InsertError>;
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> RowSink for JsonLinesSink<W> {
    fn insert_row(&self, row: OutputRow) -> Result<(), InsertError> {
        let line = serde_json::to_vec(&row)?;
        let mut writer = self.lock();
        writer.write_all(&line)?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), InsertError> {
        self.lock().flush()?;
        Ok(())
    }
}

/// Keeps every row in memory
#[derive(Default)]
pub struct CollectingSink {
    rows: Mutex<Vec<OutputRow>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the rows inserted so far
    pub fn rows(&self) -> Vec<OutputRow> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutputRow>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RowSink for CollectingSink {
    fn insert_row(&self, row: OutputRow) -> Result<(), InsertError> {
        self.lock().push(row);
        Ok(())
    }

    fn flush(&self) -> Result<(), InsertError> {
        Ok(())
    }
}
