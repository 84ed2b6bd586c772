//! Record-level error reporting.
//!
//! A malformed record never stops a branch under the default policy: it is
//! skipped, logged and collected here so the task can report it alongside an
//! otherwise successful run.

use crate::data_type::DownloadDataType;
use crate::error::ConversionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Mutex;

/// What to do with a record that cannot be converted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordErrorPolicy {
    /// Log the record, keep it in diagnostics and continue.
    #[default]
    Skip,
    /// Fail the task on the first malformed record.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Read,
    Pair,
    Unwind,
    Convert,
}

/// One skipped record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordError {
    pub stage: Stage,
    /// `None` for errors raised while reading the shared input.
    pub data_type: Option<DownloadDataType>,
    pub donor_id: Option<String>,
    pub message: String,
}

impl RecordError {
    pub fn new(
        stage: Stage,
        data_type: Option<DownloadDataType>,
        donor_id: Option<String>,
        error: &ConversionError,
    ) -> Self {
        Self {
            stage,
            data_type,
            donor_id,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(t) = self.data_type {
            write!(f, "[{t}] ")?;
        }
        if let Some(ref id) = self.donor_id {
            write!(f, "donor {id}: ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// Thread-safe collector of [`RecordError`]s.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Mutex<Vec<RecordError>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, error: RecordError) {
        self.lock().push(error);
    }

    pub fn extend(&self, errors: impl IntoIterator<Item = RecordError>) {
        self.lock().extend(errors);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn count_for(&self, data_type: DownloadDataType) -> usize {
        self.lock()
            .iter()
            .filter(|e| e.data_type == Some(data_type))
            .count()
    }

    pub fn snapshot(&self) -> Vec<RecordError> {
        self.lock().clone()
    }

    pub fn into_errors(self) -> Vec<RecordError> {
        self.errors
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RecordError>> {
        self.errors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Serialize collected errors as pretty JSON to `path`.
pub fn write_errors(errors: &[RecordError], path: impl AsRef<Path>) -> io::Result<()> {
    let json = serde_json::to_string_pretty(errors).map_err(io::Error::other)?;
    std::fs::write(path, json)
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Diagnostics({} skipped records)", self.len())
    }
}
