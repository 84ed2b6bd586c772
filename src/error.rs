//! Error taxonomy.
//!
//! [`TaskError`] is fatal and fails the whole execution. [`ConversionError`]
//! describes one malformed record; it is contained in the branch that hit it
//! and, under the default policy, only recorded in the diagnostics.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// The input location, or the donor dataset inside it, does not exist.
    #[error("input not found: {}", path.display())]
    InputNotFound { path: PathBuf },

    /// The input exists but could not be read.
    #[error("input unreadable: {}: {cause:#}", path.display())]
    Input {
        path: PathBuf,
        cause: anyhow::Error,
    },

    /// A requested type has no registered schema.
    #[error("unknown data type '{0}'")]
    UnknownDataType(String),

    #[error("failed to write {data_type} output to {}: {cause:#}", path.display())]
    Output {
        data_type: String,
        path: PathBuf,
        cause: anyhow::Error,
    },

    /// Raised instead of skipping when the fail policy is selected.
    #[error("record conversion failed for {data_type}: {error}")]
    RecordConversion {
        data_type: String,
        error: ConversionError,
    },

    #[error("execution failed: {0:#}")]
    Engine(anyhow::Error),

    #[error("task cancelled")]
    Cancelled,
}

impl TaskError {
    /// Short name of the error kind, as reported by a failed task.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::InputNotFound { .. } => "InputNotFound",
            TaskError::Input { .. } => "InputUnreadable",
            TaskError::UnknownDataType(_) => "UnknownDataType",
            TaskError::Output { .. } => "OutputError",
            TaskError::RecordConversion { .. } => "RecordConversionError",
            TaskError::Engine(_) => "EngineError",
            TaskError::Cancelled => "Cancelled",
        }
    }
}

/// Why a single record could not be flattened.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    #[error("field '{field}' is not an array")]
    NotAnArray { field: String },

    #[error("element of '{field}' is not an object")]
    NotAnObject { field: String },

    #[error("missing correlation key '{field}'")]
    MissingKey { field: String },

    #[error("invalid value for '{column}': {reason}")]
    InvalidValue { column: String, reason: String },

    #[error("malformed record: {0}")]
    Malformed(String),
}
