//! Job request and execution options.
//!
//! A [`JobRequest`] mirrors the document produced by the submission surface
//! (camelCase keys). `jobInfo` and `submissionTime` are carried for logging
//! only. [`ExportOptions`] controls how the task runs, independently of what
//! it exports.

use crate::data_type::DownloadDataType;
use crate::diagnostics::RecordErrorPolicy;
use crate::error::TaskError;
use crate::runner::Runner;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    /// Donors to export; empty means every donor.
    #[serde(default)]
    pub donor_ids: Vec<String>,
    #[serde(default)]
    pub data_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_location: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_location: Option<PathBuf>,
}

impl JobRequest {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parse job request")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read job request {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Resolve requested ids, dropping duplicates but keeping request order.
    pub fn resolve_data_types(&self) -> Result<Vec<DownloadDataType>, TaskError> {
        resolve_data_types(&self.data_types)
    }

    pub fn donor_filter(&self) -> HashSet<String> {
        self.donor_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Resolve type ids. The first unknown id fails the whole request.
pub fn resolve_data_types<S: AsRef<str>>(ids: &[S]) -> Result<Vec<DownloadDataType>, TaskError> {
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let t = DownloadDataType::from_id(id.as_ref())?;
        if !out.contains(&t) {
            out.push(t);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Run every stage on the calling thread.
    pub sequential: bool,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
    /// Partitions of the cached donor collection; `None` means `2 * num_cpus`.
    pub partitions: Option<usize>,
    pub on_record_error: RecordErrorPolicy,
    pub split_by_project: bool,
    /// Where to dump skipped-record diagnostics as JSON, if anywhere.
    pub diagnostics_file: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            sequential: false,
            threads: None,
            partitions: None,
            on_record_error: RecordErrorPolicy::Skip,
            split_by_project: false,
            diagnostics_file: None,
        }
    }
}

impl ExportOptions {
    /// Runner owning the worker pool for a whole task.
    pub fn runner(&self) -> Runner {
        if self.sequential {
            Runner::sequential()
        } else {
            Runner::parallel(self.threads, self.partitions)
        }
    }

    /// Runner for work that already executes inside [`ExportOptions::runner`]'s pool.
    pub(crate) fn branch_runner(&self) -> Runner {
        if self.sequential {
            Runner::sequential()
        } else {
            Runner::parallel(None, self.partitions)
        }
    }
}
