//! The export task: read once, cache once, fan out per data type.
//!
//! [`ClinicalTask::execute`] reads the donor snapshot, applies the donor
//! filter and caches the result in the task's [`Pipeline`]. Every requested
//! type then derives its own branch from that cached collection. Branches are
//! independent and run concurrently unless the options ask for sequential
//! execution. The cache handle is scoped to `execute`, so it is released on
//! every exit path.

use crate::cancel::CancelToken;
use crate::collection::{CachedCollection, from_vec};
use crate::config::{ExportOptions, JobRequest};
use crate::data_type::DownloadDataType;
use crate::diagnostics::{Diagnostics, RecordError, RecordErrorPolicy, write_errors};
use crate::error::{ConversionError, TaskError};
use crate::header::header;
use crate::io::jsonl::{discover_donor_files, read_donors};
use crate::output::{OutputFile, OutputWriter, ProjectRow};
use crate::pipeline::Pipeline;
use crate::record::DonorRecord;
use crate::schema::ExportSpec;
use crate::stage::{Flattened, flatten_donor};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything one execution needs.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    /// Donors to keep; empty keeps all.
    pub donor_ids: HashSet<String>,
    pub data_types: Vec<DownloadDataType>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub options: ExportOptions,
    pub cancel: CancelToken,
}

impl TaskContext {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Build a context from a submission document. Unknown type ids fail here,
    /// before any input is touched.
    pub fn from_request(
        request: &JobRequest,
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Result<Self, TaskError> {
        Ok(Self {
            donor_ids: request.donor_filter(),
            data_types: request.resolve_data_types()?,
            ..Self::new(input, output)
        })
    }

    pub fn with_donor_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.donor_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Requested types in first-seen order; repeats are dropped.
    pub fn with_data_types(mut self, data_types: impl IntoIterator<Item = DownloadDataType>) -> Self {
        self.data_types = unique(data_types);
        self
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Outcome of one data type's branch.
#[derive(Debug, Clone, Serialize)]
pub struct BranchReport {
    pub data_type: DownloadDataType,
    pub rows: usize,
    pub skipped: usize,
    pub files: Vec<OutputFile>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    /// Donors left after filtering.
    pub donors: usize,
    pub branches: Vec<BranchReport>,
    pub diagnostics: Vec<RecordError>,
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn branch(&self, data_type: DownloadDataType) -> Option<&BranchReport> {
        self.branches.iter().find(|b| b.data_type == data_type)
    }

    pub fn files(&self) -> impl Iterator<Item = &OutputFile> {
        self.branches.iter().flat_map(|b| b.files.iter())
    }

    pub fn total_rows(&self) -> usize {
        self.branches.iter().map(|b| b.rows).sum()
    }
}

/// Runs exports against its own computation graph.
#[derive(Clone, Default)]
pub struct ClinicalTask {
    pipeline: Pipeline,
}

impl ClinicalTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph backing this task. Empty between executions.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn execute(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let started = Instant::now();
        info!(
            input = %ctx.input.display(),
            output = %ctx.output.display(),
            data_types = ?ctx.data_types.iter().map(|t| t.id()).collect::<Vec<_>>(),
            donor_filter = ctx.donor_ids.len(),
            "starting export"
        );
        if ctx.cancel.is_cancelled() {
            return Err(TaskError::Cancelled);
        }

        let files = discover_donor_files(&ctx.input)?;
        debug!(files = files.len(), "discovered donor files");
        let batch = read_donors(&files)?;

        let diagnostics = Diagnostics::new();
        for err in &batch.errors {
            warn!(stage = ?err.stage, error = %err.message, "skipping unreadable input line");
        }
        if ctx.options.on_record_error == RecordErrorPolicy::Fail
            && let Some(first) = batch.errors.first()
        {
            return Err(TaskError::RecordConversion {
                data_type: "input".to_string(),
                error: ConversionError::Malformed(first.message.clone()),
            });
        }
        diagnostics.extend(batch.errors);

        let (donors, branches) = ctx
            .options
            .runner()
            .install(|| self.run_branches(ctx, batch.donors, &diagnostics))
            .map_err(TaskError::Engine)??;

        if let Some(path) = &ctx.options.diagnostics_file {
            write_errors(&diagnostics.snapshot(), path).map_err(|e| TaskError::Output {
                data_type: "diagnostics".to_string(),
                path: path.clone(),
                cause: e.into(),
            })?;
        }

        let report = TaskReport {
            donors,
            branches,
            diagnostics: diagnostics.into_errors(),
            elapsed: started.elapsed(),
        };
        info!(
            donors = report.donors,
            rows = report.total_rows(),
            skipped = report.diagnostics.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "export finished"
        );
        Ok(report)
    }

    fn run_branches(
        &self,
        ctx: &TaskContext,
        donors: Vec<DonorRecord>,
        diagnostics: &Diagnostics,
    ) -> Result<(usize, Vec<BranchReport>), TaskError> {
        let runner = ctx.options.branch_runner();

        let source = from_vec(&self.pipeline, donors);
        let source_id = source.id();
        let filtered = if ctx.donor_ids.is_empty() {
            source
        } else {
            let wanted = Arc::new(ctx.donor_ids.clone());
            source.filter(move |d: &DonorRecord| d.donor_id().is_some_and(|id| wanted.contains(&id)))
        };
        let cache_result = filtered.cache(&runner);
        self.pipeline.release(source_id);
        let cached = cache_result.map_err(TaskError::Engine)?;
        info!(donors = cached.len(), node = %cached.id(), "cached donor collection");

        let writer = OutputWriter::new(&ctx.output)
            .split_by_project(ctx.options.split_by_project)
            .shards(ctx.options.partitions);

        let branch = |data_type: &DownloadDataType| {
            if ctx.cancel.is_cancelled() {
                return Err(TaskError::Cancelled);
            }
            self.run_branch(ctx, &cached, *data_type, diagnostics, &writer)
        };
        // Two branches of one type would race on the same files.
        let data_types = unique(ctx.data_types.iter().copied());
        let reports = if ctx.options.sequential {
            data_types.iter().map(branch).collect::<Result<Vec<_>, _>>()
        } else {
            data_types.par_iter().map(branch).collect::<Result<Vec<_>, _>>()
        };

        let donors = cached.len();
        drop(cached);
        reports.map(|r| (donors, r))
    }

    fn run_branch(
        &self,
        ctx: &TaskContext,
        cached: &CachedCollection<DonorRecord>,
        data_type: DownloadDataType,
        diagnostics: &Diagnostics,
        writer: &OutputWriter,
    ) -> Result<BranchReport, TaskError> {
        let started = Instant::now();
        let spec = ExportSpec::of(data_type);
        let flattened = cached
            .collection()
            .flat_map(move |d: &DonorRecord| flatten_donor(spec, d))
            .collect_with(&ctx.options.branch_runner())
            .map_err(TaskError::Engine)?;

        let mut rows = Vec::with_capacity(flattened.len());
        let mut skipped = Vec::new();
        for item in flattened {
            match item {
                Flattened::Row { project, row } => rows.push(ProjectRow { project, row }),
                Flattened::Skipped {
                    stage,
                    donor_id,
                    error,
                } => {
                    warn!(
                        data_type = %data_type,
                        donor_id = donor_id.as_deref().unwrap_or("-"),
                        stage = ?stage,
                        error = %error,
                        "skipping malformed record"
                    );
                    if ctx.options.on_record_error == RecordErrorPolicy::Fail {
                        return Err(TaskError::RecordConversion {
                            data_type: data_type.id().to_string(),
                            error,
                        });
                    }
                    skipped.push(RecordError::new(stage, Some(data_type), donor_id, &error));
                }
            }
        }

        let files = writer.write(data_type, &header(data_type), &rows)?;
        let skipped_count = skipped.len();
        diagnostics.extend(skipped);

        let report = BranchReport {
            data_type,
            rows: rows.len(),
            skipped: skipped_count,
            files,
            elapsed: started.elapsed(),
        };
        info!(
            data_type = %data_type,
            rows = report.rows,
            skipped = report.skipped,
            files = report.files.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "branch complete"
        );
        Ok(report)
    }
}

fn unique(data_types: impl IntoIterator<Item = DownloadDataType>) -> Vec<DownloadDataType> {
    let mut out = Vec::new();
    for t in data_types {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

/// Run one export on a fresh task.
pub fn execute(ctx: &TaskContext) -> Result<TaskReport, TaskError> {
    ClinicalTask::new().execute(ctx)
}
