//! clinical-export: flatten a donor snapshot into download tables
//!
//! Usage:
//!   # Every table for every donor
//!   clinical-export --input ./release --output ./download \
//!       --data-type donor --data-type specimen --data-type sample
//!
//!   # Driven by a submission document, split per project
//!   clinical-export --request job.json --input ./release --output ./download --split-by-project

use anyhow::{Context, Result, bail};
use clap::Parser;
use clinical_export::logging::{LogConfig, LogFormat, init_logging};
use clinical_export::{
    ClinicalTask, ExportOptions, JobRequest, RecordErrorPolicy, TaskContext, TaskError, TaskReport,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "clinical-export")]
#[command(about = "Flatten hierarchical donor records into gzipped TSV tables", long_about = None)]
struct Args {
    /// Directory holding the donor snapshot (overrides the request's inputLocation)
    #[arg(long, short = 'i')]
    input: Option<PathBuf>,

    /// Output root (overrides the request's outputLocation)
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Donor to export; repeatable. None means all donors
    #[arg(long = "donor-id", value_name = "ID")]
    donor_ids: Vec<String>,

    /// Table to produce; repeatable
    #[arg(long = "data-type", value_name = "TYPE")]
    data_types: Vec<String>,

    /// JSON submission document ({"donorIds": [...], "dataTypes": [...], ...})
    #[arg(long, value_name = "FILE")]
    request: Option<PathBuf>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    threads: Option<usize>,

    /// Partitions of the donor collection and shards per table
    #[arg(long)]
    partitions: Option<usize>,

    /// Run everything on one thread
    #[arg(long, conflicts_with = "threads")]
    sequential: bool,

    /// Also write one table per project
    #[arg(long)]
    split_by_project: bool,

    /// Fail instead of skipping malformed records
    #[arg(long)]
    fail_on_record_error: bool,

    /// Write skipped-record diagnostics to this JSON file
    #[arg(long, value_name = "FILE")]
    diagnostics: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut log = LogConfig::from_verbosity(args.verbose);
    if args.log_json {
        log = log.with_format(LogFormat::Json);
    }
    if let Err(e) = init_logging(&log) {
        eprintln!("warning: {e:#}");
    }

    match run(args) {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            match e.downcast_ref::<TaskError>() {
                Some(task) => eprintln!("error [{}]: {task}", task.kind()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<TaskReport> {
    let mut request = match &args.request {
        Some(path) => JobRequest::load(path)?,
        None => JobRequest::default(),
    };
    request.donor_ids.extend(args.donor_ids);
    request.data_types.extend(args.data_types);
    if request.data_types.is_empty() {
        bail!("no data type requested (use --data-type or a request file)");
    }
    if let Some(info) = &request.job_info {
        info!(job_info = %info, submission_time = ?request.submission_time, "job request");
    }

    let input = args
        .input
        .or_else(|| request.input_location.clone())
        .context("no input location (use --input or inputLocation)")?;
    let output = args
        .output
        .or_else(|| request.output_location.clone())
        .context("no output location (use --output or outputLocation)")?;

    let options = ExportOptions {
        sequential: args.sequential,
        threads: args.threads,
        partitions: args.partitions,
        on_record_error: if args.fail_on_record_error {
            RecordErrorPolicy::Fail
        } else {
            RecordErrorPolicy::Skip
        },
        split_by_project: args.split_by_project,
        diagnostics_file: args.diagnostics,
    };

    let ctx = TaskContext::from_request(&request, input, output)?.with_options(options);
    Ok(ClinicalTask::new().execute(&ctx)?)
}

fn print_summary(report: &TaskReport) {
    println!(
        "exported {} rows from {} donors in {:.2}s",
        report.total_rows(),
        report.donors,
        report.elapsed.as_secs_f64()
    );
    for branch in &report.branches {
        println!(
            "  {:<16} rows={:<8} skipped={:<6} files={}",
            branch.data_type.id(),
            branch.rows,
            branch.skipped,
            branch.files.len()
        );
        for file in &branch.files {
            println!("    {} ({} bytes)", file.path.display(), file.bytes);
        }
    }
    if !report.diagnostics.is_empty() {
        println!("{} records skipped", report.diagnostics.len());
    }
}
