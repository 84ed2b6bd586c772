//! # clinical-export
//!
//! Batch flattening of hierarchical clinical donor records into typed,
//! gzipped TSV download tables.
//!
//! A donor record is a tree: donor-level fields, nested `exposures`,
//! `families` and `therapies`, and `specimens` each holding `samples`. One
//! execution reads a donor snapshot once, keeps the requested donors, caches
//! them and then derives one table per requested [`DownloadDataType`]:
//!
//! - **direct** types (`donor`) convert each donor into one row;
//! - **nested** types unwind one or two array levels, carrying the
//!   identifiers of every ancestor down to each emitted row.
//!
//! Every type is described declaratively by an [`ExportSpec`] (root keys,
//! unwind path, ordered columns) and executed by a single generic stage
//! runner, [`flatten_donor`].
//!
//! ## Quick start
//!
//! ```no_run
//! use clinical_export::{DownloadDataType, TaskContext, execute};
//!
//! # fn main() -> Result<(), clinical_export::TaskError> {
//! let ctx = TaskContext::new("release/", "download/")
//!     .with_donor_ids(["DO1", "DO2"])
//!     .with_data_types([DownloadDataType::Donor, DownloadDataType::Sample]);
//! let report = execute(&ctx)?;
//! for file in report.files() {
//!     println!("{} ({} rows)", file.path.display(), file.rows);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Execution engine
//!
//! Branches run on a small deferred-execution engine: a [`Pipeline`] graph,
//! [`PCollection<T>`] with `map` / `filter` / `flat_map`, and a [`Runner`]
//! that executes a chain sequentially or data-parallel over partitions on
//! rayon. [`PCollection::cache`] materializes a collection once and returns
//! a [`CachedCollection`] handle; dropping the handle releases the data and
//! everything derived from it.
//!
//! ## Output layout
//!
//! ```text
//! <output>/Summary/<type>.all_projects.tsv.gz
//! <output>/Projects/<project>/<type>.<project>.tsv.gz   (with split_by_project)
//! ```
//!
//! Each file is a multi-member gzip stream: the header line, then the data
//! rows in independently compressed shards.
//!
//! ## Errors
//!
//! [`TaskError`] is fatal (missing input, unknown type, I/O failure,
//! cancellation). Malformed records raise a [`ConversionError`] that is, by
//! default, skipped and reported in [`TaskReport::diagnostics`].

pub mod cancel;
pub mod collection;
pub mod config;
pub mod convert;
pub mod data_type;
pub mod diagnostics;
pub mod error;
pub mod header;
pub mod io;
pub mod keys;
pub mod logging;
mod node;
pub mod node_id;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod runner;
pub mod schema;
pub mod stage;
pub mod task;
pub mod testing;
pub mod type_token;
pub mod unwind;

pub use cancel::CancelToken;
pub use collection::{CachedCollection, Element, PCollection, from_vec};
pub use config::{ExportOptions, JobRequest, resolve_data_types};
pub use convert::{ConvertedRow, convert, format_value};
pub use data_type::{DownloadDataType, Nesting};
pub use diagnostics::{Diagnostics, RecordError, RecordErrorPolicy, Stage};
pub use error::{ConversionError, TaskError};
pub use header::{Header, header};
pub use keys::{CorrelationKeys, pair};
pub use node_id::NodeId;
pub use output::{OutputFile, OutputWriter, ProjectRow, Scope, output_path, write};
pub use pipeline::Pipeline;
pub use record::{DonorRecord, Row};
pub use runner::{ExecMode, Runner};
pub use schema::{Column, ColumnKind, ExportSpec, UnwindStep};
pub use stage::{Flattened, flatten_donor};
pub use task::{BranchReport, ClinicalTask, TaskContext, TaskReport, execute};
pub use type_token::Partition;
pub use unwind::{Unwound, unwind};
