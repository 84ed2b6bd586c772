//! Helpers for testing exports end to end.
//!
//! - **Builders**: [`DonorBuilder`] and [`SpecimenBuilder`] assemble nested
//!   donor records without hand-writing JSON.
//! - **Fixtures**: a canned multi-project donor set, JSONL writers for the
//!   input snapshot and [`Table`] for reading gzipped TSV output back.
//! - **Assertions**: order-independent row comparison, since data rows are
//!   only deterministic as a set.
//!
//! ```no_run
//! use clinical_export::testing::*;
//! use clinical_export::{DownloadDataType, TaskContext, execute};
//!
//! # fn main() -> anyhow::Result<()> {
//! let ws = TestWorkspace::new()?;
//! ws.write_donors(&scenario_donors())?;
//! let ctx = TaskContext::new(ws.input(), ws.output())
//!     .with_data_types([DownloadDataType::Sample]);
//! execute(&ctx)?;
//! let table = ws.summary_table(DownloadDataType::Sample)?;
//! assert_eq!(table.rows.len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;

use crate::data_type::DownloadDataType;
use crate::output::{Scope, output_path};
use crate::record::DonorRecord;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory with `input/` and `output/` roots, removed on drop.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join("input"))?;
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input(&self) -> PathBuf {
        self.dir.path().join("input")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Write `donors` as `input/donor.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_donors(&self, donors: &[DonorRecord]) -> anyhow::Result<PathBuf> {
        write_donors_jsonl(self.input().join("donor.jsonl"), donors)
    }

    pub fn summary_path(&self, data_type: DownloadDataType) -> PathBuf {
        output_path(self.output(), data_type, &Scope::AllProjects)
    }

    pub fn project_path(&self, data_type: DownloadDataType, project: &str) -> PathBuf {
        output_path(self.output(), data_type, &Scope::Project(project.to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if the table is missing or unreadable.
    pub fn summary_table(&self, data_type: DownloadDataType) -> anyhow::Result<Table> {
        Table::read(self.summary_path(data_type))
    }
}
