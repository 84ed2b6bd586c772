//! Persisting converted rows as download tables.
//!
//! Every requested type produces `Summary/<id>.all_projects.tsv.gz` under the
//! output root, header-only when the branch yielded nothing. With the
//! per-project split enabled, each project that has rows also gets
//! `Projects/<project>/<id>.<project>.tsv.gz`.

use crate::convert::ConvertedRow;
use crate::data_type::DownloadDataType;
use crate::error::TaskError;
use crate::header::Header;
use crate::io::tsv::write_tsv_gz;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const SUMMARY_DIR: &str = "Summary";
pub const PROJECTS_DIR: &str = "Projects";
pub const ALL_PROJECTS: &str = "all_projects";
pub const EXTENSION: &str = "tsv.gz";

/// Which slice of the data a file holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    AllProjects,
    Project(String),
}

impl Scope {
    pub fn label(&self) -> &str {
        match self {
            Scope::AllProjects => ALL_PROJECTS,
            Scope::Project(p) => p,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One table on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub data_type: DownloadDataType,
    pub scope: Scope,
    pub path: PathBuf,
    /// Data rows, header excluded.
    pub rows: usize,
    pub bytes: u64,
}

/// A converted row tagged with the project of the donor it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProjectRow {
    pub project: String,
    pub row: ConvertedRow,
}

/// Location of the `data_type` table for `scope` under `root`.
pub fn output_path(root: impl AsRef<Path>, data_type: DownloadDataType, scope: &Scope) -> PathBuf {
    let root = root.as_ref();
    match scope {
        Scope::AllProjects => {
            root.join(SUMMARY_DIR)
                .join(format!("{}.{ALL_PROJECTS}.{EXTENSION}", data_type.id()))
        }
        Scope::Project(p) => {
            let p = path_safe(p);
            root.join(PROJECTS_DIR)
                .join(&p)
                .join(format!("{}.{p}.{EXTENSION}", data_type.id()))
        }
    }
}

/// Project codes end up in file names; keep them to a single path segment.
///
/// `%` and the path separators are percent-encoded, so distinct codes never
/// share a file. Codes that are not a usable segment on their own (`""`,
/// `.`, `..`) get encodings no other code can produce.
fn path_safe(project: &str) -> String {
    match project {
        "" => "%".to_string(),
        "." => "%2E".to_string(),
        ".." => "%2E%2E".to_string(),
        _ => {
            let mut out = String::with_capacity(project.len());
            for c in project.chars() {
                match c {
                    '%' => out.push_str("%25"),
                    '/' => out.push_str("%2F"),
                    '\\' => out.push_str("%5C"),
                    '\0' => out.push_str("%00"),
                    c => out.push(c),
                }
            }
            out
        }
    }
}

/// Write one table: `header` first, then every row.
pub fn write(
    data_type: DownloadDataType,
    header: &Header,
    rows: &[ConvertedRow],
    output: impl AsRef<Path>,
) -> Result<OutputFile, TaskError> {
    let refs: Vec<&ConvertedRow> = rows.iter().collect();
    write_scope(output.as_ref(), data_type, header, Scope::AllProjects, &refs, None)
}

/// Writes the tables of one branch.
#[derive(Clone, Debug)]
pub struct OutputWriter {
    root: PathBuf,
    split_by_project: bool,
    shards: Option<usize>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            split_by_project: false,
            shards: None,
        }
    }

    pub fn split_by_project(mut self, on: bool) -> Self {
        self.split_by_project = on;
        self
    }

    /// Number of compressed shards per table; `None` picks one from the CPU count.
    pub fn shards(mut self, shards: Option<usize>) -> Self {
        self.shards = shards;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write the summary table and, if enabled, one table per project.
    pub fn write(
        &self,
        data_type: DownloadDataType,
        header: &Header,
        rows: &[ProjectRow],
    ) -> Result<Vec<OutputFile>, TaskError> {
        let all: Vec<&ConvertedRow> = rows.iter().map(|r| &r.row).collect();
        let mut files = vec![write_scope(
            &self.root,
            data_type,
            header,
            Scope::AllProjects,
            &all,
            self.shards,
        )?];

        if self.split_by_project {
            let mut by_project: BTreeMap<&str, Vec<&ConvertedRow>> = BTreeMap::new();
            // Donors without a project only appear in the summary.
            for r in rows.iter().filter(|r| !r.project.is_empty()) {
                by_project.entry(r.project.as_str()).or_default().push(&r.row);
            }
            for (project, project_rows) in by_project {
                files.push(write_scope(
                    &self.root,
                    data_type,
                    header,
                    Scope::Project(project.to_string()),
                    &project_rows,
                    self.shards,
                )?);
            }
        }
        Ok(files)
    }
}

fn write_scope(
    root: &Path,
    data_type: DownloadDataType,
    header: &Header,
    scope: Scope,
    rows: &[&ConvertedRow],
    shards: Option<usize>,
) -> Result<OutputFile, TaskError> {
    let path = output_path(root, data_type, &scope);
    let bytes = write_tsv_gz(&path, header.columns(), rows, shards).map_err(|cause| {
        TaskError::Output {
            data_type: data_type.id().to_string(),
            path: path.clone(),
            cause,
        }
    })?;
    debug!(data_type = %data_type, scope = %scope, rows = rows.len(), bytes, path = %path.display(), "wrote table");
    Ok(OutputFile {
        data_type,
        scope,
        path,
        rows: rows.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::header;
    use crate::record::PROJECT_ID;
    use crate::testing::Table;
    use std::collections::HashSet;

    #[test]
    fn naming_follows_scope() {
        let root = Path::new("/out");
        assert_eq!(
            output_path(root, DownloadDataType::Sample, &Scope::AllProjects),
            Path::new("/out/Summary/sample.all_projects.tsv.gz")
        );
        assert_eq!(
            output_path(root, DownloadDataType::DonorTherapy, &Scope::Project("BRCA-US".into())),
            Path::new("/out/Projects/BRCA-US/donor_therapy.BRCA-US.tsv.gz")
        );
    }

    #[test]
    fn project_codes_stay_inside_the_root() {
        assert_eq!(path_safe("a/b"), "a%2Fb");
        assert_eq!(path_safe(r"a\b"), "a%5Cb");
        assert_eq!(path_safe("50%"), "50%25");
        assert_eq!(path_safe(".."), "%2E%2E");
        assert_eq!(path_safe(""), "%");
    }

    #[test]
    fn distinct_project_codes_get_distinct_files() {
        let codes = ["a/b", "a_b", "a%2Fb", "a%b", ".", "%2E", "", "%"];
        let encoded: HashSet<String> = codes.iter().map(|c| path_safe(c)).collect();
        assert_eq!(encoded.len(), codes.len());
        assert!(encoded.iter().all(|e| !e.contains('/')));
    }

    #[test]
    fn split_writes_one_file_per_project() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let rows: Vec<ProjectRow> = ["a/b", "a_b", "", "a_b"]
            .iter()
            .map(|p| ProjectRow {
                project: p.to_string(),
                row: ConvertedRow::from(vec!["x".to_string(), p.to_string()]),
            })
            .collect();
        let header = header(DownloadDataType::Donor);

        let files = OutputWriter::new(dir.path())
            .split_by_project(true)
            .write(DownloadDataType::Donor, &header, &rows)?;

        let counts: Vec<(String, usize)> = files.iter().map(|f| (f.scope.to_string(), f.rows)).collect();
        assert_eq!(
            counts,
            vec![
                (ALL_PROJECTS.to_string(), 4),
                ("a/b".to_string(), 1),
                ("a_b".to_string(), 2),
            ]
        );
        assert_ne!(files[1].path, files[2].path);
        assert_eq!(Table::read(&files[1].path)?.values(PROJECT_ID), vec!["a/b"]);
        assert_eq!(Table::read(&files[2].path)?.rows.len(), 2);
        Ok(())
    }

    #[test]
    fn write_puts_the_header_first() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let header = header(DownloadDataType::DonorExposure);
        let width = header.columns().len();
        let rows: Vec<ConvertedRow> = (0..5)
            .map(|i| ConvertedRow::from(vec![format!("D{i}"); width]))
            .collect();

        let file = write(DownloadDataType::DonorExposure, &header, &rows, dir.path())?;

        assert_eq!(file.data_type, DownloadDataType::DonorExposure);
        assert_eq!(file.scope, Scope::AllProjects);
        assert_eq!(file.path, output_path(dir.path(), DownloadDataType::DonorExposure, &Scope::AllProjects));
        assert_eq!(file.rows, 5);
        assert_eq!(file.bytes, std::fs::metadata(&file.path)?.len());

        let table = Table::read(&file.path)?;
        assert!(table.has_header_of(DownloadDataType::DonorExposure));
        assert_eq!(table.rows.len(), 5);
        assert_eq!(table.rows[0].len(), width);
        Ok(())
    }

    #[test]
    fn write_with_no_rows_leaves_a_header_only_table() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = write(DownloadDataType::Sample, &header(DownloadDataType::Sample), &[], dir.path())?;

        assert_eq!(file.rows, 0);
        assert!(file.bytes > 0);
        let table = Table::read(&file.path)?;
        assert!(table.has_header_of(DownloadDataType::Sample));
        assert!(table.rows.is_empty());
        Ok(())
    }
}
