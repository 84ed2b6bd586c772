//! Donor snapshot discovery and lenient JSON Lines reading.
//!
//! The snapshot is the `donor` dataset under the input directory, stored
//! either as a single file (`donor.jsonl`, optionally `.gz`/`.zst`) or as a
//! `donor/` directory of part files. Part files are read in parallel and
//! concatenated in path order.
//!
//! A line that does not parse as a JSON object is not fatal: it is returned
//! as a [`RecordError`] at the read stage and the rest of the file is kept.

use crate::diagnostics::{RecordError, Stage};
use crate::error::{ConversionError, TaskError};
use crate::io::compression::auto_detect_reader;
use crate::record::DonorRecord;
use anyhow::{Context, Result, anyhow};
use glob::{Pattern, glob};
use rayon::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Name of the donor dataset inside the input directory.
pub const DONOR_DATASET: &str = "donor";

const SINGLE_FILES: [&str; 3] = ["donor.jsonl", "donor.jsonl.gz", "donor.jsonl.zst"];
const PART_PATTERNS: [&str; 4] = ["*.jsonl", "*.jsonl.gz", "*.jsonl.zst", "part-*"];

/// Donors read from one or more files, plus the lines that were skipped.
#[derive(Debug, Default)]
pub struct DonorBatch {
    pub donors: Vec<DonorRecord>,
    pub errors: Vec<RecordError>,
}

impl DonorBatch {
    fn append(&mut self, mut other: DonorBatch) {
        self.donors.append(&mut other.donors);
        self.errors.append(&mut other.errors);
    }
}

/// Locate the files making up the donor snapshot under `input`.
///
/// `input` may also name a single JSONL file directly. Exactly one layout may
/// be present: one of the single files, or a `donor/` directory holding part
/// files. Several of them at once would read every donor more than once, so
/// that is an input error.
pub fn discover_donor_files(input: impl AsRef<Path>) -> Result<Vec<PathBuf>, TaskError> {
    let input = input.as_ref();
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(TaskError::InputNotFound {
            path: input.to_path_buf(),
        });
    }

    let mut sources: Vec<(PathBuf, Vec<PathBuf>)> = SINGLE_FILES
        .iter()
        .map(|name| input.join(name))
        .filter(|p| p.is_file())
        .map(|p| (p.clone(), vec![p]))
        .collect();

    let parts_dir = input.join(DONOR_DATASET);
    if parts_dir.is_dir() {
        let base = Pattern::escape(&parts_dir.to_string_lossy());
        let mut parts = Vec::new();
        for pat in PART_PATTERNS {
            let pattern = format!("{base}/{pat}");
            parts.extend(expand_files(&pattern).map_err(|cause| TaskError::Input {
                path: parts_dir.clone(),
                cause,
            })?);
        }
        parts.sort();
        parts.dedup();
        if !parts.is_empty() {
            sources.push((parts_dir, parts));
        }
    }

    match sources.len() {
        0 => Err(TaskError::InputNotFound {
            path: input.join(DONOR_DATASET),
        }),
        1 => Ok(sources.pop().map(|(_, files)| files).unwrap_or_default()),
        _ => {
            let names: Vec<String> = sources.iter().map(|(p, _)| p.display().to_string()).collect();
            Err(TaskError::Input {
                path: input.to_path_buf(),
                cause: anyhow!("ambiguous donor dataset, found {}", names.join(", ")),
            })
        }
    }
}

fn expand_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
        let path = entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            out.push(path);
        }
    }
    Ok(out)
}

/// Read every file in `files`, in parallel, keeping file order.
pub fn read_donors(files: &[PathBuf]) -> Result<DonorBatch, TaskError> {
    let batches = files
        .par_iter()
        .map(|path| {
            read_donor_file(path).map_err(|cause| TaskError::Input {
                path: path.clone(),
                cause,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = DonorBatch::default();
    for batch in batches {
        out.append(batch);
    }
    Ok(out)
}

/// Read one (possibly compressed) JSONL file.
///
/// Blank lines are ignored. I/O failures are errors; malformed lines are not.
pub fn read_donor_file(path: impl AsRef<Path>) -> Result<DonorBatch> {
    let path = path.as_ref();
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;

    let mut out = DonorBatch::default();
    for (i, line) in BufReader::new(rdr).lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_donor(&line) {
            Ok(donor) => out.donors.push(donor),
            Err(reason) => out.errors.push(RecordError::new(
                Stage::Read,
                None,
                None,
                &ConversionError::Malformed(format!("{}:{}: {reason}", path.display(), i + 1)),
            )),
        }
    }
    Ok(out)
}

fn parse_donor(line: &str) -> Result<DonorRecord, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    DonorRecord::try_from(value).map_err(|_| "line is not a JSON object".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_donor_files(dir.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), "InputNotFound");

        let err = discover_donor_files(dir.path()).unwrap_err();
        assert!(matches!(err, TaskError::InputNotFound { ref path } if path.ends_with("donor")));
    }

    #[test]
    fn part_directory_is_discovered_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let parts = dir.path().join("donor");
        fs::create_dir(&parts).unwrap();
        fs::write(parts.join("part-00001"), "{\"donor_id\":\"D2\"}\n").unwrap();
        fs::write(parts.join("part-00000.jsonl"), "{\"donor_id\":\"D1\"}\n").unwrap();
        fs::write(parts.join("_SUCCESS"), "").unwrap();

        let files = discover_donor_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        let batch = read_donors(&files).unwrap();
        let ids: Vec<_> = batch.donors.iter().filter_map(|d| d.donor_id()).collect();
        assert_eq!(ids, vec!["D1", "D2"]);
    }

    #[test]
    fn two_layouts_at_once_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("donor.jsonl"), "{\"donor_id\":\"D1\"}\n").unwrap();
        let parts = dir.path().join("donor");
        fs::create_dir(&parts).unwrap();
        fs::write(parts.join("_SUCCESS"), "").unwrap();

        // A part directory without part files does not count.
        assert_eq!(discover_donor_files(dir.path()).unwrap(), vec![dir.path().join("donor.jsonl")]);

        fs::write(parts.join("part-00000.jsonl"), "{\"donor_id\":\"D1\"}\n").unwrap();
        let err = discover_donor_files(dir.path()).unwrap_err();
        assert!(matches!(err, TaskError::Input { .. }));
        assert!(err.to_string().contains("ambiguous donor dataset"));
    }

    #[test]
    fn malformed_lines_are_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donor.jsonl");
        fs::write(&path, "{\"donor_id\":\"D1\"}\n\n{broken\n[1,2]\n{\"donor_id\":\"D2\"}\n").unwrap();

        let batch = read_donor_file(&path).unwrap();
        assert_eq!(batch.donors.len(), 2);
        assert_eq!(batch.errors.len(), 2);
        assert!(batch.errors.iter().all(|e| e.stage == Stage::Read));
        assert!(batch.errors[0].message.contains(":3:"));
    }
}
