//! Canned donor data, input writers and an output table reader.

use crate::data_type::DownloadDataType;
use crate::header::header;
use crate::io::compression::auto_detect_reader;
use crate::record::DonorRecord;
use crate::testing::builders::{DonorBuilder, SpecimenBuilder};
use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Two projects, three donors:
///
/// - `D1`/`PRJ1`: specimen `S1` with sample `A`, specimen `S2` with samples
///   `B` and `C`, two exposures, one therapy.
/// - `D2`/`PRJ1`: one specimen without samples, one family member.
/// - `D3`/`PRJ2`: specimen `S4` with sample `D`, no nested donor arrays.
#[must_use]
pub fn scenario_donors() -> Vec<DonorRecord> {
    vec![
        DonorBuilder::new("D1", "PRJ1")
            .field("donor_sex", "female")
            .field("donor_age_at_diagnosis", 45)
            .specimen(
                SpecimenBuilder::new("S1")
                    .field("specimen_type", "Primary tumour")
                    .sample("A"),
            )
            .specimen(
                SpecimenBuilder::new("S2")
                    .field("specimen_interval", 12)
                    .sample("B")
                    .sample("C"),
            )
            .exposure(json!({"exposure_type": "tobacco", "tobacco_smoking_intensity": 1.5}))
            .exposure(json!({"exposure_type": "alcohol", "alcohol_history": "yes"}))
            .therapy(json!({"first_therapy_type": "chemotherapy", "first_therapy_duration": 90}))
            .build(),
        DonorBuilder::new("D2", "PRJ1")
            .field("donor_sex", "male")
            .specimen(SpecimenBuilder::new("S3"))
            .family(json!({"relationship_type": "sibling", "relationship_age": 61}))
            .build(),
        DonorBuilder::new("D3", "PRJ2")
            .field("donor_vital_status", "alive")
            .specimen(SpecimenBuilder::new("S4").sample("D"))
            .build(),
    ]
}

/// Write donors as JSON Lines; a `.gz` path is gzip compressed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_donors_jsonl(path: impl AsRef<Path>, donors: &[DonorRecord]) -> Result<PathBuf> {
    let lines: Vec<String> = donors
        .iter()
        .map(serde_json::to_string)
        .collect::<Result<_, _>>()
        .context("serialize donors")?;
    write_jsonl_lines(path, &lines)
}

/// Write raw lines, one per record; handy for injecting malformed input.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_jsonl_lines<S: AsRef<str>>(path: impl AsRef<Path>, lines: &[S]) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w: Box<dyn Write> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzEncoder::new(BufWriter::new(f), Compression::fast()))
    } else {
        Box::new(BufWriter::new(f))
    };
    for line in lines {
        w.write_all(line.as_ref().as_bytes())?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    drop(w);
    Ok(path.to_path_buf())
}

/// A decoded output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Read a gzipped TSV table, decoding every gzip member.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable or empty.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let rdr = auto_detect_reader(f, path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .quoting(false)
            .has_headers(false)
            .flexible(true)
            .from_reader(rdr);

        let mut records = Vec::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = rec.with_context(|| format!("parse TSV record #{} in {}", i + 1, path.display()))?;
            records.push(rec.iter().map(str::to_string).collect::<Vec<_>>());
        }
        let mut records = records.into_iter();
        let Some(header) = records.next() else {
            bail!("{} has no header line", path.display());
        };
        Ok(Self {
            header,
            rows: records.collect(),
        })
    }

    /// Position of `name` in the header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Every value of column `name`, in row order.
    ///
    /// # Panics
    ///
    /// Panics if the table has no such column.
    #[must_use]
    pub fn values(&self, name: &str) -> Vec<&str> {
        let idx = self
            .column(name)
            .unwrap_or_else(|| panic!("no column '{name}' in {:?}", self.header));
        self.rows.iter().map(|r| r[idx].as_str()).collect()
    }

    /// Whether the header is exactly the canonical one for `data_type`.
    pub fn has_header_of(&self, data_type: DownloadDataType) -> bool {
        self.header.iter().map(String::as_str).eq(header(data_type).iter().copied())
    }
}
