//! Gzipped TSV table writing.
//!
//! A table is one gzip member holding the header line followed by one member
//! per data shard. Shards are serialized and compressed in parallel (feature
//! `parallel-io`) and appended in shard order, so the file is a valid
//! multi-member gzip stream whose first line is always the header.
//!
//! The file is written to a temporary sibling and renamed into place, so a
//! reader never sees a table without its header.
//!
//! Fields are never quoted. A backslash, tab, newline or carriage return
//! inside a value is written as `\\`, `\t`, `\n` or `\r`, so every line
//! is one record and every tab is a column boundary.

use crate::io::compression::gzip_member;
use anyhow::{Context, Result};
use csv::{QuoteStyle, WriterBuilder};
use std::borrow::Cow;
use std::fs::create_dir_all;
use std::io::Write;
use std::path::Path;

/// Write `header` and `rows` to `path` as gzipped TSV. Returns the file size.
///
/// * `shards`: if `None`, defaults to `2 * num_cpus()`, clamped to `[1, rows.len()]`.
pub fn write_tsv_gz<R>(
    path: impl AsRef<Path>,
    header: &[&str],
    rows: &[R],
    shards: Option<usize>,
) -> Result<u64>
where
    R: AsRef<[String]> + Sync,
{
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;

    let header_bytes = encode_records(std::iter::once(header))?;
    let mut members = vec![gzip_member(&header_bytes)?];
    members.extend(encode_shards(rows, shards)?);

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temporary file in {}", parent.display()))?;
    let mut size = 0u64;
    for member in &members {
        tmp.write_all(member)
            .with_context(|| format!("write {}", path.display()))?;
        size += member.len() as u64;
    }
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("rename into {}", path.display()))?;
    Ok(size)
}

#[cfg(feature = "parallel-io")]
fn encode_shards<R: AsRef<[String]> + Sync>(
    rows: &[R],
    shards: Option<usize>,
) -> Result<Vec<Vec<u8>>> {
    use rayon::prelude::*;

    split_ranges(rows.len(), shard_count(rows.len(), shards))
        .into_par_iter()
        .map(|(start, end)| encode_shard(&rows[start..end]))
        .collect()
}

#[cfg(not(feature = "parallel-io"))]
fn encode_shards<R: AsRef<[String]> + Sync>(
    rows: &[R],
    shards: Option<usize>,
) -> Result<Vec<Vec<u8>>> {
    split_ranges(rows.len(), shard_count(rows.len(), shards))
        .into_iter()
        .map(|(start, end)| encode_shard(&rows[start..end]))
        .collect()
}

fn encode_shard<R: AsRef<[String]>>(rows: &[R]) -> Result<Vec<u8>> {
    let plain = encode_records(rows.iter().map(|r| r.as_ref()))?;
    gzip_member(&plain)
}

fn encode_records<I, F>(records: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = F>,
    F: IntoIterator,
    F::Item: AsRef<[u8]>,
{
    let mut buf = Vec::new();
    {
        let mut wtr = WriterBuilder::new()
            .delimiter(b'\t')
            .quote_style(QuoteStyle::Never)
            .has_headers(false)
            .from_writer(&mut buf);
        for (i, rec) in records.into_iter().enumerate() {
            for field in rec {
                wtr.write_field(escape_field(field.as_ref()))
                    .with_context(|| format!("serialize TSV row #{}", i + 1))?;
            }
            wtr.write_record(None::<&[u8]>)
                .with_context(|| format!("serialize TSV row #{}", i + 1))?;
        }
        wtr.flush()?;
    }
    Ok(buf)
}

fn escape_field(field: &[u8]) -> Cow<'_, [u8]> {
    if !field.iter().any(|&b| matches!(b, b'\\' | b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(field);
    }
    let mut out = Vec::with_capacity(field.len() + 4);
    for &b in field {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\t' => out.extend_from_slice(b"\\t"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            _ => out.push(b),
        }
    }
    Cow::Owned(out)
}

fn shard_count(len: usize, shards: Option<usize>) -> usize {
    shards
        .unwrap_or_else(|| 2 * num_cpus::get().max(2))
        .clamp(1, len.max(1))
}

/// Split `[0, len)` into at most `parts` non-empty contiguous ranges.
fn split_ranges(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let parts = parts.max(1).min(len.max(1));
    let base = len / parts;
    let rem = len % parts;

    let mut out = Vec::with_capacity(parts);
    let mut start = 0usize;
    for idx in 0..parts {
        let end = start + base + usize::from(idx < rem);
        if start < end {
            out.push((start, end));
        }
        start = end;
    }
    out
}
