//! Codec detection for input snapshots and gzip encoding for output tables.
//!
//! Readers are wrapped transparently: the file extension is checked first and
//! the leading magic bytes are used as a fallback, so a gzip part file without
//! a `.gz` suffix still decodes. Gzip is always available; zstd is behind the
//! `compression-zstd` feature.
//!
//! Gzip input is decoded with [`MultiGzDecoder`], which reads every member of
//! a concatenated stream. The tables written by [`crate::io::tsv`] rely on
//! this: the header and each data shard are separate members.

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::OnceLock;

/// A compression format recognised on input.
pub trait CompressionCodec: Send + Sync {
    fn name(&self) -> &str;

    /// Lowercase extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;
}

fn registry() -> &'static [Box<dyn CompressionCodec>] {
    static CODECS: OnceLock<Vec<Box<dyn CompressionCodec>>> = OnceLock::new();
    CODECS.get_or_init(|| {
        vec![
            Box::new(GzipCodec),
            #[cfg(feature = "compression-zstd")]
            Box::new(ZstdCodec),
        ]
    })
}

/// Names of the codecs compiled into this build.
pub fn codec_names() -> Vec<&'static str> {
    registry().iter().map(|c| c.name()).collect()
}

/// Whether `path` carries the extension of a known codec.
pub fn is_compressed_path(path: impl AsRef<Path>) -> bool {
    detect_from_extension(path).is_some()
}

fn detect_from_extension(path: impl AsRef<Path>) -> Option<&'static dyn CompressionCodec> {
    let path = path.as_ref().to_string_lossy().to_lowercase();
    registry()
        .iter()
        .find(|codec| codec.extensions().iter().any(|ext| path.ends_with(ext)))
        .map(|codec| codec.as_ref())
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<&'static dyn CompressionCodec> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    registry()
        .iter()
        .find(|codec| codec.magic_bytes().is_some_and(|magic| buf.starts_with(magic)))
        .map(|codec| codec.as_ref())
}

/// Wrap `reader` with the decompressor matching `path_hint` or, failing
/// that, the stream's magic bytes. Plain input is returned buffered.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    if let Some(codec) = detect_from_extension(&path_hint) {
        return codec
            .wrap_reader_dyn(Box::new(reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    let mut buf_reader = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buf_reader) {
        return codec
            .wrap_reader_dyn(Box::new(buf_reader))
            .with_context(|| format!("wrap reader with {} codec", codec.name()));
    }

    Ok(Box::new(buf_reader))
}

/// Compress `bytes` into one complete gzip member.
pub fn gzip_member(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut enc = GzEncoder::new(Vec::with_capacity(bytes.len() / 4 + 32), Compression::default());
    enc.write_all(bytes).context("gzip encode")?;
    enc.finish().context("finish gzip member")
}

struct GzipCodec;

impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader_dyn(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all(mut r: Box<dyn Read>) -> String {
        let mut s = String::new();
        r.read_to_string(&mut s).unwrap();
        s
    }

    #[test]
    fn concatenated_members_decode_as_one_stream() {
        let mut bytes = gzip_member(b"a\tb\n").unwrap();
        bytes.extend(gzip_member(b"1\t2\n").unwrap());
        bytes.extend(gzip_member(b"3\t4\n").unwrap());
        let r = auto_detect_reader(Cursor::new(bytes), "t.tsv.gz").unwrap();
        assert_eq!(read_all(r), "a\tb\n1\t2\n3\t4\n");
    }

    #[test]
    fn magic_bytes_are_used_without_extension() {
        let bytes = gzip_member(b"{\"donor_id\":\"D1\"}\n").unwrap();
        let r = auto_detect_reader(Cursor::new(bytes), "part-00000").unwrap();
        assert_eq!(read_all(r), "{\"donor_id\":\"D1\"}\n");
    }

    #[test]
    fn plain_input_passes_through() {
        let r = auto_detect_reader(Cursor::new(b"plain".to_vec()), "donor.jsonl").unwrap();
        assert_eq!(read_all(r), "plain");
        assert!(!is_compressed_path("donor.jsonl"));
        assert!(is_compressed_path("donor.jsonl.GZ"));
        assert!(codec_names().contains(&"gzip"));
    }
}
