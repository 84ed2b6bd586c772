pub mod compression;
pub mod jsonl;
pub mod tsv;
