//! Shared CLI definitions for lazygrid.
//!
//! Used by the main binary and by the build script (manpage).

use clap::{Parser, ValueEnum};
use std::path::Path;

/// File format for data files (used to bypass extension-based detection).
/// When `--format` is not specified, format is auto-detected from the file extension.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum FileFormat {
    /// Parquet columnar format
    Parquet,
    /// Comma-separated values
    Csv,
    /// Tab-separated values
    Tsv,
    /// Pipe-separated values
    Psv,
    /// JSON array format
    Json,
    /// JSON Lines / NDJSON (one JSON object per line)
    Jsonl,
    /// Arrow IPC / Feather
    Arrow,
    /// Variant Call Format (plain or gzip-compressed)
    Vcf,
    /// Binary Variant Call Format
    Bcf,
}

impl FileFormat {
    /// Detect file format from path. Handles multi-part extensions such as `.vcf.gz`.
    /// Returns None when the extension is missing or unknown.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_lowercase();
        if name.ends_with(".vcf.gz") || name.ends_with(".vcf.bgz") {
            return Some(Self::Vcf);
        }
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse format from extension string (e.g. "parquet", "csv").
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "parquet" | "pq" => Some(Self::Parquet),
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "psv" => Some(Self::Psv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            "arrow" | "ipc" | "feather" => Some(Self::Arrow),
            "vcf" => Some(Self::Vcf),
            "bcf" => Some(Self::Bcf),
            _ => None,
        }
    }
}

/// Command-line arguments for lazygrid
#[derive(Clone, Parser, Debug)]
#[command(
    name = "lazygrid",
    version,
    about = "Lazy server-side grid browsing for large tabular files",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// Path to the data file to open (not required with --generate-config)
    #[arg(required_unless_present = "generate_config", value_name = "PATH")]
    pub path: Option<std::path::PathBuf>,

    /// Force file format. By default format is auto-detected from the file extension.
    #[arg(long = "format", value_enum)]
    pub format: Option<FileFormat>,

    /// Specify that the file has no header
    #[arg(long = "no-header")]
    pub no_header: Option<bool>,

    /// Specify the delimiter to use when reading a delimited text file
    #[arg(long = "delimiter")]
    pub delimiter: Option<u8>,

    /// Number of rows to use when inferring CSV schema (default: 1000)
    #[arg(long = "infer-schema-length", value_name = "N")]
    pub infer_schema_length: Option<usize>,

    /// When reading CSV, ignore parse errors and continue with the next batch (default: false)
    #[arg(long = "ignore-errors", value_name = "BOOL", value_parser = clap::value_parser!(bool))]
    pub ignore_errors: Option<bool>,

    /// Rows loaded per scroll chunk (default: 200)
    #[arg(long = "chunk-size", value_name = "N")]
    pub chunk_size: Option<usize>,

    /// Columns with more distinct values than this are left as free text (default: 500)
    #[arg(long = "max-unique", value_name = "N")]
    pub value_options_max_unique: Option<usize>,

    /// Datasets with at most this many rows get dropdown choices computed eagerly (default: 50000)
    #[arg(long = "eager-row-limit", value_name = "N")]
    pub eager_row_limit: Option<usize>,

    /// Include the row id column in the column definitions
    #[arg(long = "show-id-field", action)]
    pub show_id_field: bool,

    /// Table name used in generated SQL (default: df)
    #[arg(long = "table-name", value_name = "NAME")]
    pub table_name: Option<String>,

    /// Use Polars streaming engine for LazyFrame collect when available (default: true). Set to false to disable.
    #[arg(long = "polars-streaming", value_name = "BOOL", value_parser = clap::value_parser!(bool))]
    pub polars_streaming: Option<bool>,

    /// Log level written to stderr (error, warn, info, debug, trace). Overrides LAZYGRID_LOG and config.
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Generate default configuration file at ~/.config/lazygrid/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}
