//! File scanning: path to lazy frame plus column descriptions.
//!
//! Format is taken from `ScanOptions::format` when set, otherwise detected from
//! the file extension (including `.vcf.gz`). Columnar and delimited formats are
//! scanned lazily; plain JSON has no streaming reader and is read whole.

use crate::config::AppConfig;
use crate::error::ScanError;
use lazygrid_cli::{Args, FileFormat};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// Lazy frame and per-column descriptions produced by a scan.
pub type ScanResult = (LazyFrame, HashMap<String, String>);

#[derive(Debug, Default, Clone)]
pub struct ScanOptions {
    pub format: Option<FileFormat>,
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub infer_schema_length: Option<usize>,
    pub ignore_errors: bool,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_infer_schema_length(mut self, n: usize) -> Self {
        self.infer_schema_length = Some(n);
        self
    }

    /// CLI args take precedence over config.
    pub fn from_args_and_config(args: &Args, config: &AppConfig) -> Self {
        let has_header = match args.no_header {
            Some(no_header) => Some(!no_header),
            None => config.file_loading.has_header,
        };
        Self {
            format: args.format,
            delimiter: args.delimiter.or(config.file_loading.delimiter),
            has_header,
            infer_schema_length: args
                .infer_schema_length
                .or(config.file_loading.infer_schema_length),
            ignore_errors: args
                .ignore_errors
                .or(config.file_loading.ignore_errors)
                .unwrap_or(false),
        }
    }

    fn csv_reader(&self, path: &Path, default_separator: u8) -> Result<LazyCsvReader, ScanError> {
        let pl_path = PlPath::Local(std::sync::Arc::from(path));
        let mut reader = LazyCsvReader::new(pl_path)
            .with_separator(self.delimiter.unwrap_or(default_separator))
            .with_ignore_errors(self.ignore_errors);
        if let Some(has_header) = self.has_header {
            reader = reader.with_has_header(has_header);
        }
        if let Some(n) = self.infer_schema_length {
            reader = reader.with_infer_schema_length(Some(n));
        }
        Ok(reader)
    }
}

/// Scan `path` with default options.
pub fn scan(path: &Path) -> Result<ScanResult, ScanError> {
    scan_with(path, &ScanOptions::default())
}

pub fn scan_with(path: &Path, options: &ScanOptions) -> Result<ScanResult, ScanError> {
    if !path.exists() {
        return Err(ScanError::NotFound(path.to_path_buf()));
    }
    let format = match options.format.or_else(|| FileFormat::from_path(path)) {
        Some(format) => format,
        None => return Err(ScanError::UnsupportedFormat(extension_label(path))),
    };
    tracing::debug!(path = %path.display(), ?format, "scanning file");

    let lf = match format {
        FileFormat::Parquet => {
            let pl_path = PlPath::Local(std::sync::Arc::from(path));
            LazyFrame::scan_parquet(pl_path, Default::default())?
        }
        FileFormat::Csv => options.csv_reader(path, b',')?.finish()?,
        FileFormat::Tsv => options.csv_reader(path, b'\t')?.finish()?,
        FileFormat::Psv => options.csv_reader(path, b'|')?.finish()?,
        FileFormat::Jsonl => {
            let pl_path = PlPath::Local(std::sync::Arc::from(path));
            LazyJsonLineReader::new(pl_path).finish()?
        }
        FileFormat::Json => {
            let file = File::open(path)?;
            JsonReader::new(file)
                .with_json_format(JsonFormat::Json)
                .finish()?
                .lazy()
        }
        FileFormat::Arrow => {
            let pl_path = PlPath::Local(std::sync::Arc::from(path));
            LazyFrame::scan_ipc(pl_path, Default::default(), Default::default())?
        }
        FileFormat::Vcf => return scan_variants(path, options),
        FileFormat::Bcf => {
            return Err(ScanError::MissingCapability {
                format: "BCF",
                capability: "a binary BCF decoder, which is not available; convert to .vcf.gz",
            })
        }
    };
    Ok((lf, HashMap::new()))
}

#[cfg(feature = "bio")]
fn scan_variants(path: &Path, options: &ScanOptions) -> Result<ScanResult, ScanError> {
    crate::vcf::scan_vcf(path, options.infer_schema_length)
}

#[cfg(not(feature = "bio"))]
fn scan_variants(_path: &Path, _options: &ScanOptions) -> Result<ScanResult, ScanError> {
    Err(ScanError::MissingCapability {
        format: "VCF",
        capability: "the `bio` feature",
    })
}

/// `.vcf.gz`-style label for error messages.
fn extension_label(path: &Path) -> String {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    match name.find('.') {
        Some(i) if i + 1 < name.len() => name[i..].to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let err = scan(Path::new("/definitely/not/here.csv")).err().unwrap();
        assert!(matches!(err, ScanError::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.xyz");
        std::fs::write(&path, "hello").unwrap();
        match scan(&path).err().unwrap() {
            ScanError::UnsupportedFormat(ext) => assert_eq!(ext, ".xyz"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bcf_missing_capability() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.bcf");
        std::fs::write(&path, [0u8; 4]).unwrap();
        assert!(matches!(
            scan(&path).err().unwrap(),
            ScanError::MissingCapability { format: "BCF", .. }
        ));
    }

    #[test]
    fn test_extension_label() {
        assert_eq!(extension_label(Path::new("a/b.vcf.gz")), ".vcf.gz");
        assert_eq!(extension_label(Path::new("README")), "");
    }

    #[test]
    fn test_psv_and_format_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.txt");
        std::fs::write(&path, "a|b\n1|x\n2|y\n").unwrap();
        let options = ScanOptions::new().with_format(FileFormat::Psv);
        let (lf, desc) = scan_with(&path, &options).unwrap();
        let df = lf.collect().unwrap();
        assert_eq!(df.shape(), (2, 2));
        assert!(desc.is_empty());
    }
}
