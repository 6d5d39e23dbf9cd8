//! Variant Call Format scanning.
//!
//! The body of a VCF file is tab-separated text, so plain files go through the
//! lazy CSV reader after the `##` meta lines. Gzip/BGZF files are inflated into
//! memory first. Header meta lines supply per-column descriptions.

use crate::error::ScanError;
use flate2::read::MultiGzDecoder;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::Path;

/// Standard descriptions for the fixed VCF columns.
pub const STANDARD_DESCRIPTIONS: [(&str, &str); 8] = [
    ("chrom", "Chromosome or contig name"),
    ("start", "Start position of the variant (1-based by default)"),
    ("end", "End position of the variant"),
    ("id", "Variant identifier (e.g. dbSNP rsID); '.' if unknown"),
    ("ref", "Reference allele bases"),
    ("alt", "Alternate allele bases (comma-separated if multiple)"),
    ("qual", "Phred-scaled quality score for the ALT assertion"),
    ("filter", "Filter status: PASS if the variant passed all filters"),
];

/// Header lines of a VCF file: the `##` meta lines, not the `#CHROM` row.
#[derive(Debug, Default, Clone)]
pub struct VcfHeader {
    pub meta_lines: Vec<String>,
}

impl VcfHeader {
    pub fn read(path: &Path) -> Result<Self, ScanError> {
        let file = File::open(path)?;
        if is_gzipped(path) {
            Self::from_reader(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, ScanError> {
        let mut meta_lines = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.starts_with("##") {
                break;
            }
            meta_lines.push(line);
        }
        Ok(Self { meta_lines })
    }

    /// Standard descriptions overlaid with `##INFO`/`##FORMAT` descriptions.
    /// `##FILTER` lines are folded into the `filter` description.
    pub fn descriptions(&self) -> HashMap<String, String> {
        let mut out: HashMap<String, String> = STANDARD_DESCRIPTIONS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let Ok(re) = Regex::new(
            r#"^##(?P<kind>INFO|FORMAT|FILTER)=<ID=(?P<id>[^,>]+).*?Description="(?P<desc>(?:[^"\\]|\\.)*)""#,
        ) else {
            return out;
        };
        let mut filters = Vec::new();
        for line in &self.meta_lines {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            let id = &caps["id"];
            let desc = caps["desc"].replace("\\\"", "\"");
            match &caps["kind"] {
                "FILTER" => filters.push(format!("{}: {}", id, desc)),
                _ => {
                    out.insert(id.to_lowercase(), desc);
                }
            }
        }
        if !filters.is_empty() {
            out.insert(
                "filter".to_string(),
                format!("Filter status. {}", filters.join("; ")),
            );
        }
        out
    }

    /// `##INFO` declarations in header order.
    pub fn info_fields(&self) -> Vec<InfoField> {
        let Ok(re) = Regex::new(
            r"^##INFO=<ID=(?P<id>[^,>]+),Number=(?P<number>[^,>]+),Type=(?P<kind>[^,>]+)",
        ) else {
            return Vec::new();
        };
        self.meta_lines
            .iter()
            .filter_map(|line| re.captures(line))
            .map(|caps| InfoField {
                id: caps["id"].to_string(),
                number: caps["number"].to_string(),
                kind: caps["kind"].to_string(),
            })
            .collect()
    }
}

/// One `##INFO` declaration. The VCF header fixes the key order as
/// `ID`, `Number`, `Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoField {
    pub id: String,
    pub number: String,
    pub kind: String,
}

impl InfoField {
    pub fn column_name(&self) -> String {
        self.id.to_lowercase()
    }

    /// Single-valued integers and floats are typed, flags are booleans and
    /// everything else stays text.
    pub fn dtype(&self) -> DataType {
        match (self.kind.as_str(), self.number.as_str()) {
            ("Flag", _) => DataType::Boolean,
            ("Integer", "1") => DataType::Int64,
            ("Float", "1") => DataType::Float64,
            _ => DataType::String,
        }
    }

    /// Value of this field pulled out of the `KEY=VALUE;FLAG` INFO string.
    /// Missing keys come out null, as do unparseable numbers such as `.`.
    pub fn expr(&self, info_column: &str) -> Expr {
        let key = regex::escape(&self.id);
        let info = col(info_column).str();
        match self.dtype() {
            DataType::Boolean => info.contains(lit(format!("(?:^|;){}(?:;|$)", key)), false),
            dtype => {
                let value = info.extract(lit(format!("(?:^|;){}=([^;]*)", key)), 1);
                if dtype == DataType::String {
                    value
                } else {
                    value.cast(dtype)
                }
            }
        }
    }
}

pub fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz") || e.eq_ignore_ascii_case("bgz"))
}

/// Output name for a VCF body column.
pub fn normalize_column_name(name: &str) -> String {
    match name.trim_start_matches('#').to_ascii_uppercase().as_str() {
        "CHROM" => "chrom".to_string(),
        "POS" => "start".to_string(),
        other => other.to_lowercase(),
    }
}

/// Scan a `.vcf`, `.vcf.gz` or `.vcf.bgz` file. Returns the lazy frame and the
/// column description map.
pub fn scan_vcf(
    path: &Path,
    infer_schema_length: Option<usize>,
) -> Result<(LazyFrame, HashMap<String, String>), ScanError> {
    let header = VcfHeader::read(path)?;
    let skip_lines = header.meta_lines.len();

    let lf = if is_gzipped(path) {
        let mut decompressed = Vec::new();
        MultiGzDecoder::new(File::open(path)?).read_to_end(&mut decompressed)?;
        let mut read_options = CsvReadOptions::default();
        read_options.has_header = true;
        read_options.skip_lines = skip_lines;
        read_options.infer_schema_length = infer_schema_length;
        let read_options = read_options
            .map_parse_options(|opts| opts.with_separator(b'\t').with_quote_char(None));
        CsvReader::new(Cursor::new(decompressed))
            .with_options(read_options)
            .finish()?
            .lazy()
    } else {
        let pl_path = PlPath::Local(std::sync::Arc::from(path));
        LazyCsvReader::new(pl_path)
            .with_separator(b'\t')
            .with_quote_char(None)
            .with_has_header(true)
            .with_skip_lines(skip_lines)
            .with_infer_schema_length(infer_schema_length)
            .finish()?
    };

    let lf = normalize_columns(lf, &header.info_fields())?;
    tracing::debug!(
        path = %path.display(),
        meta_lines = skip_lines,
        "scanned VCF"
    );
    Ok((lf, header.descriptions()))
}

/// Lower-case the column names, expand the declared INFO fields into their
/// own columns and derive `end` from `start` and the reference allele length
/// when the file has no END column. An INFO `END`, when declared, wins over
/// the derived value.
fn normalize_columns(mut lf: LazyFrame, info_fields: &[InfoField]) -> PolarsResult<LazyFrame> {
    let schema = lf.collect_schema()?;
    let mut order = Vec::with_capacity(schema.len() + info_fields.len() + 1);
    let mut renames = Vec::with_capacity(schema.len());
    for name in schema.iter_names() {
        let renamed = normalize_column_name(name);
        renames.push(col(name.as_str()).alias(renamed.as_str()));
        order.push(renamed);
    }
    let has = |names: &[String], n: &str| names.iter().any(|x| x == n);
    let derive_end = has(&order, "start") && has(&order, "ref") && !has(&order, "end");

    // Renames first: every expression below reads the new names.
    let mut lf = lf.select(renames);

    let mut info_names: Vec<String> = Vec::new();
    if has(&order, "info") {
        let mut exprs = Vec::new();
        for field in info_fields {
            let name = field.column_name();
            if has(&order, &name) || has(&info_names, &name) {
                continue;
            }
            exprs.push(field.expr("info").alias(name.as_str()));
            info_names.push(name);
        }
        if !exprs.is_empty() {
            lf = lf.with_columns(exprs);
        }
    }

    if derive_end {
        let derived = col("start").cast(DataType::Int64)
            + col("ref").str().len_chars().cast(DataType::Int64)
            - lit(1i64);
        let end = match info_names.iter().position(|n| n == "end") {
            Some(at) => {
                info_names.remove(at);
                when(col("end").is_not_null())
                    .then(col("end").cast(DataType::Int64))
                    .otherwise(derived)
            }
            None => derived,
        };
        lf = lf.with_column(end.alias("end"));
        let at = order.iter().position(|n| n == "start").map_or(0, |i| i + 1);
        order.insert(at, "end".to_string());
    }
    order.extend(info_names);

    let columns: Vec<Expr> = order.iter().map(|n| col(n.as_str())).collect();
    Ok(lf.select(columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "##fileformat=VCFv4.2\n\
##FILTER=<ID=PASS,Description=\"All filters passed\">\n\
##FILTER=<ID=q10,Description=\"Quality below 10\">\n\
##INFO=<ID=DP,Number=1,Type=Integer,Description=\"Total Depth\">\n\
##INFO=<ID=AF,Number=A,Type=Float,Description=\"Allele Frequency\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\trs1\tA\tG\t50\tPASS\tDP=10;AF=0.5\n\
chr1\t200\t.\tAT\tA\t20\tq10\tDP=3;AF=0.1\n\
chr2\t300\trs3\tG\tC,T\t99\tPASS\tDP=40;AF=0.9\n";

    #[test]
    fn test_header_descriptions() {
        let header = VcfHeader::from_reader(Cursor::new(SAMPLE)).unwrap();
        assert_eq!(header.meta_lines.len(), 5);
        let desc = header.descriptions();
        assert_eq!(desc["dp"], "Total Depth");
        assert_eq!(desc["af"], "Allele Frequency");
        assert_eq!(desc["chrom"], "Chromosome or contig name");
        assert_eq!(
            desc["filter"],
            "Filter status. PASS: All filters passed; q10: Quality below 10"
        );
    }

    #[test]
    fn test_normalize_column_name() {
        assert_eq!(normalize_column_name("#CHROM"), "chrom");
        assert_eq!(normalize_column_name("POS"), "start");
        assert_eq!(normalize_column_name("FILTER"), "filter");
        assert_eq!(normalize_column_name("NA12878"), "na12878");
    }

    #[test]
    fn test_scan_plain_vcf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.vcf");
        std::fs::write(&path, SAMPLE).unwrap();

        let (lf, desc) = scan_vcf(&path, None).unwrap();
        let df = lf.collect().unwrap();
        assert_eq!(df.height(), 3);
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            ["chrom", "start", "end", "id", "ref", "alt", "qual", "filter", "info", "dp", "af"]
        );
        let end: Vec<Option<i64>> = df.column("end").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(end, [Some(100), Some(201), Some(300)]);
        let dp: Vec<Option<i64>> = df.column("dp").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(dp, [Some(10), Some(3), Some(40)]);
        // Number=A stays text.
        let af: Vec<Option<&str>> = df.column("af").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(af, [Some("0.5"), Some("0.1"), Some("0.9")]);
        assert_eq!(desc["dp"], "Total Depth");
    }

    #[test]
    fn test_info_fields() {
        let header = VcfHeader::from_reader(Cursor::new(SAMPLE)).unwrap();
        let fields = header.info_fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].column_name(), "dp");
        assert_eq!(fields[0].dtype(), DataType::Int64);
        assert_eq!(fields[1].number, "A");
        assert_eq!(fields[1].dtype(), DataType::String);
    }

    #[test]
    fn test_info_end_flags_and_missing_keys() {
        let sample = "##fileformat=VCFv4.2\n\
##INFO=<ID=END,Number=1,Type=Integer,Description=\"End position\">\n\
##INFO=<ID=DB,Number=0,Type=Flag,Description=\"dbSNP membership\">\n\
##INFO=<ID=QD,Number=1,Type=Float,Description=\"Quality by depth\">\n\
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
chr1\t100\t.\tA\t<DEL>\t50\tPASS\tEND=180;DB;QD=2.5\n\
chr1\t200\t.\tAT\tA\t20\tPASS\tQD=.\n\
chr2\t300\t.\tG\tC\t99\tPASS\tDBX=1\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sv.vcf");
        std::fs::write(&path, sample).unwrap();

        let (lf, _) = scan_vcf(&path, None).unwrap();
        let df = lf.collect().unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            ["chrom", "start", "end", "id", "ref", "alt", "qual", "filter", "info", "db", "qd"]
        );
        let end: Vec<Option<i64>> = df.column("end").unwrap().i64().unwrap().into_iter().collect();
        assert_eq!(end, [Some(180), Some(201), Some(300)]);
        let db: Vec<Option<bool>> = df.column("db").unwrap().bool().unwrap().into_iter().collect();
        assert_eq!(db, [Some(true), Some(false), Some(false)]);
        let qd: Vec<Option<f64>> = df.column("qd").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(qd, [Some(2.5), None, None]);
    }

    #[test]
    fn test_scan_gzipped_vcf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.vcf.gz");
        let file = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        enc.write_all(SAMPLE.as_bytes()).unwrap();
        enc.finish().unwrap();

        let (lf, desc) = scan_vcf(&path, None).unwrap();
        let df = lf.collect().unwrap();
        assert_eq!(df.height(), 3);
        assert!(df.column("chrom").is_ok());
        assert!(df.column("dp").is_ok());
        assert_eq!(desc["dp"], "Total Depth");
    }
}
