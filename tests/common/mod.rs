#![allow(dead_code)]

use lazygrid::{FrameRegistry, GridOptions, GridSession};
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub const DEPTS: [&str; 3] = ["Engineering", "Sales", "Support"];

/// 20 rows: `id` 0..19, `dept` cycling through three values, `age` 20..49.
pub fn people_df() -> DataFrame {
    df!(
        "id" => (0..20i64).collect::<Vec<_>>(),
        "dept" => (0..20).map(|i| DEPTS[i % 3]).collect::<Vec<_>>(),
        "age" => (0..20i64).map(|i| 20 + (i * 7) % 30).collect::<Vec<_>>()
    )
    .unwrap()
}

pub fn people() -> LazyFrame {
    people_df().lazy()
}

pub fn session_over(lf: LazyFrame, chunk_size: usize) -> GridSession {
    let options = GridOptions::default().with_chunk_size(chunk_size);
    let mut session = GridSession::new("people", FrameRegistry::new(), options);
    session.initialize(lf, HashMap::new());
    session
}

pub fn people_session(chunk_size: usize) -> GridSession {
    session_over(people(), chunk_size)
}

pub fn row_ids(session: &GridSession) -> Vec<i64> {
    session
        .state()
        .rows
        .iter()
        .map(|row| row["__row_id__"].as_i64().unwrap())
        .collect()
}

pub fn column_values(session: &GridSession, field: &str) -> Vec<serde_json::Value> {
    session
        .state()
        .rows
        .iter()
        .map(|row| row[field].clone())
        .collect()
}

pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame, separator: u8) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    CsvWriter::new(&mut file)
        .with_separator(separator)
        .finish(df)
        .unwrap();
    path
}

pub fn write_parquet(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
    path
}

pub fn write_ipc(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    IpcWriter::new(&mut file).finish(df).unwrap();
    path
}

pub fn write_ndjson(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    JsonWriter::new(&mut file)
        .with_json_format(JsonFormat::JsonLines)
        .finish(df)
        .unwrap();
    path
}
