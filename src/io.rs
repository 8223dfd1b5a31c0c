use std::collections::BTreeMap;
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use chrono::Utc;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ColumnType;
use crate::error::{Result, TradeError};
use crate::normalize::coerce_types;

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1, decoded as its Windows-1252 superset.
    Latin1,
}

fn decode(bytes: Vec<u8>, encoding: TextEncoding) -> Vec<u8> {
    match encoding {
        TextEncoding::Utf8 => bytes,
        TextEncoding::Latin1 => encoding_rs::WINDOWS_1252
            .decode(&bytes)
            .0
            .into_owned()
            .into_bytes(),
    }
}

/// Parse CSV bytes with every column as String and trimmed header names.
pub fn read_csv_bytes(bytes: Vec<u8>, encoding: TextEncoding) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .into_reader_with_file_handle(Cursor::new(decode(bytes, encoding)))
        .finish()?;

    let trimmed: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.trim().to_string())
        .collect();
    df.set_column_names(trimmed.as_slice())?;
    Ok(df)
}

fn read_file(path: &Path, encoding: TextEncoding) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(TradeError::MissingData(format!(
            "file not found: {}",
            path.display()
        )));
    }
    read_csv_bytes(std::fs::read(path)?, encoding)
}

pub fn read_trade_csv(path: impl AsRef<Path>, encoding: TextEncoding) -> Result<DataFrame> {
    read_file(path.as_ref(), encoding)
}

/// Read and stack every `*.csv` in `dir`, in file-name order.
///
/// When `columns` is non-empty only those columns are kept from each file.
/// Files that cannot be read are skipped; no readable file is an error.
pub fn read_trade_dir(
    dir: impl AsRef<Path>,
    encoding: TextEncoding,
    columns: &[String],
) -> Result<DataFrame> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(TradeError::MissingData(format!(
            "directory not found: {}",
            dir.display()
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
        .collect();
    files.sort();
    info!(dir = %dir.display(), files = files.len(), "found trade files");

    let mut frames = Vec::with_capacity(files.len());
    for file in &files {
        let frame = read_file(file, encoding).and_then(|df| {
            if columns.is_empty() {
                Ok(df)
            } else {
                Ok(df.select(columns.iter().map(|c| c.as_str()))?)
            }
        });
        match frame {
            Ok(df) => frames.push(df.lazy()),
            Err(e) => warn!(file = %file.display(), error = %e, "skipping unreadable file"),
        }
    }

    if frames.is_empty() {
        return Err(TradeError::MissingData(format!(
            "no readable csv files in {}",
            dir.display()
        )));
    }
    Ok(concat(&frames, UnionArgs::default())?.collect()?)
}

/// Wide price-index table (country column plus one column per year), as strings.
pub fn read_price_index(path: impl AsRef<Path>) -> Result<DataFrame> {
    read_file(path.as_ref(), TextEncoding::Utf8)
}

// ── Snapshots ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestColumn {
    pub name: String,
    pub dtype: ColumnType,
}

/// Sidecar describing a snapshot CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub schema_version: u32,
    pub snapshot_id: Uuid,
    pub created_at: String,
    pub rows: u64,
    pub columns: Vec<ManifestColumn>,
}

/// `main.csv` → `main.manifest.toml`
pub fn manifest_path(path: &Path) -> PathBuf {
    path.with_extension("manifest.toml")
}

/// Write `df` as UTF-8 CSV plus its manifest.
pub fn write_snapshot(df: &DataFrame, path: impl AsRef<Path>) -> Result<SnapshotManifest> {
    let path = path.as_ref();
    let mut out = df.clone();
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut out)?;

    let manifest = SnapshotManifest {
        schema_version: SNAPSHOT_SCHEMA_VERSION,
        snapshot_id: Uuid::new_v4(),
        created_at: Utc::now().to_rfc3339(),
        rows: df.height() as u64,
        columns: df
            .get_columns()
            .iter()
            .map(|c| ManifestColumn {
                name: c.name().to_string(),
                dtype: ColumnType::from_data_type(c.dtype()),
            })
            .collect(),
    };
    std::fs::write(manifest_path(path), toml::to_string(&manifest)?)?;
    info!(path = %path.display(), rows = manifest.rows, id = %manifest.snapshot_id, "wrote snapshot");
    Ok(manifest)
}

/// Read a snapshot written by [`write_snapshot`], restoring column types.
pub fn read_snapshot(path: impl AsRef<Path>) -> Result<(DataFrame, SnapshotManifest)> {
    let path = path.as_ref();
    let manifest_file = manifest_path(path);
    if !manifest_file.is_file() {
        return Err(TradeError::InvalidData(format!(
            "snapshot {} has no manifest",
            path.display()
        )));
    }
    let manifest: SnapshotManifest = toml::from_str(&std::fs::read_to_string(&manifest_file)?)?;
    if manifest.schema_version != SNAPSHOT_SCHEMA_VERSION {
        return Err(TradeError::InvalidData(format!(
            "snapshot schema version {} is not supported (expected {})",
            manifest.schema_version, SNAPSHOT_SCHEMA_VERSION
        )));
    }

    let raw = read_file(path, TextEncoding::Utf8)?;
    let found: Vec<&str> = raw.get_column_names_str();
    let declared: Vec<&str> = manifest.columns.iter().map(|c| c.name.as_str()).collect();
    if found != declared {
        return Err(TradeError::InvalidData(format!(
            "snapshot columns {found:?} do not match manifest {declared:?}"
        )));
    }
    if raw.height() as u64 != manifest.rows {
        return Err(TradeError::InvalidData(format!(
            "snapshot has {} rows, manifest says {}",
            raw.height(),
            manifest.rows
        )));
    }

    let dtypes: BTreeMap<String, ColumnType> = manifest
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.dtype))
        .collect();
    let df = coerce_types(&raw, &dtypes)?;
    Ok((df, manifest))
}
