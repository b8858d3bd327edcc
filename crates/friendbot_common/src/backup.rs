//! Backup management for the stack database.
//!
//! One artifact per backup, named `friendbot_<timestamp>.sql[.gz]` with a
//! sortable timestamp component. The backup directory itself is the source
//! of truth; no index file is kept beside it. An empty dump is a failure,
//! not a degenerate success: pg_dump exits 0 on some partial failures, so
//! the artifact size is verified before the record exists.

use crate::config::BackupConfig;
use crate::errors::DeployError;
use crate::postgres::DatabaseAdmin;
use chrono::{NaiveDateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const ARTIFACT_PREFIX: &str = "friendbot_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// One backup artifact on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    /// Sortable identifier, e.g. `20260808_142501`
    pub timestamp_id: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub compressed: bool,
}

impl BackupRecord {
    /// Artifact creation time, derived from the identifier.
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp_id, TIMESTAMP_FORMAT).ok()
    }
}

/// Bounds how many artifacts are kept: by count, or by age when the
/// operator configured a horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    KeepLast(usize),
    KeepNewerThanDays(u32),
}

impl RetentionPolicy {
    pub fn from_config(config: &BackupConfig) -> Self {
        match config.retention_days {
            Some(days) => Self::KeepNewerThanDays(days),
            None => Self::KeepLast(config.retention_count),
        }
    }
}

/// Creates, lists and prunes backup artifacts.
pub struct BackupManager<'a> {
    db: &'a dyn DatabaseAdmin,
    dir: PathBuf,
    compress: bool,
    retention: RetentionPolicy,
}

impl<'a> BackupManager<'a> {
    pub fn new(db: &'a dyn DatabaseAdmin, config: &BackupConfig) -> Self {
        Self {
            db,
            dir: config.dir.clone(),
            compress: config.compress,
            retention: RetentionPolicy::from_config(config),
        }
    }

    /// Dump, verify, optionally compress, then enforce retention.
    pub async fn create_backup(&self) -> Result<BackupRecord, DeployError> {
        fs::create_dir_all(&self.dir)?;

        let timestamp_id = Utc::now().format(TIMESTAMP_FORMAT).to_string();
        let sql_path = self
            .dir
            .join(format!("{}{}.sql", ARTIFACT_PREFIX, timestamp_id));

        let size_bytes = self.db.dump_to(&sql_path).await?;

        if size_bytes == 0 {
            // Keep nothing around that could be mistaken for a usable dump
            let _ = fs::remove_file(&sql_path);
            return Err(DeployError::BackupEmpty);
        }

        let record = if self.compress {
            let gz_path = compress_artifact(&sql_path)?;
            let size_bytes = fs::metadata(&gz_path)?.len();
            BackupRecord {
                timestamp_id,
                file_path: gz_path,
                size_bytes,
                compressed: true,
            }
        } else {
            BackupRecord {
                timestamp_id,
                file_path: sql_path,
                size_bytes,
                compressed: false,
            }
        };

        info!(
            "[BACKUP] created {} ({} bytes)",
            record.file_path.display(),
            record.size_bytes
        );

        let deleted = self.enforce_retention()?;
        for old in &deleted {
            info!("[BACKUP] retention removed {}", old.file_path.display());
        }

        Ok(record)
    }

    /// All valid artifacts, newest first. The filesystem is authoritative;
    /// empty or unparseable files are skipped with a warning.
    pub fn list_backups(&self) -> Result<Vec<BackupRecord>, DeployError> {
        let mut records = Vec::new();

        if !self.dir.exists() {
            return Ok(records);
        }

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            match record_from_path(&path) {
                Some(record) if record.size_bytes > 0 => records.push(record),
                Some(record) => {
                    warn!(
                        "[BACKUP] ignoring empty artifact {}",
                        record.file_path.display()
                    );
                }
                None => {}
            }
        }

        records.sort_by(|a, b| b.timestamp_id.cmp(&a.timestamp_id));
        Ok(records)
    }

    /// Delete artifacts beyond the configured policy. Returns what was
    /// removed.
    pub fn enforce_retention(&self) -> Result<Vec<BackupRecord>, DeployError> {
        let records = self.list_backups()?;

        let doomed: Vec<BackupRecord> = match self.retention {
            RetentionPolicy::KeepLast(n) => records.into_iter().skip(n).collect(),
            RetentionPolicy::KeepNewerThanDays(days) => {
                let cutoff = Utc::now().naive_utc() - chrono::Duration::days(i64::from(days));
                records
                    .into_iter()
                    .filter(|r| match r.created_at() {
                        Some(created) => created < cutoff,
                        // Unparseable age: keep, never silently destroy
                        None => false,
                    })
                    .collect()
            }
        };

        for record in &doomed {
            fs::remove_file(&record.file_path)?;
        }
        Ok(doomed)
    }
}

/// Gzip an artifact in place, removing the uncompressed original.
fn compress_artifact(sql_path: &Path) -> Result<PathBuf, DeployError> {
    let gz_path = sql_path.with_extension("sql.gz");
    let mut input = fs::File::open(sql_path)?;
    let output = fs::File::create(&gz_path)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(sql_path)?;
    Ok(gz_path)
}

/// Decompress an artifact next to itself, returning the plain-SQL path.
/// Uncompressed artifacts pass through untouched.
pub fn decompress_artifact(record: &BackupRecord) -> Result<PathBuf, DeployError> {
    if !record.compressed {
        return Ok(record.file_path.clone());
    }
    let sql_path = record.file_path.with_extension("");
    let input = fs::File::open(&record.file_path)?;
    let mut decoder = flate2::read::GzDecoder::new(input);
    let mut output = fs::File::create(&sql_path)?;
    io::copy(&mut decoder, &mut output)?;
    Ok(sql_path)
}

/// Parse an artifact path into a record; `None` for foreign files.
fn record_from_path(path: &Path) -> Option<BackupRecord> {
    if !path.is_file() {
        return None;
    }
    let name = path.file_name()?.to_str()?;

    let (stem, compressed) = if let Some(stem) = name.strip_suffix(".sql.gz") {
        (stem, true)
    } else if let Some(stem) = name.strip_suffix(".sql") {
        (stem, false)
    } else {
        return None;
    };

    let timestamp_id = stem.strip_prefix(ARTIFACT_PREFIX)?;
    NaiveDateTime::parse_from_str(timestamp_id, TIMESTAMP_FORMAT).ok()?;

    let size_bytes = fs::metadata(path).ok()?.len();
    Some(BackupRecord {
        timestamp_id: timestamp_id.to_string(),
        file_path: path.to_path_buf(),
        size_bytes,
        compressed,
    })
}
