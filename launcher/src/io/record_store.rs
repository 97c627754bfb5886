//! Storage for the administrative record.
//!
//! The store is the record's only owner: every other component reads run
//! state through [`RecordStore::record`] and mutates it through
//! [`RecordStore::record_mut`]. Mutations batch in memory and hit disk only
//! at the explicit [`RecordStore::persist`] checkpoints the orchestrator
//! chooses, so an interrupted invocation never leaves a half-written
//! sequence of field updates behind.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::core::record::{Record, RepoIdentity};

/// The record file exists but cannot be parsed.
///
/// Fatal by design: the record is the sole source of scheduling truth, and
/// retrying blind against an unknown-corrupt state risks compounding the
/// corruption.
#[derive(Debug, thiserror::Error)]
#[error("administrative record {path} exists but is not valid JSON: {detail}")]
pub struct CorruptRecord {
    pub path: String,
    pub detail: String,
}

/// Exclusive owner of the on-disk administrative record.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    record: Record,
}

impl RecordStore {
    /// Load and normalize the record at `path`.
    ///
    /// An absent file yields a fully defaulted record (the file is created
    /// implicitly on the first persist). A present but unparsable file is
    /// a [`CorruptRecord`] error.
    pub fn load(path: impl Into<PathBuf>, now: DateTime<Utc>, identity: &RepoIdentity) -> Result<Self> {
        let path = path.into();
        debug!(path = %path.display(), "loading administrative record");

        let record = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read record {}", path.display()))?;
            let value: Value = serde_json::from_str(&contents).map_err(|err| CorruptRecord {
                path: path.display().to_string(),
                detail: err.to_string(),
            })?;
            Record::from_value(value, now, identity)
        } else {
            debug!("record file absent, starting from defaults");
            Record::defaulted(now, identity)
        };

        Ok(Self { path, record })
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    /// Rewrite the full record to disk (never a patch), emitting both
    /// mirror forms of every instant and preserving unknown fields.
    pub fn persist(&self) -> Result<()> {
        debug!(path = %self.path.display(), "persisting administrative record");
        let mut buf = serde_json::to_string_pretty(&self.record.to_value())
            .context("serialize record")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("record path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp record {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace record {}", path.display()))?;
    Ok(())
}
