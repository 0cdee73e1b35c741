//! Durable per-source submission cursors.
//!
//! `progress.json` maps each source tag to its last submitted row:
//!   { "my_mbb": { "last_submitted_row_index": 260, "updated_at": "2025-08-15T09:12:03Z" } }

use bankpost_core::{RowIndex, SourceType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::LedgerError;

pub const PROGRESS_FILE: &str = "progress.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub last_submitted_row_index: RowIndex,
    /// `None` until the first write.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn at(row: RowIndex) -> Self {
        Self {
            last_submitted_row_index: row,
            updated_at: Some(Utc::now()),
        }
    }
}

/// Key-value store of cursors keyed by source type.
pub trait ProgressStore {
    /// Current record; a source never written reads as cursor 0.
    fn load(&self, source: SourceType) -> Result<ProgressRecord, LedgerError>;

    fn save(&mut self, source: SourceType, record: &ProgressRecord) -> Result<(), LedgerError>;
}

impl<S: ProgressStore + ?Sized> ProgressStore for &mut S {
    fn load(&self, source: SourceType) -> Result<ProgressRecord, LedgerError> {
        (**self).load(source)
    }

    fn save(&mut self, source: SourceType, record: &ProgressRecord) -> Result<(), LedgerError> {
        (**self).save(source, record)
    }
}

impl<S: ProgressStore + ?Sized> ProgressStore for Box<S> {
    fn load(&self, source: SourceType) -> Result<ProgressRecord, LedgerError> {
        (**self).load(source)
    }

    fn save(&mut self, source: SourceType, record: &ProgressRecord) -> Result<(), LedgerError> {
        (**self).save(source, record)
    }
}

/// Single JSON file store. Every save rewrites the file through a temp file
/// and a rename, so a crash leaves either the old or the new content.
#[derive(Debug, Clone)]
pub struct JsonProgressStore {
    path: PathBuf,
}

impl JsonProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<state_dir>/progress.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self::new(state_dir.join(PROGRESS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> LedgerError {
        LedgerError::ProgressIo {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<BTreeMap<SourceType, ProgressRecord>, LedgerError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_err(e)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| LedgerError::ProgressCorrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_all(&self, records: &BTreeMap<SourceType, ProgressRecord>) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let json = serde_json::to_string_pretty(records).map_err(|source| LedgerError::ProgressCorrupt {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(|e| self.io_err(e))?;
        file.write_all(json.as_bytes()).map_err(|e| self.io_err(e))?;
        file.sync_all().map_err(|e| self.io_err(e))?;
        drop(file);
        fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }
}

impl ProgressStore for JsonProgressStore {
    fn load(&self, source: SourceType) -> Result<ProgressRecord, LedgerError> {
        Ok(self.read_all()?.remove(&source).unwrap_or_default())
    }

    fn save(&mut self, source: SourceType, record: &ProgressRecord) -> Result<(), LedgerError> {
        let mut records = self.read_all()?;
        records.insert(source, record.clone());
        self.write_all(&records)?;
        tracing::trace!(source = %source, cursor = record.last_submitted_row_index, "progress saved");
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryProgressStore {
    records: BTreeMap<SourceType, ProgressRecord>,
    writes: usize,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(mut self, source: SourceType, row: RowIndex) -> Self {
        self.records.insert(source, ProgressRecord::at(row));
        self
    }

    /// Number of `save` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ProgressStore for MemoryProgressStore {
    fn load(&self, source: SourceType) -> Result<ProgressRecord, LedgerError> {
        Ok(self.records.get(&source).cloned().unwrap_or_default())
    }

    fn save(&mut self, source: SourceType, record: &ProgressRecord) -> Result<(), LedgerError> {
        self.records.insert(source, record.clone());
        self.writes += 1;
        Ok(())
    }
}
