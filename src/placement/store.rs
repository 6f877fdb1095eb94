//! Placement Store
//!
//! Ordered, in-memory collection of placement records with persistence to a
//! single file. Insertion order is placement order and replay order.
//!
//! Writes go to a hidden temporary file in the same directory, are synced,
//! and are then renamed over the target, so a reader sees either the old
//! file or the complete new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{FurnishError, Result};
use crate::placement::catalog::ModelCatalog;
use crate::placement::codec;
use crate::placement::record::PlacementRecord;

/// Ordered placement records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementStore {
    records: Vec<PlacementRecord>,
}

impl PlacementStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `records` in the given order
    pub fn from_records(records: Vec<PlacementRecord>) -> Self {
        Self { records }
    }

    pub fn append(&mut self, record: PlacementRecord) {
        self.records.push(record);
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[PlacementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records whose model type exists in `catalog`
    pub fn count_valid(&self, catalog: &ModelCatalog) -> usize {
        self.records
            .iter()
            .filter(|r| catalog.contains(r.model_type))
            .count()
    }

    /// Persist all records to `path`, replacing any previous file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let write_failed = |source| FurnishError::PersistenceWriteFailed {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(write_failed)?;
            }
        }

        let bytes = codec::encode(&self.records);
        let tmp_path = temp_path(path).map_err(write_failed)?;

        let mut tmp_file = File::create(&tmp_path).map_err(write_failed)?;
        tmp_file.write_all(&bytes).map_err(write_failed)?;
        tmp_file.sync_all().map_err(write_failed)?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(write_failed(e));
        }

        debug!(path = %path.display(), count = self.records.len(), "placement store saved");
        Ok(())
    }

    /// Load records from `path`. A missing file yields an empty store.
    pub fn load_from(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(FurnishError::PersistenceReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let records = codec::decode(&bytes)?;
        debug!(path = %path.display(), count = records.len(), "placement store loaded");
        Ok(Self::from_records(records))
    }

    /// Load records from `path`, treating any failure as "no saved data".
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(store) => store,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable placement store");
                Self::new()
            }
        }
    }

    /// Delete the persisted file. A file that is already gone is not an error.
    pub fn remove_file(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FurnishError::PersistenceWriteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

fn temp_path(path: &Path) -> std::io::Result<PathBuf> {
    let file_name = path.file_name().ok_or_else(|| {
        std::io::Error::new(ErrorKind::InvalidInput, "store path has no file name")
    })?;
    let tmp_name = format!(".{}.tmp", file_name.to_string_lossy());
    Ok(path.with_file_name(tmp_name))
}
