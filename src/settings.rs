//! File-backed key-value settings
//!
//! Holds the saved map identifier between runs. The whole file is rewritten
//! on every change through a temporary file and rename; a change that
//! fails to reach disk is not applied in memory either.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FurnishError, Result};
use crate::session::SettingsStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    values: BTreeMap<String, String>,
    updated_at: Option<DateTime<Utc>>,
}

/// Settings persisted as a small JSON document.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    file: SettingsFile,
}

impl JsonSettingsStore {
    /// Open the settings at `path`; a missing file starts empty.
    pub fn open(path: &Path) -> Result<Self> {
        let file = match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => SettingsFile::default(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => SettingsFile::default(),
            Err(e) => {
                return Err(FurnishError::Settings {
                    reason: format!("cannot read {}: {}", path.display(), e),
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the file was last written, if ever.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.file.updated_at
    }

    /// Write `next` to disk and adopt it only once the write succeeded, so
    /// memory never holds a value the file does not.
    fn commit(&mut self, mut next: SettingsFile) -> Result<()> {
        let path = self.path.clone();
        let failed = |e: std::io::Error| FurnishError::Settings {
            reason: format!("cannot write {}: {}", path.display(), e),
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(failed)?;
            }
        }

        next.updated_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(&next)?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "settings".to_string());
        let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));

        let mut tmp = File::create(&tmp_path).map_err(failed)?;
        tmp.write_all(content.as_bytes()).map_err(failed)?;
        tmp.sync_all().map_err(failed)?;
        drop(tmp);
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(failed(e));
        }

        self.file = next;
        debug!(path = %path.display(), "settings written");
        Ok(())
    }
}

impl SettingsStore for JsonSettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.file.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut next = self.file.clone();
        next.values.insert(key.to_string(), value.to_string());
        self.commit(next)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if !self.file.values.contains_key(key) {
            return Ok(());
        }
        let mut next = self.file.clone();
        next.values.remove(key);
        self.commit(next)
    }
}
