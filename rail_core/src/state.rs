//! Per-user record persistence with file locking.
//!
//! The engine itself never touches storage. This module is the file-backed
//! reference collaborator used by the CLI: one JSON record per user under
//! `<data_dir>/users/<user>.json`, holding the baseline, day states, check-ins,
//! assigned profiles and the current week seed.

use crate::types::*;
use crate::{Error, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Everything stored for one user, keyed by date key where per-day
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRecord {
    pub constraints: Constraints,
    pub day_states: BTreeMap<String, DayState>,
    pub check_ins: BTreeMap<String, CheckIn>,
    pub profiles: BTreeMap<String, Profile>,
    pub week_seed: Option<WeekSeed>,
}

/// Path of a user's record under the data directory
pub fn record_path(data_dir: &Path, user_id: &str) -> Result<PathBuf> {
    let valid = !user_id.is_empty()
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !user_id.starts_with('.');
    if !valid {
        return Err(Error::State(format!("Invalid user id: {:?}", user_id)));
    }
    Ok(data_dir.join("users").join(format!("{}.json", user_id)))
}

/// Advisory lock on `<record>.lock`, held for a whole read or
/// read-modify-write. The record itself is replaced by rename, so it
/// cannot carry the lock.
struct RecordLock {
    file: File,
}

impl RecordLock {
    fn open(record: &Path) -> Result<File> {
        let parent = record
            .parent()
            .ok_or_else(|| Error::State(format!("Record path {:?} has no parent", record)))?;
        std::fs::create_dir_all(parent)?;

        let mut name = record.as_os_str().to_owned();
        name.push(".lock");
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(name))?)
    }

    fn shared(record: &Path) -> Result<Self> {
        let file = Self::open(record)?;
        file.lock_shared()?;
        Ok(Self { file })
    }

    fn exclusive(record: &Path) -> Result<Self> {
        let file = Self::open(record)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release record lock: {}", e);
        }
    }
}

impl UserRecord {
    /// Most recent assigned profile strictly before `date_key`
    pub fn prior_profile(&self, date_key: &str) -> Option<Profile> {
        self.profiles
            .range(..date_key.to_string())
            .next_back()
            .map(|(_, p)| *p)
    }

    /// Load a user record under a shared lock
    ///
    /// A missing record is a new user. An unreadable or corrupt one degrades
    /// to defaults with a warning so the user still gets a plan.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No user record at {:?}, starting fresh", path);
            return Ok(Self::default());
        }

        let _lock = RecordLock::shared(path)?;
        Ok(Self::read_degraded(path))
    }

    /// Save a user record under the exclusive lock
    pub fn save(&self, path: &Path) -> Result<()> {
        let _lock = RecordLock::exclusive(path)?;
        self.write_atomic(path)
    }

    /// Load, modify and save while holding the exclusive lock throughout,
    /// so concurrent updates to the same user never drop each other's writes
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut UserRecord) -> Result<()>,
    {
        let _lock = RecordLock::exclusive(path)?;
        let mut record = if path.exists() {
            Self::read_degraded(path)
        } else {
            Self::default()
        };
        f(&mut record)?;
        record.write_atomic(path)?;
        Ok(record)
    }

    fn read_degraded(path: &Path) -> Self {
        let parsed = std::fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|contents| Ok(serde_json::from_str::<UserRecord>(&contents)?));

        match parsed {
            Ok(record) => {
                tracing::debug!("Loaded user record from {:?}", path);
                record
            }
            Err(e) => {
                tracing::warn!("Unusable user record {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Temp file in the same directory, synced, then renamed over the record
    fn write_atomic(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("Record path {:?} has no parent", path)))?;

        let mut temp = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(&mut temp, self)?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved user record to {:?}", path);
        Ok(())
    }
}
