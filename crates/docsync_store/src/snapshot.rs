//! Locked JSON snapshot files.
//!
//! Each file-backed store owns one snapshot file plus a sibling `.lock`
//! file. The lock is held for the lifetime of the store so only one process
//! writes a given snapshot at a time. Writes go to a `.tmp` sibling that is
//! synced and renamed over the snapshot.

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
    _lock_file: File,
}

impl SnapshotFile {
    /// Opens a snapshot, creating parent directories and taking the lock.
    pub(crate) fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling(path, ".lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing or empty file yields `T::default()`.
    pub(crate) fn read<T: DeserializeOwned + Default>(&self) -> StoreResult<T> {
        if !self.path.exists() {
            return Ok(T::default());
        }

        let mut data = Vec::new();
        File::open(&self.path)?.read_to_end(&mut data)?;
        if data.is_empty() {
            return Ok(T::default());
        }

        serde_json::from_slice(&data)
            .map_err(|e| StoreError::Corrupted(format!("{}: {}", self.path.display(), e)))
    }

    /// Replaces the snapshot atomically.
    pub(crate) fn write<T: Serialize>(&self, value: &T) -> StoreResult<()> {
        let temp_path = sibling(&self.path, ".tmp");
        let data = serde_json::to_vec_pretty(value)?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
