//! Snapshot persistence for [`MemoryStore`]
//!
//! The whole store is written as one JSON file. Writes are atomic (write to
//! a temp file, sync, then rename) so the snapshot is never left
//! partially written.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::{debug, info};

use super::memory::{Contents, MemoryStore};
use crate::error::{StoreError, StoreResult};

impl MemoryStore {
    /// Load a store from a snapshot file
    ///
    /// Returns an empty store if the file doesn't exist.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if !path.exists() {
            debug!("No snapshot at {:?}, starting empty", path);
            return Ok(Self::new());
        }

        let bytes = fs::read(path).map_err(|e| StoreError::io(e, path))?;
        let contents: Contents = serde_json::from_slice(&bytes)?;
        info!(
            "Loaded snapshot from {:?} ({} collection(s))",
            path,
            contents.collections.len()
        );
        Ok(Self::from_contents(contents))
    }

    /// Write the current contents to a snapshot file
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let bytes = self.with_contents(|contents| serde_json::to_vec_pretty(contents))?;
        atomic_write(path, &bytes)?;
        debug!("Saved snapshot to {:?} ({} bytes)", path, bytes.len());
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(e, parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path).map_err(|e| StoreError::io(e, &temp_path))?;
    file.write_all(data)
        .map_err(|e| StoreError::io(e, &temp_path))?;
    file.sync_all().map_err(|e| StoreError::io(e, &temp_path))?;

    fs::rename(&temp_path, path).map_err(|e| StoreError::io(e, path))?;

    Ok(())
}
