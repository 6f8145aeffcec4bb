use std::path::{Path, PathBuf};
use std::fs;
use crate::core::error::Result;

/// Directory structure for data files
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,      // Root directory
}

impl StorageLayout {
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        Ok(StorageLayout { base_dir })
    }

    /// Append-only commit log, mapped read-only for lookups
    pub fn data_path(&self) -> PathBuf {
        self.base_dir.join("data.ndb")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }
}
