use memmap2::{Mmap, MmapOptions};
use std::fs::File;
use std::path::Path;
use crate::core::error::{Error, Result};
use crate::storage::db::ValueRef;

/// Memory-mapped file for zero-copy reads
pub struct MmapFile {
    pub mmap: Mmap,
    pub len: usize,
}

impl MmapFile {
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        let len = metadata.len() as usize;

        // The store holds an exclusive lock on the directory and only ever
        // appends, so mapped bytes are never modified underneath us.
        let mmap = unsafe { MmapOptions::new().len(len).map(&file)? };

        Ok(MmapFile { mmap, len })
    }

    pub fn data(&self) -> &[u8] {
        &self.mmap[..]
    }

    pub fn slice(&self, value: &ValueRef) -> Result<&[u8]> {
        self.data()
            .get(value.offset as usize..value.end() as usize)
            .ok_or_else(|| {
                Error::corrupt(format!(
                    "value at {}+{} lies outside the {} byte mapping",
                    value.offset, value.len, self.len
                ))
            })
    }
}
