use parking_lot::RwLock;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use crate::core::error::Result;
use crate::mmap::mmap_file::MmapFile;
use crate::storage::db::{Db, ValueRef, DB_COUNT};
use crate::storage::sub_store::{Range, SubStore};

/// Transaction ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId(pub u64);

/// Committed state of every sub-store at one point in time.
///
/// Sub-stores share their runs with the snapshots before and after them.
pub struct Snapshot {
    pub version: u64,
    pub dbs: [SubStore; DB_COUNT],
    pub data: Arc<MmapFile>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn db(&self, db: Db) -> &SubStore {
        &self.dbs[db.index()]
    }

    pub fn value(&self, value: &ValueRef) -> Result<&[u8]> {
        self.data.slice(value)
    }

    pub fn get(&self, db: Db, key: &[u8]) -> Result<Option<&[u8]>> {
        match self.db(db).get(key) {
            Some(value) => Ok(Some(self.value(value)?)),
            None => Ok(None),
        }
    }

    /// Entries of `db` whose keys fall between `lower` and `upper`. An
    /// inverted or empty range yields nothing.
    pub fn range(&self, db: Db, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> Range<'_> {
        self.db(db).range(lower, upper)
    }

    pub fn len(&self, db: Db) -> usize {
        self.db(db).len()
    }
}

/// Multi-Version Concurrency Control
///
/// Readers clone the current `Arc<Snapshot>` and keep it for as long as their
/// transaction lives; the writer publishes a whole new snapshot on commit.
pub struct MVCCController {
    pub current: RwLock<Arc<Snapshot>>,
    pub current_version: AtomicU64,
}

impl MVCCController {
    pub fn new(initial: Snapshot) -> Self {
        let version = initial.version;
        MVCCController {
            current: RwLock::new(Arc::new(initial)),
            current_version: AtomicU64::new(version),
        }
    }

    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current_version.load(Ordering::Acquire)
    }

    /// Make a new state visible to readers that begin after this call.
    pub fn publish(&self, dbs: [SubStore; DB_COUNT], data: Arc<MmapFile>) -> Arc<Snapshot> {
        let mut current = self.current.write();
        let version = current.version + 1;

        let snapshot = Arc::new(Snapshot {
            version,
            dbs,
            data,
            timestamp: Utc::now(),
        });

        *current = snapshot.clone();
        self.current_version.store(version, Ordering::Release);
        snapshot
    }
}
