use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::NoteKey;
use crate::mmap::mmap_file::MmapFile;
use crate::mvcc::controller::{MVCCController, Snapshot, TxId};
use crate::storage::db::{Db, DB_COUNT};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::sub_store::{Run, SubStore};
use crate::storage::wal::{scan_log, CommitLog};

/// Owned handle over one store directory: the mapped data file, the commit
/// log and the published snapshots.
pub struct Storage {
    pub layout: StorageLayout,
    pub mvcc: MVCCController,
    log: Mutex<CommitLog>,
    _lock: FileLock,
}

impl Storage {
    pub fn open(layout: StorageLayout, mapsize: u64) -> Result<Self> {
        let lock = FileLock::acquire(&layout)?;
        let data_path = layout.data_path();
        let mut log = CommitLog::open(&data_path, mapsize)?;

        let mut data = MmapFile::open_read_only(&data_path)?;
        let scan = scan_log(data.data())?;
        if scan.torn_bytes > 0 {
            warn!(
                path = %data_path.display(),
                torn_bytes = scan.torn_bytes,
                valid_len = scan.valid_len,
                "discarding incomplete commit at end of data file"
            );
            let valid_len = scan.valid_len;
            drop(data);
            log.truncate(valid_len)?;
            data = MmapFile::open_read_only(&data_path)?;
        }

        let mut runs: [Run; DB_COUNT] = Default::default();
        let commit_count = scan.commits.len();
        log.next_txn_id = scan.last_txn_id() + 1;
        for commit in scan.commits {
            for entry in commit.entries {
                runs[entry.db.index()].insert(entry.key, entry.value);
            }
        }
        log.next_note_key = runs[Db::Note.index()]
            .keys()
            .next_back()
            .and_then(|k| <[u8; 8]>::try_from(k.as_slice()).ok())
            .map(|k| u64::from_be_bytes(k) + 1)
            .unwrap_or(1);
        let dbs = runs.map(SubStore::from);

        info!(
            path = %layout.base_dir.display(),
            bytes = log.len,
            commits = commit_count,
            notes = dbs[Db::Note.index()].len(),
            "opened note store"
        );

        let snapshot = Snapshot {
            version: 0,
            dbs,
            data: Arc::new(data),
            timestamp: chrono::Utc::now(),
        };

        Ok(Storage {
            layout,
            mvcc: MVCCController::new(snapshot),
            log: Mutex::new(log),
            _lock: lock,
        })
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.mvcc.current_snapshot()
    }

    /// Begin the (single) write transaction. Blocks while another writer is
    /// active.
    pub fn begin_write(&self) -> WriteTransaction<'_> {
        let log = self.log.lock();
        let base = self.mvcc.current_snapshot();
        let next_note_key = log.next_note_key;

        WriteTransaction {
            id: TxId(log.next_txn_id),
            storage: self,
            log,
            base,
            pending: Default::default(),
            next_note_key,
        }
    }

    /// Bytes of the data file covered by the latest published snapshot.
    pub fn data_len(&self) -> u64 {
        self.mvcc.current_snapshot().data.len as u64
    }
}

/// Exclusive write transaction. Changes are buffered until `commit`; dropping
/// the transaction discards them.
pub struct WriteTransaction<'a> {
    pub id: TxId,
    storage: &'a Storage,
    log: MutexGuard<'a, CommitLog>,
    base: Arc<Snapshot>,
    pending: [BTreeMap<Vec<u8>, Vec<u8>>; DB_COUNT],
    next_note_key: u64,
}

impl<'a> WriteTransaction<'a> {
    /// Read your own writes first, then the snapshot the writer started from.
    pub fn get(&self, db: Db, key: &[u8]) -> Result<Option<Cow<'_, [u8]>>> {
        if let Some(value) = self.pending[db.index()].get(key) {
            return Ok(Some(Cow::Borrowed(value.as_slice())));
        }
        Ok(self.base.get(db, key)?.map(Cow::Borrowed))
    }

    pub fn contains(&self, db: Db, key: &[u8]) -> bool {
        self.pending[db.index()].contains_key(key) || self.base.db(db).contains_key(key)
    }

    pub fn put(&mut self, db: Db, key: Vec<u8>, value: Vec<u8>) {
        self.pending[db.index()].insert(key, value);
    }

    pub fn allocate_note_key(&mut self) -> NoteKey {
        let key = NoteKey(self.next_note_key);
        self.next_note_key += 1;
        key
    }

    pub fn pending_ops(&self) -> usize {
        self.pending.iter().map(|p| p.len()).sum()
    }

    /// Durably write all buffered changes and publish them as a new snapshot.
    /// Returns the version readers will observe.
    pub fn commit(mut self) -> Result<u64> {
        if self.pending_ops() == 0 {
            return Ok(self.base.version);
        }
        if self.log.poisoned {
            return Err(Error::new(
                ErrorKind::Internal,
                "an earlier commit reached the data file but was never published; reopen the store"
                    .to_string(),
            ));
        }

        let ops = Db::ALL.iter().flat_map(|db| {
            self.pending[db.index()]
                .iter()
                .map(move |(k, v)| (*db, k.as_slice(), v.as_slice()))
        });
        let (header, entries) = self.log.append(ops)?;
        self.log.next_note_key = self.next_note_key;

        // The record is durable from here on. If it cannot be published the
        // snapshot no longer matches the log, so later commits are refused.
        let data = match MmapFile::open_read_only(&self.log.path) {
            Ok(data) => Arc::new(data),
            Err(e) => {
                self.log.poisoned = true;
                error!(txn = header.txn_id, error = %e, "failed to map committed data");
                return Err(e);
            }
        };

        let mut runs: [Run; DB_COUNT] = Default::default();
        for entry in entries {
            runs[entry.db.index()].insert(entry.key, entry.value);
        }
        let mut dbs = self.base.dbs.clone();
        for (db, run) in dbs.iter_mut().zip(runs) {
            *db = db.with_run(run);
        }

        let snapshot = self.storage.mvcc.publish(dbs, data);
        debug!(
            txn = header.txn_id,
            ops = header.op_count,
            version = snapshot.version,
            bytes = self.log.len,
            "committed write transaction"
        );

        Ok(snapshot.version)
    }

    pub fn abort(self) {
        debug!(txn = self.id.0, ops = self.pending_ops(), "aborted write transaction");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::ErrorKind;

    fn open(dir: &std::path::Path, mapsize: u64) -> Storage {
        Storage::open(StorageLayout::new(dir).unwrap(), mapsize).unwrap()
    }

    #[test]
    fn committed_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = open(dir.path(), 1 << 20);
            let mut txn = storage.begin_write();
            txn.put(Db::Meta, b"answer".to_vec(), b"42".to_vec());
            assert_eq!(txn.commit().unwrap(), 1);
        }

        let storage = open(dir.path(), 1 << 20);
        let snapshot = storage.snapshot();
        assert_eq!(snapshot.get(Db::Meta, b"answer").unwrap(), Some(&b"42"[..]));
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 1 << 20);

        let before = storage.snapshot();
        let mut txn = storage.begin_write();
        txn.put(Db::Meta, b"k".to_vec(), b"v".to_vec());
        assert_eq!(txn.get(Db::Meta, b"k").unwrap().as_deref(), Some(&b"v"[..]));
        assert!(before.get(Db::Meta, b"k").unwrap().is_none());
        txn.commit().unwrap();

        assert!(before.get(Db::Meta, b"k").unwrap().is_none());
        assert!(storage.snapshot().get(Db::Meta, b"k").unwrap().is_some());
    }

    #[test]
    fn dropped_transaction_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 1 << 20);
        let len = storage.data_len();

        let mut txn = storage.begin_write();
        txn.put(Db::Meta, b"k".to_vec(), b"v".to_vec());
        txn.abort();

        assert_eq!(storage.data_len(), len);
        assert!(storage.snapshot().get(Db::Meta, b"k").unwrap().is_none());
    }

    #[test]
    fn commit_past_mapsize_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 256);

        let mut txn = storage.begin_write();
        txn.put(Db::Meta, b"big".to_vec(), vec![0u8; 1024]);
        let err = txn.commit().unwrap_err();
        assert_eq!(err.kind, ErrorKind::MapFull);
        assert_eq!(storage.snapshot().version, 0);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = tempfile::tempdir().unwrap();
        let _first = open(dir.path(), 1 << 20);
        let err = Storage::open(StorageLayout::new(dir.path()).unwrap(), 1 << 20)
            .err()
            .unwrap();
        assert_eq!(err.kind, ErrorKind::Locked);
    }

    #[test]
    fn note_keys_continue_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let storage = open(dir.path(), 1 << 20);
            let mut txn = storage.begin_write();
            let key = txn.allocate_note_key();
            assert_eq!(key, NoteKey(1));
            txn.put(Db::Note, key.to_be_bytes().to_vec(), b"n".to_vec());
            txn.commit().unwrap();
        }
        let storage = open(dir.path(), 1 << 20);
        let mut txn = storage.begin_write();
        assert_eq!(txn.allocate_note_key(), NoteKey(2));
    }

    #[test]
    fn data_len_does_not_wait_for_the_writer() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 1 << 20);

        let mut txn = storage.begin_write();
        txn.put(Db::Meta, b"k".to_vec(), b"v".to_vec());
        let before = storage.data_len();
        txn.commit().unwrap();
        assert!(storage.data_len() > before);
    }

    #[test]
    fn torn_tail_is_dropped_and_writes_continue() {
        let dir = tempfile::tempdir().unwrap();
        let intact_len = {
            let storage = open(dir.path(), 1 << 20);
            let mut txn = storage.begin_write();
            txn.put(Db::Meta, b"first".to_vec(), b"1".to_vec());
            txn.commit().unwrap();
            storage.data_len()
        };

        let data_path = StorageLayout::new(dir.path()).unwrap().data_path();
        let mut file = std::fs::OpenOptions::new().append(true).open(&data_path).unwrap();
        std::io::Write::write_all(&mut file, &[0xab; 10]).unwrap();
        drop(file);

        {
            let storage = open(dir.path(), 1 << 20);
            assert_eq!(storage.data_len(), intact_len);
            assert_eq!(std::fs::metadata(&data_path).unwrap().len(), intact_len);

            let mut txn = storage.begin_write();
            txn.put(Db::Meta, b"second".to_vec(), b"2".to_vec());
            txn.commit().unwrap();
        }

        let storage = open(dir.path(), 1 << 20);
        let snapshot = storage.snapshot();
        assert_eq!(snapshot.get(Db::Meta, b"first").unwrap(), Some(&b"1"[..]));
        assert_eq!(snapshot.get(Db::Meta, b"second").unwrap(), Some(&b"2"[..]));
    }

    #[test]
    fn unpublished_commit_keeps_its_note_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 1 << 20);

        let mut txn = storage.begin_write();
        let first = txn.allocate_note_key();
        txn.put(Db::Note, first.to_be_bytes().to_vec(), b"a".to_vec());
        txn.commit().unwrap();

        // The log keeps its descriptor, so the append lands but remapping fails
        std::fs::remove_file(StorageLayout::new(dir.path()).unwrap().data_path()).unwrap();
        let mut txn = storage.begin_write();
        let second = txn.allocate_note_key();
        txn.put(Db::Note, second.to_be_bytes().to_vec(), b"b".to_vec());
        assert!(txn.commit().is_err());
        assert_eq!(storage.snapshot().version, 1);

        let mut txn = storage.begin_write();
        assert_eq!(txn.allocate_note_key(), NoteKey(3));
        txn.put(Db::Meta, b"k".to_vec(), b"v".to_vec());
        assert_eq!(txn.commit().unwrap_err().kind, ErrorKind::Internal);
    }

    #[test]
    fn small_commits_keep_run_count_low() {
        let dir = tempfile::tempdir().unwrap();
        let storage = open(dir.path(), 1 << 24);

        let mut txn = storage.begin_write();
        for i in 0..1000u64 {
            let key = txn.allocate_note_key();
            txn.put(Db::Note, key.to_be_bytes().to_vec(), i.to_le_bytes().to_vec());
        }
        txn.commit().unwrap();

        for _ in 0..200 {
            let mut txn = storage.begin_write();
            let key = txn.allocate_note_key();
            txn.put(Db::Note, key.to_be_bytes().to_vec(), b"n".to_vec());
            txn.commit().unwrap();
        }

        let snapshot = storage.snapshot();
        assert_eq!(snapshot.len(Db::Note), 1200);
        assert!(snapshot.db(Db::Note).run_count() <= 12);
        let newest = snapshot.db(Db::Note).keys().next_back().unwrap();
        assert_eq!(newest.as_slice(), NoteKey(1200).to_be_bytes().as_slice());
    }
}
