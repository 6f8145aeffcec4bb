use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::db::{Db, ValueRef};

// [ FILE HEADER: magic u32 | version u32 | reserved u64 ]   <- byte 0
// [ RECORD: magic u32 | body_len u32 | crc32(body) u32 | body ]
// [ RECORD ... ]
//
// body = header_len u32 | bincode(CommitHeader) | op*
// op   = db u8 | key_len u32 | value_len u32 | key | value
const FILE_MAGIC: u32 = 0x4e44_4231; // "NDB1"
const FORMAT_VERSION: u32 = 1;
pub const FILE_HEADER_SIZE: u64 = 16;

const RECORD_MAGIC: u32 = 0x6e6f_7465; // "note"
const RECORD_HEADER_SIZE: usize = 12;
const OP_HEADER_SIZE: usize = 9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitHeader {
    pub txn_id: u64,
    pub committed_at: DateTime<Utc>,
    pub op_count: u32,
}

/// One key/value pair as found in the log. The value stays in the file.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub db: Db,
    pub key: Vec<u8>,
    pub value: ValueRef,
}

#[derive(Debug)]
pub struct CommitRecord {
    pub header: CommitHeader,
    pub entries: Vec<LogEntry>,
}

/// Result of walking the log from the start.
#[derive(Debug)]
pub struct LogScan {
    pub commits: Vec<CommitRecord>,
    pub valid_len: u64,   // End of the last intact record
    pub torn_bytes: u64,  // Trailing bytes that did not form a complete record
}

impl LogScan {
    pub fn last_txn_id(&self) -> u64 {
        self.commits.last().map(|c| c.header.txn_id).unwrap_or(0)
    }
}

/// Append-only commit log. Only the writer holds this.
pub struct CommitLog {
    pub file: File,
    pub path: PathBuf,
    pub len: u64,
    pub mapsize: u64,
    pub next_txn_id: u64,
    pub next_note_key: u64, // Advanced only once a commit is durable
    pub poisoned: bool,     // A durable commit was never published
}

impl CommitLog {
    pub fn open(path: &Path, mapsize: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;

        let mut len = file.metadata()?.len();
        if len == 0 {
            file.write_all(&file_header())?;
            file.sync_all()?;
            len = FILE_HEADER_SIZE;
        }

        if len > mapsize {
            return Err(Error::new(
                ErrorKind::MapFull,
                format!("data file is {} bytes but mapsize is {}", len, mapsize),
            ));
        }

        Ok(CommitLog {
            file,
            path: path.to_path_buf(),
            len,
            mapsize,
            next_txn_id: 1,
            next_note_key: 1,
            poisoned: false,
        })
    }

    /// Drop everything past `len`. Used to discard a torn tail at open.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.file.sync_all()?;
        self.len = len;
        Ok(())
    }

    /// Durably append one commit. Either the whole record lands or the file is
    /// rolled back to its previous length.
    pub fn append<'k>(
        &mut self,
        ops: impl IntoIterator<Item = (Db, &'k [u8], &'k [u8])>,
    ) -> Result<(CommitHeader, Vec<LogEntry>)> {
        let ops: Vec<_> = ops.into_iter().collect();
        let header = CommitHeader {
            txn_id: self.next_txn_id,
            committed_at: Utc::now(),
            op_count: ops.len() as u32,
        };
        let (record, entries) = encode_record(self.len, &header, &ops)?;

        let new_len = self.len + record.len() as u64;
        if new_len > self.mapsize {
            return Err(Error::new(
                ErrorKind::MapFull,
                format!(
                    "commit of {} bytes would grow the data file past mapsize {}",
                    record.len(),
                    self.mapsize
                ),
            ));
        }

        let written = self
            .file
            .seek(SeekFrom::Start(self.len))
            .and_then(|_| self.file.write_all(&record))
            .and_then(|_| self.file.sync_data());
        if let Err(e) = written {
            // Best effort: a leftover partial record is also dropped at next open
            let _ = self.file.set_len(self.len);
            return Err(e.into());
        }

        self.len = new_len;
        self.next_txn_id += 1;
        Ok((header, entries))
    }
}

fn file_header() -> [u8; FILE_HEADER_SIZE as usize] {
    let mut header = [0u8; FILE_HEADER_SIZE as usize];
    header[0..4].copy_from_slice(&FILE_MAGIC.to_le_bytes());
    header[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
    header
}

fn encode_record(
    start: u64,
    header: &CommitHeader,
    ops: &[(Db, &[u8], &[u8])],
) -> Result<(Vec<u8>, Vec<LogEntry>)> {
    let header_data = bincode::serialize(header)?;
    let body_len = 4
        + header_data.len()
        + ops
            .iter()
            .map(|(_, k, v)| OP_HEADER_SIZE + k.len() + v.len())
            .sum::<usize>();
    if body_len > u32::MAX as usize {
        return Err(Error::new(
            ErrorKind::InvalidArgument,
            format!("commit body of {} bytes is too large", body_len),
        ));
    }

    let mut body = Vec::with_capacity(body_len);
    body.extend_from_slice(&(header_data.len() as u32).to_le_bytes());
    body.extend_from_slice(&header_data);

    let body_start = start + RECORD_HEADER_SIZE as u64;
    let mut entries = Vec::with_capacity(ops.len());
    for (db, key, value) in ops {
        body.push(db.index() as u8);
        body.extend_from_slice(&(key.len() as u32).to_le_bytes());
        body.extend_from_slice(&(value.len() as u32).to_le_bytes());
        body.extend_from_slice(key);
        let value_offset = body_start + body.len() as u64;
        body.extend_from_slice(value);

        entries.push(LogEntry {
            db: *db,
            key: key.to_vec(),
            value: ValueRef {
                offset: value_offset,
                len: value.len() as u32,
            },
        });
    }

    let mut hasher = Hasher::new();
    hasher.update(&body);

    let mut record = Vec::with_capacity(RECORD_HEADER_SIZE + body.len());
    record.extend_from_slice(&RECORD_MAGIC.to_le_bytes());
    record.extend_from_slice(&(body.len() as u32).to_le_bytes());
    record.extend_from_slice(&hasher.finalize().to_le_bytes());
    record.extend_from_slice(&body);

    Ok((record, entries))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Walk every intact record of a mapped log. A bad file header is fatal; a
/// damaged or incomplete tail just ends the scan.
pub fn scan_log(data: &[u8]) -> Result<LogScan> {
    if (data.len() as u64) < FILE_HEADER_SIZE {
        return Err(Error::corrupt("data file is shorter than its header"));
    }
    if read_u32(data, 0) != Some(FILE_MAGIC) {
        return Err(Error::corrupt("data file has a bad magic number"));
    }
    let version = read_u32(data, 4).unwrap_or(0);
    if version != FORMAT_VERSION {
        return Err(Error::corrupt(format!("unsupported data file version {}", version)));
    }

    let mut commits = Vec::new();
    let mut pos = FILE_HEADER_SIZE as usize;
    while pos < data.len() {
        match decode_record(data, pos) {
            Some((record, next)) => {
                commits.push(record);
                pos = next;
            }
            None => break,
        }
    }

    Ok(LogScan {
        commits,
        valid_len: pos as u64,
        torn_bytes: (data.len() - pos) as u64,
    })
}

fn decode_record(data: &[u8], start: usize) -> Option<(CommitRecord, usize)> {
    if read_u32(data, start)? != RECORD_MAGIC {
        return None;
    }
    let body_len = read_u32(data, start + 4)? as usize;
    let crc = read_u32(data, start + 8)?;
    let body_start = start + RECORD_HEADER_SIZE;
    let body = data.get(body_start..body_start.checked_add(body_len)?)?;

    let mut hasher = Hasher::new();
    hasher.update(body);
    if hasher.finalize() != crc {
        return None;
    }

    let header_len = read_u32(body, 0)? as usize;
    let header: CommitHeader = bincode::deserialize(body.get(4..4 + header_len)?).ok()?;

    let mut entries = Vec::with_capacity(header.op_count as usize);
    let mut pos = 4 + header_len;
    for _ in 0..header.op_count {
        let db = Db::from_index(*body.get(pos)?).ok()?;
        let key_len = read_u32(body, pos + 1)? as usize;
        let value_len = read_u32(body, pos + 5)? as usize;
        let key_start = pos + OP_HEADER_SIZE;
        let value_start = key_start + key_len;
        let key = body.get(key_start..value_start)?;
        body.get(value_start..value_start + value_len)?;

        entries.push(LogEntry {
            db,
            key: key.to_vec(),
            value: ValueRef {
                offset: (body_start + value_start) as u64,
                len: value_len as u32,
            },
        });
        pos = value_start + value_len;
    }

    Some((CommitRecord { header, entries }, body_start + body_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(txn_id: u64, op_count: u32) -> CommitHeader {
        CommitHeader {
            txn_id,
            committed_at: Utc::now(),
            op_count,
        }
    }

    fn log_bytes(records: &[Vec<u8>]) -> Vec<u8> {
        let mut data = file_header().to_vec();
        for r in records {
            data.extend_from_slice(r);
        }
        data
    }

    #[test]
    fn encoded_records_scan_back() {
        let ops: Vec<(Db, &[u8], &[u8])> = vec![
            (Db::Note, &b"k1"[..], &b"value-one"[..]),
            (Db::NoteKind, &b"k2"[..], &b""[..]),
        ];
        let (record, entries) = encode_record(FILE_HEADER_SIZE, &header(1, 2), &ops).unwrap();
        let data = log_bytes(&[record]);

        let scan = scan_log(&data).unwrap();
        assert_eq!(scan.commits.len(), 1);
        assert_eq!(scan.torn_bytes, 0);
        assert_eq!(scan.last_txn_id(), 1);

        let scanned = &scan.commits[0].entries;
        assert_eq!(scanned.len(), 2);
        for (a, b) in scanned.iter().zip(entries.iter()) {
            assert_eq!(a.db, b.db);
            assert_eq!(a.key, b.key);
            assert_eq!(a.value, b.value);
        }
        let v = scanned[0].value;
        assert_eq!(&data[v.offset as usize..v.end() as usize], b"value-one");
    }

    #[test]
    fn torn_tail_is_ignored() {
        let ops: Vec<(Db, &[u8], &[u8])> = vec![(Db::Meta, &b"a"[..], &b"1"[..])];
        let (first, _) = encode_record(FILE_HEADER_SIZE, &header(1, 1), &ops).unwrap();
        let second_start = FILE_HEADER_SIZE + first.len() as u64;
        let (second, _) = encode_record(second_start, &header(2, 1), &ops).unwrap();

        let mut data = log_bytes(&[first.clone()]);
        data.extend_from_slice(&second[..second.len() - 3]);

        let scan = scan_log(&data).unwrap();
        assert_eq!(scan.commits.len(), 1);
        assert_eq!(scan.valid_len, second_start);
        assert_eq!(scan.torn_bytes, second.len() as u64 - 3);
    }

    #[test]
    fn corrupted_body_stops_scan() {
        let ops: Vec<(Db, &[u8], &[u8])> = vec![(Db::Meta, &b"a"[..], &b"1"[..])];
        let (record, _) = encode_record(FILE_HEADER_SIZE, &header(1, 1), &ops).unwrap();
        let mut data = log_bytes(&[record]);
        let last = data.len() - 1;
        data[last] ^= 0xff;

        let scan = scan_log(&data).unwrap();
        assert!(scan.commits.is_empty());
        assert_eq!(scan.valid_len, FILE_HEADER_SIZE);
    }

    #[test]
    fn bad_file_header_is_fatal() {
        let err = scan_log(&[0u8; 16]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Corrupt);
    }
}
