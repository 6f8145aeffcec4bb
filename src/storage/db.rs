use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Named sub-stores ("sub-databases") of the storage engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Db {
    Note = 0,       // note key -> encoded note
    Meta,           // store-wide counters and format info
    NoteId,         // note id -> note key
    NoteKind,       // (kind, created_at, note key)
    NoteTags,       // (tag name, tag value, created_at, note key)
    NotePubkey,     // (author, created_at, note key)
    NoteCreatedAt,  // (created_at, note key)
    NoteText,       // (token, created_at, note key) -> posting
}

pub const DB_COUNT: usize = 8;

impl Db {
    pub const ALL: [Db; DB_COUNT] = [
        Db::Note,
        Db::Meta,
        Db::NoteId,
        Db::NoteKind,
        Db::NoteTags,
        Db::NotePubkey,
        Db::NoteCreatedAt,
        Db::NoteText,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u8) -> Result<Db> {
        Db::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| Error::corrupt(format!("unknown sub-store id {}", index)))
    }

    pub fn name(self) -> &'static str {
        match self {
            Db::Note => "note",
            Db::Meta => "meta",
            Db::NoteId => "note_id",
            Db::NoteKind => "note_kind",
            Db::NoteTags => "note_tags",
            Db::NotePubkey => "note_pubkey",
            Db::NoteCreatedAt => "note_created_at",
            Db::NoteText => "note_text",
        }
    }
}

/// Location of a value inside the mapped data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRef {
    pub offset: u64,
    pub len: u32,
}

impl ValueRef {
    pub fn end(&self) -> u64 {
        self.offset + self.len as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for db in Db::ALL {
            assert_eq!(Db::from_index(db.index() as u8).unwrap(), db);
        }
        assert!(Db::from_index(DB_COUNT as u8).is_err());
    }
}
