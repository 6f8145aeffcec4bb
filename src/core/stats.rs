use std::fmt;
use std::ops::AddAssign;
use serde::{Deserialize, Serialize};
use crate::core::error::Result;
use crate::core::note::Note;
use crate::mvcc::controller::Snapshot;
use crate::storage::db::{Db, DB_COUNT};

/// Kinds that get their own bucket in [`Stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonKind {
    Profile,
    Post,
    Contacts,
    Dm,
    Delete,
    Repost,
    Reaction,
    ZapRequest,
    Zap,
    NwcRequest,
    NwcResponse,
    HttpAuth,
    List,
    Longform,
    Status,
}

pub const COMMON_KIND_COUNT: usize = 15;

impl CommonKind {
    pub const ALL: [CommonKind; COMMON_KIND_COUNT] = [
        CommonKind::Profile,
        CommonKind::Post,
        CommonKind::Contacts,
        CommonKind::Dm,
        CommonKind::Delete,
        CommonKind::Repost,
        CommonKind::Reaction,
        CommonKind::ZapRequest,
        CommonKind::Zap,
        CommonKind::NwcRequest,
        CommonKind::NwcResponse,
        CommonKind::HttpAuth,
        CommonKind::List,
        CommonKind::Longform,
        CommonKind::Status,
    ];

    pub fn from_kind(kind: u32) -> Option<CommonKind> {
        Some(match kind {
            0 => CommonKind::Profile,
            1 => CommonKind::Post,
            3 => CommonKind::Contacts,
            4 => CommonKind::Dm,
            5 => CommonKind::Delete,
            6 => CommonKind::Repost,
            7 => CommonKind::Reaction,
            9734 => CommonKind::ZapRequest,
            9735 => CommonKind::Zap,
            23194 => CommonKind::NwcRequest,
            23195 => CommonKind::NwcResponse,
            27235 => CommonKind::HttpAuth,
            30000 => CommonKind::List,
            30023 => CommonKind::Longform,
            30315 => CommonKind::Status,
            _ => return None,
        })
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            CommonKind::Profile => "profile",
            CommonKind::Post => "post",
            CommonKind::Contacts => "contacts",
            CommonKind::Dm => "dm",
            CommonKind::Delete => "delete",
            CommonKind::Repost => "repost",
            CommonKind::Reaction => "reaction",
            CommonKind::ZapRequest => "zap_request",
            CommonKind::Zap => "zap",
            CommonKind::NwcRequest => "nwc_request",
            CommonKind::NwcResponse => "nwc_response",
            CommonKind::HttpAuth => "http_auth",
            CommonKind::List => "list",
            CommonKind::Longform => "longform",
            CommonKind::Status => "status",
        }
    }
}

/// Record count and byte totals for one sub-store or kind bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCounts {
    pub count: u64,
    pub key_size: u64,
    pub value_size: u64,
}

impl StatCounts {
    pub fn record(&mut self, key_size: usize, value_size: usize) {
        self.count += 1;
        self.key_size += key_size as u64;
        self.value_size += value_size as u64;
    }

    pub fn total_size(&self) -> u64 {
        self.key_size + self.value_size
    }
}

impl AddAssign for StatCounts {
    fn add_assign(&mut self, other: StatCounts) {
        self.count += other.count;
        self.key_size += other.key_size;
        self.value_size += other.value_size;
    }
}

impl fmt::Display for StatCounts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.count, self.key_size, self.value_size, self.total_size())
    }
}

/// Store statistics. Computed from one snapshot on demand, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub dbs: [StatCounts; DB_COUNT],
    pub common_kinds: [StatCounts; COMMON_KIND_COUNT],
    pub other_kinds: StatCounts,
}

impl Stat {
    /// Walk every sub-store of `snapshot`. Note records are decoded to sort
    /// them into kind buckets; one that fails to decode fails the whole call.
    pub fn collect(snapshot: &Snapshot) -> Result<Stat> {
        let mut stat = Stat::default();

        for db in Db::ALL {
            let counts = &mut stat.dbs[db.index()];
            for (key, value) in snapshot.db(db) {
                counts.record(key.len(), value.len as usize);

                if db == Db::Note {
                    let note = Note::decode(snapshot.value(value)?)?;
                    let bucket = match CommonKind::from_kind(note.kind) {
                        Some(kind) => &mut stat.common_kinds[kind.index()],
                        None => &mut stat.other_kinds,
                    };
                    bucket.record(key.len(), value.len as usize);
                }
            }
        }

        Ok(stat)
    }

    pub fn db(&self, db: Db) -> &StatCounts {
        &self.dbs[db.index()]
    }

    pub fn kind(&self, kind: CommonKind) -> &StatCounts {
        &self.common_kinds[kind.index()]
    }

    /// Grand total over all sub-stores.
    pub fn total(&self) -> StatCounts {
        let mut total = StatCounts::default();
        for counts in &self.dbs {
            total += *counts;
        }
        total
    }

    /// Sum over every kind bucket. Equal to the note sub-store counts.
    pub fn kinds_total(&self) -> StatCounts {
        let mut total = self.other_kinds;
        for counts in &self.common_kinds {
            total += *counts;
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_kinds_cover_their_table() {
        for (i, kind) in CommonKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
        assert_eq!(CommonKind::from_kind(30023), Some(CommonKind::Longform));
        assert_eq!(CommonKind::from_kind(2), None);
        assert_eq!(CommonKind::Zap.name(), "zap");
    }

    #[test]
    fn counts_add_up() {
        let mut a = StatCounts::default();
        a.record(8, 100);
        a.record(8, 50);
        let mut b = StatCounts::default();
        b.record(40, 0);
        b += a;
        assert_eq!(b, StatCounts { count: 3, key_size: 56, value_size: 150 });
        assert_eq!(b.total_size(), 206);
        assert_eq!(b.to_string(), "3\t56\t150\t206");
    }
}
