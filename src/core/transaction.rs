use std::sync::Arc;
use crate::core::config::TextSearchConfig;
use crate::core::database::Ndb;
use crate::core::error::Result;
use crate::core::note::Note;
use crate::core::types::{NoteId, NoteKey};
use crate::index::inverted::parse_text_key;
use crate::index::note_index::{parse_index_key, parse_kind_prefix, parse_note_key, parse_tag_prefix};
use crate::mvcc::controller::Snapshot;
use crate::query::filter::Filter;
use crate::search::executor::QueryExecutor;
use crate::search::results::{QueryResult, TextSearchResult};
use crate::search::text::TextSearcher;
use crate::storage::db::Db;

/// Read transaction
///
/// Holds one snapshot for its whole life. Every read through it sees the
/// same committed state no matter what writers publish meanwhile.
pub struct Transaction<'a> {
    ndb: &'a Ndb,
    snapshot: Arc<Snapshot>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn begin(ndb: &'a Ndb) -> Self {
        Transaction {
            ndb,
            snapshot: ndb.storage().snapshot(),
        }
    }

    pub fn ndb(&self) -> &'a Ndb {
        self.ndb
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn version(&self) -> u64 {
        self.snapshot.version
    }

    pub fn get_note_key(&self, id: &NoteId) -> Result<Option<NoteKey>> {
        match self.snapshot.get(Db::NoteId, id.as_bytes())? {
            Some(value) => Ok(Some(parse_note_key(value)?)),
            None => Ok(None),
        }
    }

    /// Decoded note and its encoded size, through the shared note cache.
    pub(crate) fn load_note(&self, key: NoteKey) -> Result<Option<(Arc<Note>, u32)>> {
        let Some(value) = self.snapshot.db(Db::Note).get(key.to_be_bytes().as_slice()) else {
            return Ok(None);
        };
        let note = self.ndb.note_cache().get_or_load(key, || {
            Note::decode(self.snapshot.value(value)?)
        })?;
        Ok(Some((note, value.len)))
    }

    pub fn get_note_by_key(&self, key: NoteKey) -> Result<Option<Arc<Note>>> {
        Ok(self.load_note(key)?.map(|(note, _)| note))
    }

    pub fn get_note_by_id(&self, id: &NoteId) -> Result<Option<Arc<Note>>> {
        match self.get_note_key(id)? {
            Some(key) => self.get_note_by_key(key),
            None => Ok(None),
        }
    }

    /// Notes matching any of `filters`, newest first, at most `capacity`.
    pub fn query(&self, filters: &[Filter], capacity: usize) -> Result<Vec<QueryResult>> {
        QueryExecutor::new(self).execute(filters, capacity)
    }

    /// Like [`query`](Self::query) but fills a caller owned buffer, which is
    /// cleared first. Returns the number of results written.
    pub fn query_into(
        &self,
        filters: &[Filter],
        results: &mut Vec<QueryResult>,
        capacity: usize,
    ) -> Result<usize> {
        results.clear();
        results.extend(self.query(filters, capacity)?);
        Ok(results.len())
    }

    pub fn text_search(&self, query: &str, config: &TextSearchConfig) -> Result<Vec<TextSearchResult>> {
        TextSearcher::new(self).search(query, config)
    }

    /// Content index keys as `term created_at note_key`, in key order.
    pub fn search_keys(&self) -> Result<Vec<String>> {
        self.snapshot
            .db(Db::NoteText)
            .keys()
            .map(|key| {
                let (term, parsed) = parse_text_key(key)?;
                Ok(format!("{} {} {}", term, parsed.created_at, parsed.note_key.value()))
            })
            .collect()
    }

    /// Kind index keys as `kind created_at note_key`, in key order.
    pub fn kind_keys(&self) -> Result<Vec<String>> {
        self.snapshot
            .db(Db::NoteKind)
            .keys()
            .map(|key| {
                let parsed = parse_index_key(key)?;
                let kind = parse_kind_prefix(parsed.prefix)?;
                Ok(format!("{} {} {}", kind, parsed.created_at, parsed.note_key.value()))
            })
            .collect()
    }

    /// Tag index keys as `name value created_at note_key`, in key order.
    pub fn tag_keys(&self) -> Result<Vec<String>> {
        self.snapshot
            .db(Db::NoteTags)
            .keys()
            .map(|key| {
                let parsed = parse_index_key(key)?;
                let (name, value) = parse_tag_prefix(parsed.prefix)?;
                Ok(format!(
                    "{} {} {} {}",
                    name,
                    value,
                    parsed.created_at,
                    parsed.note_key.value()
                ))
            })
            .collect()
    }

    /// Release the snapshot. Dropping the transaction does the same.
    pub fn end(self) {}
}
