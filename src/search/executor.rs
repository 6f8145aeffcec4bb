use roaring::RoaringTreemap;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::transaction::Transaction;
use crate::core::types::{NoteId, NoteKey};
use crate::index::note_index::{parse_index_key, time_range};
use crate::query::filter::Filter;
use crate::query::planner::{IndexPlan, QueryPlanner};
use crate::search::results::{newest_first, QueryResult};
use crate::storage::db::Db;

/// Evaluates filters against the secondary indexes of one read transaction.
pub struct QueryExecutor<'t, 'n> {
    pub txn: &'t Transaction<'n>,
    pub planner: QueryPlanner,
}

impl<'t, 'n> QueryExecutor<'t, 'n> {
    pub fn new(txn: &'t Transaction<'n>) -> Self {
        QueryExecutor {
            txn,
            planner: QueryPlanner::new(),
        }
    }

    /// Union of all filters, newest first, at most `capacity` notes. Each
    /// filter contributes at most its own LIMIT.
    pub fn execute(&self, filters: &[Filter], capacity: usize) -> Result<Vec<QueryResult>> {
        if capacity == 0 || filters.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = RoaringTreemap::new();
        let mut results = Vec::new();
        for filter in filters {
            for hit in self.execute_filter(filter, capacity)? {
                if seen.insert(hit.note_key.value()) {
                    results.push(hit);
                }
            }
        }

        results.sort_by(|a, b| newest_first(&a.note, &b.note));
        results.truncate(capacity);
        Ok(results)
    }

    fn execute_filter(&self, filter: &Filter, capacity: usize) -> Result<Vec<QueryResult>> {
        let bound = match filter.limit() {
            Some(limit) => (limit.min(capacity as u64)) as usize,
            None => capacity,
        };
        if bound == 0 || filter.is_empty_range() {
            return Ok(Vec::new());
        }

        let plan = self.planner.plan(filter);
        debug!(%filter, %plan, bound, version = self.txn.version(), "executing filter");

        let mut hits = Vec::new();
        match &plan {
            IndexPlan::Ids(ids) => self.lookup_ids(ids, filter, &mut hits)?,
            _ => {
                for prefix in plan.prefixes() {
                    self.scan_prefix(plan.db(), &prefix, filter, bound, &mut hits)?;
                }
            }
        }

        // The same note can come out of several prefixes (two matching tag
        // values), so order first and drop neighbours with the same key.
        hits.sort_by(|a, b| newest_first(&a.note, &b.note));
        hits.dedup_by_key(|hit| hit.note_key);
        hits.truncate(bound);
        Ok(hits)
    }

    fn lookup_ids(&self, ids: &[NoteId], filter: &Filter, hits: &mut Vec<QueryResult>) -> Result<()> {
        for id in ids {
            let Some(note_key) = self.txn.get_note_key(id)? else {
                continue;
            };
            let hit = self.fetch(note_key)?;
            if filter.matches(&hit.note) {
                hits.push(hit);
            }
        }
        Ok(())
    }

    /// Walk one index prefix newest first inside the filter's time range.
    ///
    /// Stops once `bound` matches are collected and the scan has moved past
    /// their oldest timestamp, so notes sharing that timestamp are all seen
    /// and the id tie-break stays exact.
    fn scan_prefix(
        &self,
        db: Db,
        prefix: &[u8],
        filter: &Filter,
        bound: usize,
        hits: &mut Vec<QueryResult>,
    ) -> Result<()> {
        let (lower, upper) = time_range(prefix, filter.since(), filter.until());
        let mut found = 0;
        let mut boundary = None;

        for (key, _) in self.txn.snapshot().range(db, lower, upper).rev() {
            let index_key = parse_index_key(key)?;
            if boundary.is_some_and(|ts| index_key.created_at < ts) {
                break;
            }

            let hit = self.fetch(index_key.note_key)?;
            if !filter.matches(&hit.note) {
                continue;
            }
            hits.push(hit);
            found += 1;
            if found == bound {
                boundary = Some(index_key.created_at);
            }
        }
        Ok(())
    }

    fn fetch(&self, note_key: NoteKey) -> Result<QueryResult> {
        let (note, note_size) = self.txn.load_note(note_key)?.ok_or_else(|| {
            Error::corrupt(format!("index entry points at missing note {}", note_key.value()))
        })?;
        Ok(QueryResult {
            note,
            note_key,
            note_size,
        })
    }
}
