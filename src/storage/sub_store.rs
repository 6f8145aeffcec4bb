use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use crate::storage::db::ValueRef;

/// One immutable sorted run of keys. Values live in the data file.
pub type Run = BTreeMap<Vec<u8>, ValueRef>;

type Entry<'a> = (&'a Vec<u8>, &'a ValueRef);

// An older run is folded into the one above it while it is at most this many
// times larger, so run sizes at least double going down the stack.
const MERGE_RATIO: usize = 2;

/// Ordered key space of one sub-store.
///
/// Kept as a stack of immutable runs shared between snapshots, newest last.
/// A commit pushes a run holding only its own keys and merges small runs
/// tiered-style, so untouched runs are never copied.
#[derive(Debug, Clone, Default)]
pub struct SubStore {
    runs: Vec<Arc<Run>>,
    len: usize, // Distinct keys across all runs
}

impl From<Run> for SubStore {
    fn from(run: Run) -> Self {
        let len = run.len();
        let runs = if run.is_empty() { Vec::new() } else { vec![Arc::new(run)] };
        SubStore { runs, len }
    }
}

impl SubStore {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Newest value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Option<&ValueRef> {
        self.runs.iter().rev().find_map(|run| run.get(key))
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// A new version with `run` layered on top. Runs not involved in a merge
    /// stay shared with `self`.
    pub fn with_run(&self, run: Run) -> SubStore {
        if run.is_empty() {
            return self.clone();
        }

        let added = run.keys().filter(|key| !self.contains_key(key)).count();
        let mut runs = self.runs.clone();
        runs.push(Arc::new(run));

        while let [.., older, newer] = runs.as_slice() {
            if older.len() > newer.len() * MERGE_RATIO {
                break;
            }
            let merged = merge(older, newer);
            runs.truncate(runs.len() - 2);
            runs.push(Arc::new(merged));
        }

        SubStore {
            runs,
            len: self.len + added,
        }
    }

    /// Entries between `lower` and `upper` in key order. An inverted or empty
    /// range yields nothing.
    pub fn range(&self, lower: Bound<Vec<u8>>, upper: Bound<Vec<u8>>) -> Range<'_> {
        if is_empty_range(&lower, &upper) {
            return Range { cursors: Vec::new() };
        }
        let cursors = self
            .runs
            .iter()
            .map(|run| Cursor::new(run.range::<Vec<u8>, _>((lower.clone(), upper.clone()))))
            .collect();
        Range { cursors }
    }

    pub fn iter(&self) -> Range<'_> {
        self.range(Bound::Unbounded, Bound::Unbounded)
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &Vec<u8>> + '_ {
        self.iter().map(|(key, _)| key)
    }
}

impl<'a> IntoIterator for &'a SubStore {
    type Item = Entry<'a>;
    type IntoIter = Range<'a>;

    fn into_iter(self) -> Range<'a> {
        self.iter()
    }
}

fn merge(older: &Run, newer: &Run) -> Run {
    let mut merged = older.clone();
    merged.extend(newer.iter().map(|(key, value)| (key.clone(), *value)));
    merged
}

fn is_empty_range(lower: &Bound<Vec<u8>>, upper: &Bound<Vec<u8>>) -> bool {
    use Bound::{Excluded, Included};
    match (lower, upper) {
        (Included(a), Included(b)) => a > b,
        (Included(a), Excluded(b)) | (Excluded(a), Included(b)) | (Excluded(a), Excluded(b)) => a >= b,
        _ => false,
    }
}

/// Position inside one run. An entry is held in exactly one of `front`,
/// `iter` or `back`.
struct Cursor<'a> {
    iter: btree_map::Range<'a, Vec<u8>, ValueRef>,
    front: Option<Entry<'a>>,
    back: Option<Entry<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(iter: btree_map::Range<'a, Vec<u8>, ValueRef>) -> Self {
        Cursor { iter, front: None, back: None }
    }

    fn peek_front(&mut self) -> Option<Entry<'a>> {
        if self.front.is_none() {
            self.front = self.iter.next().or_else(|| self.back.take());
        }
        self.front
    }

    fn peek_back(&mut self) -> Option<Entry<'a>> {
        if self.back.is_none() {
            self.back = self.iter.next_back().or_else(|| self.front.take());
        }
        self.back
    }
}

/// Merged view over every run of a [`SubStore`]. A key present in several
/// runs is yielded once, with the newest value.
pub struct Range<'a> {
    cursors: Vec<Cursor<'a>>, // Oldest run first
}

impl<'a> Iterator for Range<'a> {
    type Item = Entry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self
            .cursors
            .iter_mut()
            .filter_map(|cursor| cursor.peek_front())
            .map(|(key, _)| key)
            .min()?;

        let mut newest = None;
        for cursor in &mut self.cursors {
            if cursor.peek_front().is_some_and(|(k, _)| k == key) {
                newest = cursor.front.take();
            }
        }
        newest
    }
}

impl<'a> DoubleEndedIterator for Range<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let key = self
            .cursors
            .iter_mut()
            .filter_map(|cursor| cursor.peek_back())
            .map(|(key, _)| key)
            .max()?;

        let mut newest = None;
        for cursor in &mut self.cursors {
            if cursor.peek_back().is_some_and(|(k, _)| k == key) {
                newest = cursor.back.take();
            }
        }
        newest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(offset: u64) -> ValueRef {
        ValueRef { offset, len: 1 }
    }

    fn run(keys: &[(u32, u64)]) -> Run {
        keys.iter()
            .map(|(key, offset)| (key.to_be_bytes().to_vec(), value(*offset)))
            .collect()
    }

    #[test]
    fn newer_runs_shadow_older_ones() {
        let store = SubStore::from(run(&[(1, 10), (2, 20), (3, 30)]))
            .with_run(run(&[(2, 21)]))
            .with_run(run(&[(4, 40)]));

        assert_eq!(store.len(), 4);
        assert_eq!(store.get(&2u32.to_be_bytes()), Some(&value(21)));
        let forward: Vec<u64> = store.iter().map(|(_, v)| v.offset).collect();
        assert_eq!(forward, vec![10, 21, 30, 40]);
        let backward: Vec<u64> = store.iter().rev().map(|(_, v)| v.offset).collect();
        assert_eq!(backward, vec![40, 30, 21, 10]);
    }

    #[test]
    fn range_merges_across_runs() {
        let mut store = SubStore::default();
        for key in [5u32, 1, 9, 3, 7] {
            store = store.with_run(run(&[(key, key as u64)]));
        }

        let lower = Bound::Included(3u32.to_be_bytes().to_vec());
        let upper = Bound::Excluded(9u32.to_be_bytes().to_vec());
        let keys: Vec<u64> = store.range(lower, upper).map(|(_, v)| v.offset).collect();
        assert_eq!(keys, vec![3, 5, 7]);

        let inverted = store.range(
            Bound::Included(9u32.to_be_bytes().to_vec()),
            Bound::Excluded(3u32.to_be_bytes().to_vec()),
        );
        assert_eq!(inverted.count(), 0);
    }

    #[test]
    fn both_ends_meet_without_repeats() {
        let store = SubStore::from(run(&[(1, 1), (3, 3)]))
            .with_run(run(&[(2, 2)]))
            .with_run(run(&[(3, 33)]));

        let mut range = store.iter();
        assert_eq!(range.next().map(|(_, v)| v.offset), Some(1));
        assert_eq!(range.next_back().map(|(_, v)| v.offset), Some(33));
        assert_eq!(range.next().map(|(_, v)| v.offset), Some(2));
        assert!(range.next_back().is_none());
        assert!(range.next().is_none());
    }

    #[test]
    fn small_commit_leaves_large_run_shared() {
        let base = SubStore::from(run(&(0..1000).map(|k| (k, k as u64)).collect::<Vec<_>>()));
        let next = base.with_run(run(&[(5000, 1)]));

        assert_eq!(next.run_count(), 2);
        assert!(Arc::ptr_eq(&base.runs[0], &next.runs[0]));
        assert_eq!(base.len(), 1000);
        assert_eq!(next.len(), 1001);
    }

    #[test]
    fn run_count_stays_logarithmic() {
        let mut store = SubStore::default();
        for key in 0..10_000u32 {
            store = store.with_run(run(&[(key, key as u64)]));
        }
        assert_eq!(store.len(), 10_000);
        assert!(store.run_count() <= 15, "{} runs", store.run_count());
        assert_eq!(store.keys().count(), 10_000);
    }

    #[test]
    fn all_runs_exhausted_is_empty() {
        let store = SubStore::default();
        assert!(store.is_empty());
        assert!(store.iter().next().is_none());
    }
}
