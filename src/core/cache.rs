use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use parking_lot::Mutex;
use crate::core::error::Result;
use crate::core::note::Note;
use crate::core::types::NoteKey;

/// Decoded notes shared by all readers.
///
/// Note keys are never reused and notes never change, so an entry is valid for
/// every snapshot that contains the key. Callers check the key exists in their
/// snapshot before asking the cache.
pub struct NoteCache {
    cache: Option<Mutex<LruCache<NoteKey, Arc<Note>>>>,
    pub size_limit: usize,
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
}

impl NoteCache {
    /// A zero size disables caching; every lookup decodes.
    pub fn new(size_limit: usize) -> Self {
        NoteCache {
            cache: NonZeroUsize::new(size_limit).map(|cap| Mutex::new(LruCache::new(cap))),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get_or_load(
        &self,
        key: NoteKey,
        load: impl FnOnce() -> Result<Note>,
    ) -> Result<Arc<Note>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(load()?));
        };

        if let Some(note) = cache.lock().get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(note.clone());
        }

        // Decode outside the lock
        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let note = Arc::new(load()?);
        cache.lock().put(key, note.clone());
        Ok(note)
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.as_ref().map(|c| c.lock().len()).unwrap_or(0),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{NoteId, Pubkey, Sig};

    fn note(kind: u32) -> Note {
        Note {
            id: NoteId([kind as u8; 32]),
            pubkey: Pubkey([0; 32]),
            created_at: 0,
            kind,
            tags: vec![],
            content: String::new(),
            sig: Sig([0; 64]),
        }
    }

    #[test]
    fn second_lookup_hits() {
        let cache = NoteCache::new(2);
        cache.get_or_load(NoteKey(1), || Ok(note(1))).unwrap();
        let hit = cache
            .get_or_load(NoteKey(1), || panic!("should be cached"))
            .unwrap();
        assert_eq!(hit.kind, 1);

        let stats = cache.stats();
        assert_eq!((stats.hit_count, stats.miss_count, stats.size), (1, 1, 1));
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn zero_size_always_loads() {
        let cache = NoteCache::new(0);
        cache.get_or_load(NoteKey(1), || Ok(note(1))).unwrap();
        let again = cache.get_or_load(NoteKey(1), || Ok(note(7))).unwrap();
        assert_eq!(again.kind, 7);
        assert_eq!(cache.stats().size, 0);
    }
}
