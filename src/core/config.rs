use crate::query::types::SortOrder;

/// Largest result set a text search will ever return.
pub const MAX_TEXT_SEARCH_RESULTS: usize = 128;

/// Store configuration. Built once and handed to `Ndb::open`; the store keeps
/// its own copy and never mutates it.
#[derive(Debug, Clone)]
pub struct Config {
    pub mapsize: u64,               // Ceiling for the mapped data file
    pub skip_verification: bool,    // Accept notes without checking signatures
    pub ingest_batch_size: usize,   // Notes per write transaction during import
    pub note_cache_size: usize,     // Decoded notes kept in the LRU, 0 disables it
    pub max_line_len: usize,        // Longer import lines are rejected as malformed
}

impl Default for Config {
    fn default() -> Self {
        Config {
            mapsize: 32 * 1024 * 1024 * 1024,  // 32GiB
            skip_verification: false,
            ingest_batch_size: 4096,
            note_cache_size: 4096,
            max_line_len: 16 * 1024 * 1024,  // 16MiB
        }
    }
}

impl Config {
    pub fn with_mapsize(mut self, mapsize: u64) -> Self {
        self.mapsize = mapsize;
        self
    }

    pub fn with_skip_verification(mut self, skip: bool) -> Self {
        self.skip_verification = skip;
        self
    }

    pub fn with_ingest_batch_size(mut self, batch_size: usize) -> Self {
        self.ingest_batch_size = batch_size.max(1);
        self
    }

    pub fn with_note_cache_size(mut self, size: usize) -> Self {
        self.note_cache_size = size;
        self
    }

    pub fn with_max_line_len(mut self, len: usize) -> Self {
        self.max_line_len = len;
        self
    }
}

/// Options for a single full-text search.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSearchConfig {
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl Default for TextSearchConfig {
    fn default() -> Self {
        TextSearchConfig {
            order: SortOrder::Desc,
            limit: None,
        }
    }
}

impl TextSearchConfig {
    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Effective number of results: the requested limit capped at
    /// `MAX_TEXT_SEARCH_RESULTS`, or the cap itself when unset.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(MAX_TEXT_SEARCH_RESULTS)
            .min(MAX_TEXT_SEARCH_RESULTS)
    }
}
