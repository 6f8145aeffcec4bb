pub mod core;
pub mod storage;
pub mod analysis;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod mvcc;
pub mod writer;
pub mod mmap;
pub mod crypto;

pub use crate::core::config::{Config, TextSearchConfig, MAX_TEXT_SEARCH_RESULTS};
pub use crate::core::database::Ndb;
pub use crate::core::error::{Error, ErrorKind, IngestError, Result};
pub use crate::core::note::Note;
pub use crate::core::stats::{CommonKind, Stat, StatCounts};
pub use crate::core::transaction::Transaction;
pub use crate::core::types::{NoteId, NoteKey, Pubkey, Sig};
pub use crate::query::filter::{Filter, FilterBuilder};
pub use crate::query::types::{FieldKind, SortOrder};
pub use crate::search::results::{QueryResult, TextSearchResult};
pub use crate::writer::ingest::IngestStats;

/*
┌──────────────────────────────────────────────────────────────────────────────┐
│                           NOTEDB STRUCT ARCHITECTURE                         │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── CORE LAYER ──────────────────────────────────┐
│  struct Ndb                                                                  │
│  │ config: Config              // mapsize, verification, batch, cache size   │
│  │ storage: Storage            // one owned handle over the store directory  │
│  │ analyzer: Analyzer          // same tokenization for index and query      │
│  │ note_cache: NoteCache       // LRU of decoded notes, keyed by NoteKey     │
│                                                                              │
│  struct Transaction<'a>        struct Note            struct Stat            │
│  │ ndb: &Ndb                   │ id, pubkey, sig      │ dbs[DB_COUNT]        │
│  │ snapshot: Arc<Snapshot>     │ created_at, kind     │ common_kinds[15]     │
│                                │ tags, content        │ other_kinds          │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── QUERY LAYER ─────────────────────────────────┐
│  FilterBuilder ──finish()──▶ Filter ──QueryPlanner──▶ IndexPlan               │
│  (Idle / FieldOpen)          ids authors kinds       Ids > Authors > Tags    │
│                              tags since until limit  > Kinds > CreatedAt     │
│                                                                              │
│  QueryExecutor: scan plan prefixes newest first, Filter::matches, union      │
│                 (RoaringTreemap dedup), sort, truncate to capacity           │
│  TextSearcher:  Analyzer terms ─▶ note_text postings ─▶ BM25 × recency       │
└──────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────── WRITE PATH ──────────────────────────────────┐
│  bytes ─▶ IngestPipeline ─▶ Envelope::parse ─▶ validate_note ─▶ NoteWriter    │
│           (per line tally)   RawNote/Wrapped    id + schnorr    WriteTxn     │
│                                                                              │
│  NoteWriter::write_note: note, note_id, note_kind, note_pubkey,              │
│                          note_created_at, note_tags, note_text, meta         │
└──────────────────────────────────────────────────────────────────────────────┘

┌─────────────────────────────── STORAGE LAYER ────────────────────────────────┐
│  struct Storage                      struct MVCCController                   │
│  │ layout: StorageLayout             │ current: RwLock<Arc<Snapshot>>        │
│  │ mvcc: MVCCController                                                      │
│  │ log: Mutex<CommitLog>  (writer)   │ current_version: AtomicU64            │
│  │ _lock: FileLock        (flock)    struct Snapshot                         │
│                                      │ dbs: [Arc<BTreeMap<key, ValueRef>>]   │
│  data.ndb: [header][commit]...       │ data: Arc<MmapFile>                   │
│  commit:   [magic][len][crc][body]                                           │
└──────────────────────────────────────────────────────────────────────────────┘
*/
