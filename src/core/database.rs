use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use crate::analysis::analyzer::Analyzer;
use crate::core::cache::{CacheStats, NoteCache};
use crate::core::config::Config;
use crate::core::error::{IngestError, Result};
use crate::core::note::Note;
use crate::core::stats::Stat;
use crate::core::transaction::Transaction;
use crate::storage::engine::Storage;
use crate::storage::layout::StorageLayout;
use crate::writer::ingest::{IngestPipeline, IngestStats};

/// An open note store.
///
/// One `Ndb` owns the store directory for the life of the process. Reads go
/// through [`Transaction`]s from [`begin_query`](Ndb::begin_query); writes go
/// through the `process_*` ingestion calls, which serialize among themselves.
pub struct Ndb {
    config: Config,
    storage: Storage,
    analyzer: Analyzer,
    note_cache: NoteCache,
}

impl Ndb {
    pub fn open(dir: impl AsRef<Path>, config: Config) -> Result<Self> {
        let layout = StorageLayout::new(dir)?;
        let storage = Storage::open(layout, config.mapsize)?;

        Ok(Ndb {
            note_cache: NoteCache::new(config.note_cache_size),
            analyzer: Analyzer::standard_english(),
            storage,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    pub(crate) fn note_cache(&self) -> &NoteCache {
        &self.note_cache
    }

    /// Start a read transaction on the latest committed state.
    pub fn begin_query(&self) -> Transaction<'_> {
        Transaction::begin(self)
    }

    fn pipeline(&self) -> IngestPipeline<'_> {
        IngestPipeline::new(&self.storage, &self.analyzer, &self.config)
    }

    /// Ingest newline separated notes. Every line may be any accepted
    /// envelope shape; a final line without a newline is processed too.
    pub fn process_events(&self, input: &[u8]) -> Result<IngestStats> {
        let mut pipeline = self.pipeline();
        for line in input.split(|b| *b == b'\n') {
            pipeline.push_line(line)?;
        }
        pipeline.finish()
    }

    /// Client `["EVENT",{..}]` messages go through the same detection as
    /// every other envelope.
    pub fn process_client_events(&self, input: &[u8]) -> Result<IngestStats> {
        self.process_events(input)
    }

    /// Ingest from a reader without holding the whole input in memory. At
    /// most `max_line_len` bytes of a line are buffered; the rest of a longer
    /// line is skipped and the line counts as malformed.
    pub fn process_events_stream(&self, reader: impl Read) -> Result<IngestStats> {
        let mut reader = BufReader::new(reader);
        let mut pipeline = self.pipeline();
        let limit = pipeline.max_line_len() as u64;
        let mut line = Vec::new();

        loop {
            line.clear();
            if (&mut reader).take(limit.saturating_add(1)).read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.last() != Some(&b'\n') && line.len() as u64 > limit {
                reader.skip_until(b'\n')?;
                pipeline.push_oversized_line();
                continue;
            }
            pipeline.push_line(&line)?;
        }
        pipeline.finish()
    }

    /// Ingest a single line. Rejections come back as the `IngestError`.
    pub fn process_event(&self, line: &str) -> Result<std::result::Result<IngestStats, IngestError>> {
        let mut pipeline = self.pipeline();
        let outcome = pipeline.try_push_line(line.as_bytes())?;
        let stats = pipeline.finish()?;
        Ok(outcome.map(|_| stats))
    }

    /// Store notes that were built and validated in process, skipping the
    /// parse step. Ids and signatures are still checked per the config.
    pub fn process_notes(&self, notes: &[Note]) -> Result<IngestStats> {
        let mut pipeline = self.pipeline();
        for note in notes {
            pipeline.push_validated(note)?;
        }
        pipeline.finish()
    }

    /// Statistics over the latest committed state.
    pub fn stat(&self) -> Result<Stat> {
        Stat::collect(&self.storage.snapshot())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.note_cache.stats()
    }
}
