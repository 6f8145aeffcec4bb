use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::{IngestError, Result};
use crate::core::note::Note;
use crate::crypto::signature::verify_note_signature;
use crate::storage::engine::Storage;
use crate::writer::envelope::Envelope;
use crate::writer::note_writer::{NoteWriter, WriteOutcome};

/// Tallies for one ingestion call. Blank lines are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub lines: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub malformed: u64,
    pub identity_mismatch: u64,
    pub invalid_signature: u64,
}

impl IngestStats {
    pub fn rejected(&self) -> u64 {
        self.malformed + self.identity_mismatch + self.invalid_signature
    }

    fn record_rejection(&mut self, error: &IngestError) {
        match error {
            IngestError::MalformedInput(_) => self.malformed += 1,
            IngestError::IdentityMismatch => self.identity_mismatch += 1,
            IngestError::InvalidSignature => self.invalid_signature += 1,
        }
    }
}

impl fmt::Display for IngestStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "lines={} accepted={} duplicates={} malformed={} identity_mismatch={} invalid_signature={}",
            self.lines,
            self.accepted,
            self.duplicates,
            self.malformed,
            self.identity_mismatch,
            self.invalid_signature
        )
    }
}

fn oversized(max_line_len: usize) -> IngestError {
    IngestError::MalformedInput(format!("line longer than {} bytes", max_line_len))
}

/// Check that `note.id` is the hash of its contents and, when `verify` is
/// set, that `note.sig` signs that id.
pub fn validate_note(note: &Note, verify: bool) -> std::result::Result<(), IngestError> {
    let valid_id = note
        .has_valid_id()
        .map_err(|e| IngestError::MalformedInput(e.context))?;
    if !valid_id {
        return Err(IngestError::IdentityMismatch);
    }
    if verify {
        verify_note_signature(note)?;
    }
    Ok(())
}

/// Line oriented import into the store.
///
/// Accepted notes are buffered in an open write transaction that is committed
/// every `ingest_batch_size` stored notes and once more by `finish`. A storage
/// error drops the open batch and is returned; earlier batches stay committed.
pub struct IngestPipeline<'a> {
    storage: &'a Storage,
    analyzer: &'a Analyzer,
    writer: Option<NoteWriter<'a>>,
    verify: bool,
    batch_size: usize,
    max_line_len: usize,
    stats: IngestStats,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(storage: &'a Storage, analyzer: &'a Analyzer, config: &Config) -> Self {
        IngestPipeline {
            storage,
            analyzer,
            writer: None,
            verify: !config.skip_verification,
            batch_size: config.ingest_batch_size.max(1),
            max_line_len: config.max_line_len,
            stats: IngestStats::default(),
        }
    }

    /// Process one input line, with or without its trailing newline.
    pub fn push_line(&mut self, line: &[u8]) -> Result<()> {
        self.try_push_line(line).map(|_| ())
    }

    /// Like `push_line`, but hands back the reason a rejected line was
    /// skipped. The rejection is tallied either way.
    pub fn try_push_line(&mut self, line: &[u8]) -> Result<std::result::Result<(), IngestError>> {
        let line = line.trim_ascii();
        if line.is_empty() {
            return Ok(Ok(()));
        }
        self.stats.lines += 1;
        if line.len() > self.max_line_len {
            return Ok(Err(self.reject(oversized(self.max_line_len))));
        }

        let parsed = std::str::from_utf8(line)
            .map_err(|e| IngestError::MalformedInput(format!("invalid utf-8: {}", e)))
            .and_then(Envelope::parse)
            .and_then(|envelope| {
                let note = envelope.into_note();
                validate_note(&note, self.verify).map(|_| note)
            });

        match parsed {
            Ok(note) => self.push_note(&note).map(Ok),
            Err(error) => Ok(Err(self.reject(error))),
        }
    }

    /// Tally a line the caller stopped reading after `max_line_len` bytes.
    pub fn push_oversized_line(&mut self) {
        self.stats.lines += 1;
        self.reject(oversized(self.max_line_len));
    }

    pub fn max_line_len(&self) -> usize {
        self.max_line_len
    }

    /// Validate and store a note that did not come from a text line.
    pub fn push_validated(&mut self, note: &Note) -> Result<()> {
        match validate_note(note, self.verify) {
            Ok(()) => self.push_note(note),
            Err(error) => {
                self.reject(error);
                Ok(())
            }
        }
    }

    fn reject(&mut self, error: IngestError) -> IngestError {
        debug!(line = self.stats.lines, %error, "rejected note");
        self.stats.record_rejection(&error);
        error
    }

    /// Store an already validated note.
    pub fn push_note(&mut self, note: &Note) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => self
                .writer
                .insert(NoteWriter::begin(self.storage, self.analyzer)?),
        };

        match writer.write_note(note)? {
            WriteOutcome::Stored(_) => self.stats.accepted += 1,
            WriteOutcome::Duplicate => self.stats.duplicates += 1,
        }

        if writer.stored() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Commit the open batch, if any.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.commit()?;
        }
        Ok(())
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn finish(mut self) -> Result<IngestStats> {
        self.flush()?;
        info!(
            lines = self.stats.lines,
            accepted = self.stats.accepted,
            duplicates = self.stats.duplicates,
            rejected = self.stats.rejected(),
            "ingest finished"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::signature::NoteSigner;
    use crate::storage::db::Db;
    use crate::storage::layout::StorageLayout;

    fn storage(dir: &std::path::Path) -> Storage {
        Storage::open(StorageLayout::new(dir).unwrap(), 1 << 22).unwrap()
    }

    #[test]
    fn tallies_each_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let analyzer = Analyzer::standard_english();
        let signer = NoteSigner::from_secret(&[9u8; 32]).unwrap();

        let good = signer.sign_note(10, 1, vec![], "gm").unwrap();
        let mut tampered = good.clone();
        tampered.content = "gn".to_string();
        let mut forged = signer.sign_note(11, 1, vec![], "wagmi").unwrap();
        forged.sig.0[0] ^= 1;

        let mut pipeline = IngestPipeline::new(&storage, &analyzer, &Config::default());
        for line in [
            good.to_json().unwrap(),
            String::new(),
            "{broken".to_string(),
            tampered.to_json().unwrap(),
            forged.to_json().unwrap(),
            good.to_json().unwrap(),
        ] {
            pipeline.push_line(line.as_bytes()).unwrap();
        }
        let stats = pipeline.finish().unwrap();

        assert_eq!(
            stats,
            IngestStats {
                lines: 5,
                accepted: 1,
                duplicates: 1,
                malformed: 1,
                identity_mismatch: 1,
                invalid_signature: 1,
            }
        );
        assert_eq!(storage.snapshot().len(Db::Note), 1);
    }

    #[test]
    fn commits_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let analyzer = Analyzer::standard_english();
        let signer = NoteSigner::from_secret(&[10u8; 32]).unwrap();
        let config = Config::default().with_ingest_batch_size(2);

        let mut pipeline = IngestPipeline::new(&storage, &analyzer, &config);
        for created_at in 0..5 {
            let note = signer.sign_note(created_at, 1, vec![], "batch").unwrap();
            pipeline.push_note(&note).unwrap();
        }
        // Two full batches are already visible, the fifth note is still pending.
        assert_eq!(storage.snapshot().len(Db::Note), 4);

        pipeline.finish().unwrap();
        assert_eq!(storage.snapshot().len(Db::Note), 5);
        assert_eq!(storage.mvcc.version(), 3);
    }
}
