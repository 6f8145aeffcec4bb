use crate::analysis::analyzer::Analyzer;
use crate::core::error::Result;
use crate::core::note::Note;
use crate::core::types::NoteKey;
use crate::index::inverted::{is_text_indexed, text_key, DocumentTerms, TextCorpus, META_TEXT_DOCS, META_TEXT_TOKENS};
use crate::index::note_index::note_index_keys;
use crate::storage::db::Db;
use crate::storage::engine::{Storage, WriteTransaction};

/// What happened to one note handed to [`NoteWriter::write_note`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Stored(NoteKey),
    Duplicate,
}

/// Writes notes and every index entry derived from them inside one write
/// transaction. Nothing is visible to readers until `commit`.
pub struct NoteWriter<'a> {
    txn: WriteTransaction<'a>,
    analyzer: &'a Analyzer,
    corpus: TextCorpus,
    stored: usize,
}

impl<'a> NoteWriter<'a> {
    pub fn begin(storage: &'a Storage, analyzer: &'a Analyzer) -> Result<Self> {
        let txn = storage.begin_write();
        let corpus = TextCorpus::from_meta(
            txn.get(Db::Meta, META_TEXT_DOCS)?.as_deref(),
            txn.get(Db::Meta, META_TEXT_TOKENS)?.as_deref(),
        )?;

        Ok(NoteWriter {
            txn,
            analyzer,
            corpus,
            stored: 0,
        })
    }

    /// Store a validated note. A note whose id is already present, either
    /// committed or written earlier in this transaction, is left alone.
    pub fn write_note(&mut self, note: &Note) -> Result<WriteOutcome> {
        let id = note.id.as_bytes();
        if self.txn.contains(Db::NoteId, id) {
            return Ok(WriteOutcome::Duplicate);
        }

        let note_key = self.txn.allocate_note_key();
        let key_bytes = note_key.to_be_bytes().to_vec();
        self.txn.put(Db::Note, key_bytes.clone(), note.encode()?);
        self.txn.put(Db::NoteId, id.to_vec(), key_bytes);

        for (db, key) in note_index_keys(note, note_key) {
            self.txn.put(db, key, Vec::new());
        }

        if is_text_indexed(note.kind) {
            let doc = DocumentTerms::analyze(self.analyzer, &note.content);
            if !doc.is_empty() {
                for (term, posting) in &doc.postings {
                    if let Some(key) = text_key(term, note.created_at, note_key) {
                        self.txn.put(Db::NoteText, key, posting.encode()?);
                    }
                }
                self.corpus.add(&doc);
            }
        }

        self.stored += 1;
        Ok(WriteOutcome::Stored(note_key))
    }

    /// Notes stored so far in this transaction.
    pub fn stored(&self) -> usize {
        self.stored
    }

    pub fn commit(mut self) -> Result<u64> {
        if self.stored > 0 {
            for (key, value) in self.corpus.meta_entries() {
                self.txn.put(Db::Meta, key.to_vec(), value);
            }
        }
        self.txn.commit()
    }

    pub fn abort(self) {
        self.txn.abort();
    }
}
