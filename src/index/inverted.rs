use std::collections::BTreeMap;
use crate::analysis::analyzer::Analyzer;
use crate::core::error::{Error, Result};
use crate::core::types::NoteKey;
use crate::index::note_index::{index_key, parse_index_key, IndexKey};
use crate::index::posting::Posting;

// Content index key: [ term_len u8 ][ term ][ created_at u64 BE ][ note_key u64 BE ]
//
// Corpus counters live in the meta sub-store as u64 LE.
pub const META_TEXT_DOCS: &[u8] = b"text_docs";
pub const META_TEXT_TOKENS: &[u8] = b"text_tokens";

/// Kinds whose content is never indexed. Encrypted direct messages carry
/// ciphertext, not words.
pub const UNINDEXED_KINDS: &[u32] = &[4];

pub fn is_text_indexed(kind: u32) -> bool {
    !UNINDEXED_KINDS.contains(&kind)
}

pub fn text_prefix(term: &str) -> Option<Vec<u8>> {
    let len = u8::try_from(term.len()).ok()?;
    let mut prefix = Vec::with_capacity(1 + term.len());
    prefix.push(len);
    prefix.extend_from_slice(term.as_bytes());
    Some(prefix)
}

pub fn text_key(term: &str, created_at: u64, note_key: NoteKey) -> Option<Vec<u8>> {
    text_prefix(term).map(|prefix| index_key(&prefix, created_at, note_key))
}

/// Split a content index key into its term and suffix.
pub fn parse_text_key(key: &[u8]) -> Result<(&str, IndexKey<'_>)> {
    let parsed = parse_index_key(key)?;
    let len = *parsed
        .prefix
        .first()
        .ok_or_else(|| Error::corrupt("empty content index key"))? as usize;
    let term = parsed
        .prefix
        .get(1..)
        .filter(|term| term.len() == len)
        .ok_or_else(|| Error::corrupt("content index term length mismatch"))?;
    let term = std::str::from_utf8(term)
        .map_err(|_| Error::corrupt("content index term is not utf-8"))?;
    Ok((term, parsed))
}

/// Analyzed content of one note, grouped by term.
#[derive(Debug, Default)]
pub struct DocumentTerms {
    pub doc_len: u32,
    pub postings: BTreeMap<String, Posting>,
}

impl DocumentTerms {
    pub fn analyze(analyzer: &Analyzer, content: &str) -> Self {
        let tokens = analyzer.analyze(content);
        let doc_len = tokens.len() as u32;
        let mut postings: BTreeMap<String, Posting> = BTreeMap::new();

        for token in tokens {
            postings
                .entry(token.text)
                .and_modify(|p| p.term_freq += 1)
                .or_insert(Posting {
                    term_freq: 1,
                    first_position: token.position,
                    doc_len,
                });
        }

        DocumentTerms { doc_len, postings }
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }
}

/// Term statistics
#[derive(Debug, Clone, Copy)]
pub struct TermInfo {
    pub doc_freq: u32,  // Number of notes containing the term
    pub idf: f32,       // Inverse document frequency
}

impl TermInfo {
    /// Probabilistic idf as used by BM25, kept positive for very common terms.
    pub fn new(doc_freq: u32, total_docs: u64) -> Self {
        let n = total_docs.max(doc_freq as u64) as f32;
        let df = doc_freq as f32;
        TermInfo {
            doc_freq,
            idf: (1.0 + (n - df + 0.5) / (df + 0.5)).ln(),
        }
    }
}

/// Collection-wide counters needed for length normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCorpus {
    pub doc_count: u64,
    pub total_tokens: u64,
}

impl TextCorpus {
    pub fn from_meta(docs: Option<&[u8]>, tokens: Option<&[u8]>) -> Result<Self> {
        Ok(TextCorpus {
            doc_count: read_counter(docs)?,
            total_tokens: read_counter(tokens)?,
        })
    }

    pub fn add(&mut self, doc: &DocumentTerms) {
        self.doc_count += 1;
        self.total_tokens += doc.doc_len as u64;
    }

    pub fn avg_doc_len(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_tokens as f32 / self.doc_count as f32
    }

    pub fn meta_entries(&self) -> [(&'static [u8], Vec<u8>); 2] {
        [
            (META_TEXT_DOCS, self.doc_count.to_le_bytes().to_vec()),
            (META_TEXT_TOKENS, self.total_tokens.to_le_bytes().to_vec()),
        ]
    }
}

fn read_counter(bytes: Option<&[u8]>) -> Result<u64> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let bytes: [u8; 8] = bytes
                .try_into()
                .map_err(|_| Error::corrupt("meta counter is not 8 bytes"))?;
            Ok(u64::from_le_bytes(bytes))
        }
    }
}
