use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;
use crate::core::config::TextSearchConfig;
use crate::core::error::{Error, Result};
use crate::core::transaction::Transaction;
use crate::core::types::NoteKey;
use crate::index::inverted::{parse_text_key, text_prefix, TermInfo, TextCorpus, META_TEXT_DOCS, META_TEXT_TOKENS};
use crate::index::note_index::time_range;
use crate::index::posting::Posting;
use crate::query::types::SortOrder;
use crate::scoring::scorer::{BM25Scorer, DocStats, RecencyBoost, Scorer};
use crate::search::results::{oldest_first, tie_boundary, TextSearchResult};
use crate::storage::db::Db;

/// Matches for one note, gathered across query terms.
#[derive(Debug)]
struct Candidate {
    note_key: NoteKey,
    created_at: u64,
    matches: Vec<(usize, Posting, TermInfo)>,  // (query term index, posting, term stats)
    score: f32,
}

/// Ranked full-text search over the content index of one read transaction.
pub struct TextSearcher<'t, 'n> {
    pub txn: &'t Transaction<'n>,
    pub scorer: Box<dyn Scorer>,
    pub recency: RecencyBoost,
}

impl<'t, 'n> TextSearcher<'t, 'n> {
    pub fn new(txn: &'t Transaction<'n>) -> Self {
        TextSearcher {
            txn,
            scorer: Box::new(BM25Scorer::default()),
            recency: RecencyBoost::default(),
        }
    }

    pub fn search(&self, query: &str, config: &TextSearchConfig) -> Result<Vec<TextSearchResult>> {
        let limit = config.effective_limit();
        if limit == 0 {
            return Ok(Vec::new());
        }

        let terms = self.txn.ndb().analyzer().terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let snapshot = self.txn.snapshot();
        let corpus = TextCorpus::from_meta(
            snapshot.get(Db::Meta, META_TEXT_DOCS)?,
            snapshot.get(Db::Meta, META_TEXT_TOKENS)?,
        )?;
        let stats = DocStats {
            avg_doc_length: corpus.avg_doc_len(),
            total_docs: corpus.doc_count,
        };

        let mut candidates = self.collect_candidates(&terms, &corpus)?;
        debug!(
            query,
            terms = terms.len(),
            candidates = candidates.len(),
            order = ?config.order,
            "text search"
        );
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let newest = candidates.iter().map(|c| c.created_at).max().unwrap_or(0);
        for candidate in &mut candidates {
            let relevance: f32 = candidate
                .matches
                .iter()
                .map(|(_, posting, info)| self.scorer.score(posting, info, &stats))
                .sum();
            candidate.score = relevance * self.recency.boost(newest, candidate.created_at);
        }

        // Order by the primary key alone, then load notes only for the part
        // that can still reach the top `limit` once ids break ties.
        let keep = match config.order {
            SortOrder::Desc => {
                candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
                tie_boundary(&candidates, limit, |a, b| a.score == b.score)
            }
            SortOrder::Asc => {
                candidates.sort_by_key(|c| c.created_at);
                tie_boundary(&candidates, limit, |a, b| a.created_at == b.created_at)
            }
        };
        candidates.truncate(keep);

        let mut results = candidates
            .into_iter()
            .map(|candidate| self.load_result(candidate, &terms))
            .collect::<Result<Vec<_>>>()?;

        match config.order {
            SortOrder::Desc => results.sort_by(by_score),
            SortOrder::Asc => results.sort_by(|a, b| oldest_first(&a.note, &b.note)),
        }
        results.truncate(limit);
        Ok(results)
    }

    /// Union of the postings of every term, one entry per note.
    fn collect_candidates(&self, terms: &[String], corpus: &TextCorpus) -> Result<Vec<Candidate>> {
        let snapshot = self.txn.snapshot();
        let mut candidates: HashMap<NoteKey, Candidate> = HashMap::new();

        for (term_index, term) in terms.iter().enumerate() {
            let Some(prefix) = text_prefix(term) else {
                continue;
            };

            let (lower, upper) = time_range(&prefix, None, None);
            let mut postings = Vec::new();
            for (key, value) in snapshot.range(Db::NoteText, lower, upper) {
                let (_, index_key) = parse_text_key(key)?;
                let posting = Posting::decode(snapshot.value(value)?)?;
                postings.push((index_key.note_key, index_key.created_at, posting));
            }

            let info = TermInfo::new(postings.len() as u32, corpus.doc_count);
            for (note_key, created_at, posting) in postings {
                candidates
                    .entry(note_key)
                    .or_insert_with(|| Candidate {
                        note_key,
                        created_at,
                        matches: Vec::new(),
                        score: 0.0,
                    })
                    .matches
                    .push((term_index, posting, info));
            }
        }

        Ok(candidates.into_values().collect())
    }

    fn load_result(&self, candidate: Candidate, terms: &[String]) -> Result<TextSearchResult> {
        let (note, _) = self.txn.load_note(candidate.note_key)?.ok_or_else(|| {
            Error::corrupt(format!(
                "content index points at missing note {}",
                candidate.note_key.value()
            ))
        })?;

        let mut matches = candidate.matches;
        matches.sort_by_key(|(term_index, _, _)| *term_index);
        let first_position = matches
            .iter()
            .map(|(_, posting, _)| posting.first_position)
            .min()
            .unwrap_or(0);

        Ok(TextSearchResult {
            note,
            note_key: candidate.note_key,
            score: candidate.score,
            matched_terms: matches.iter().map(|(i, _, _)| terms[*i].clone()).collect(),
            first_position,
        })
    }
}

fn by_score(a: &TextSearchResult, b: &TextSearchResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.note.id.cmp(&b.note.id))
}
