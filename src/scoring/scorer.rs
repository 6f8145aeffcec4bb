use crate::index::inverted::TermInfo;
use crate::index::posting::Posting;

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, posting: &Posting, term_info: &TermInfo, doc_stats: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// Collection statistics for scoring
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub avg_doc_length: f32,  // Average indexed terms per note
    pub total_docs: u64,      // Notes in the content index
}

/// BM25 Scorer
pub struct BM25Scorer {
    pub k1: f32,  // Term frequency saturation (default: 1.2)
    pub b: f32,   // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer {
            k1: 1.2,
            b: 0.75,
        }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, posting: &Posting, term_info: &TermInfo, doc_stats: &DocStats) -> f32 {
        let tf = posting.term_freq as f32;
        let doc_len = posting.doc_len as f32;
        let avg_doc_len = doc_stats.avg_doc_length.max(1.0);

        let numerator = term_info.idf * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

/// Multiplier favouring recent notes:
/// `1 + weight / (1 + age / half_life)`, with age in seconds behind the newest
/// candidate. Ages are relative so the same store always ranks the same way.
#[derive(Debug, Clone, Copy)]
pub struct RecencyBoost {
    pub weight: f32,
    pub half_life_secs: f32,
}

impl Default for RecencyBoost {
    fn default() -> Self {
        RecencyBoost {
            weight: 0.5,
            half_life_secs: 7.0 * 24.0 * 3600.0,
        }
    }
}

impl RecencyBoost {
    pub fn boost(&self, newest: u64, created_at: u64) -> f32 {
        let age = newest.saturating_sub(created_at) as f32;
        1.0 + self.weight / (1.0 + age / self.half_life_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(term_freq: u32, doc_len: u32) -> Posting {
        Posting {
            term_freq,
            first_position: 0,
            doc_len,
        }
    }

    #[test]
    fn bm25_saturates_term_frequency() {
        let scorer = BM25Scorer::default();
        let term = TermInfo::new(2, 10);
        let stats = DocStats { avg_doc_length: 5.0, total_docs: 10 };

        let one = scorer.score(&posting(1, 5), &term, &stats);
        let two = scorer.score(&posting(2, 5), &term, &stats);
        let ten = scorer.score(&posting(10, 5), &term, &stats);
        assert!(two > one);
        assert!((ten - two) / 8.0 < two - one);
        assert!(ten < term.idf * (scorer.k1 + 1.0));
    }

    #[test]
    fn shorter_notes_score_higher() {
        let scorer = BM25Scorer::default();
        let term = TermInfo::new(2, 10);
        let stats = DocStats { avg_doc_length: 10.0, total_docs: 10 };
        assert!(scorer.score(&posting(1, 3), &term, &stats) > scorer.score(&posting(1, 30), &term, &stats));
    }

    #[test]
    fn recency_boost_decays_with_age() {
        let boost = RecencyBoost::default();
        assert_eq!(boost.boost(1000, 1000), 1.5);
        let week_old = boost.boost(boost.half_life_secs as u64, 0);
        assert!((week_old - 1.25).abs() < 1e-6);
        assert!(boost.boost(10_000_000, 0) > 1.0);
    }
}
