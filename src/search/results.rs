use std::cmp::Ordering;
use std::sync::Arc;
use crate::core::note::Note;
use crate::core::types::NoteKey;

/// One note returned by a filter query.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub note: Arc<Note>,
    pub note_key: NoteKey,
    pub note_size: u32,   // Encoded size in the note sub-store
}

/// One note returned by a full-text search.
#[derive(Debug, Clone)]
pub struct TextSearchResult {
    pub note: Arc<Note>,
    pub note_key: NoteKey,
    pub score: f32,                 // Relevance times recency boost
    pub matched_terms: Vec<String>, // Query terms found in the note, in query order
    pub first_position: u32,        // Word index of the earliest matched term
}

/// Query order: newest first, ties by ascending id.
pub fn newest_first(a: &Note, b: &Note) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Oldest first, ties by ascending id.
pub fn oldest_first(a: &Note, b: &Note) -> Ordering {
    a.created_at
        .cmp(&b.created_at)
        .then_with(|| a.id.cmp(&b.id))
}

/// Length of the prefix of `sorted` that holds the first `limit` items plus
/// every later item that ranks equal to the last of them. Only that prefix can
/// end up in the top `limit` once ties are broken.
pub fn tie_boundary<T>(sorted: &[T], limit: usize, same_rank: impl Fn(&T, &T) -> bool) -> usize {
    if limit == 0 {
        return 0;
    }
    if sorted.len() <= limit {
        return sorted.len();
    }

    let last = &sorted[limit - 1];
    limit + sorted[limit..].iter().take_while(|item| same_rank(last, item)).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_keeps_ties() {
        let ranks = [9, 8, 8, 8, 5];
        assert_eq!(tie_boundary(&ranks, 2, |a, b| a == b), 4);
        assert_eq!(tie_boundary(&ranks, 1, |a, b| a == b), 1);
        assert_eq!(tie_boundary(&ranks, 10, |a, b| a == b), 5);
        assert_eq!(tie_boundary(&ranks, 0, |a, b| a == b), 0);
    }
}
