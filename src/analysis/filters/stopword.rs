use std::collections::HashSet;
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Drops common words that carry no meaning on their own. Runs before
/// stemming, so the list holds surface forms.
pub struct StopWordFilter {
    pub stop_words: HashSet<String>,
}

impl StopWordFilter {
    pub fn new<I, S>(stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StopWordFilter {
            stop_words: stop_words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn english() -> Self {
        StopWordFilter::new([
            "a", "an", "and", "are", "as", "at", "be", "but", "by", "for",
            "from", "has", "have", "he", "i", "if", "in", "into", "is", "it",
            "its", "me", "my", "no", "not", "of", "on", "or", "so", "such",
            "that", "the", "their", "then", "there", "these", "they", "this",
            "to", "was", "we", "will", "with", "you",
        ])
    }
}

impl TokenFilter for StopWordFilter {
    fn apply(&self, tokens: &mut Vec<Token>) {
        tokens.retain(|token| !self.stop_words.contains(&token.text));
    }

    fn name(&self) -> &'static str {
        "stop_words"
    }
}
