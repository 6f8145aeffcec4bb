use std::collections::HashSet;
use rust_stemmers::Algorithm;
use crate::analysis::filter::TokenFilter;
use crate::analysis::filters::entity::EntityFilter;
use crate::analysis::filters::stemmer::StemmerFilter;
use crate::analysis::filters::stopword::StopWordFilter;
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{StandardTokenizer, Tokenizer};

/// Text analysis pipeline. The same analyzer must be used for indexing note
/// content and for parsing search queries.
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: impl Into<String>, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name: name.into(),
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            filter.apply(&mut tokens);
        }

        tokens
    }

    /// Distinct terms of `text` in order of first appearance.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.analyze(text)
            .into_iter()
            .filter(|token| seen.insert(token.text.clone()))
            .map(|token| token.text)
            .collect()
    }

    /// Lowercased unicode words, minus embedded references and English stop
    /// words, Snowball stemmed.
    pub fn standard_english() -> Self {
        Analyzer::new("standard_english", Box::new(StandardTokenizer::default()))
            .add_filter(Box::new(EntityFilter::default()))
            .add_filter(Box::new(StopWordFilter::english()))
            .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::standard_english()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_and_drops_stop_words() {
        let analyzer = Analyzer::standard_english();
        let terms: Vec<_> = analyzer
            .analyze("The Bitcoin miners are mining")
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(terms, vec!["bitcoin", "miner", "mine"]);
    }

    #[test]
    fn query_terms_are_distinct() {
        let analyzer = Analyzer::standard_english();
        assert_eq!(analyzer.terms("zap Zaps zap"), vec!["zap"]);
    }

    #[test]
    fn embedded_references_are_not_terms() {
        let analyzer = Analyzer::standard_english();
        let content = "zapped note1fntxtkcy9pjwucqwa9mddn7v03wwwsu9j330jj350nvhpky2tuaspk6nqc today";
        assert_eq!(analyzer.terms(content), vec!["zap", "today"]);
    }

    #[test]
    fn positions_survive_filtering() {
        let tokens = Analyzer::standard_english().analyze("the relay");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].position, 1);
    }
}
