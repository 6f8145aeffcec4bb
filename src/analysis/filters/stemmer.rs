use rust_stemmers::{Algorithm, Stemmer};
use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// Snowball stemming. Index and query side must use the same algorithm or
/// terms will not meet in the index.
pub struct StemmerFilter {
    stemmer: Stemmer,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter {
            stemmer: Stemmer::create(algorithm),
        }
    }
}

impl TokenFilter for StemmerFilter {
    fn apply(&self, tokens: &mut Vec<Token>) {
        for token in tokens.iter_mut() {
            let stemmed = self.stemmer.stem(&token.text);
            if stemmed != token.text {
                token.text = stemmed.into_owned();
            }
        }
        tokens.retain(|token| !token.text.is_empty());
    }

    fn name(&self) -> &'static str {
        "stemmer"
    }
}
