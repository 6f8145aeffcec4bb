use crate::analysis::token::Token;
use unicode_segmentation::UnicodeSegmentation;

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Vec<Token>;

    fn name(&self) -> &str;
}

/// Unicode word segmentation (UAX #29). Punctuation, whitespace and emoji
/// never become tokens.
#[derive(Debug, Clone)]
pub struct StandardTokenizer {
    pub lowercase: bool,
    pub max_token_length: usize,  // In bytes; longer words are dropped
}

impl Default for StandardTokenizer {
    fn default() -> Self {
        StandardTokenizer {
            lowercase: true,
            max_token_length: 255,
        }
    }
}

impl Tokenizer for StandardTokenizer {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();

        for (position, (offset, word)) in text.unicode_word_indices().enumerate() {
            let token_text = if self.lowercase {
                word.to_lowercase()
            } else {
                word.to_string()
            };

            if token_text.len() > self.max_token_length {
                continue;
            }
            tokens.push(Token::new(token_text, position as u32, offset));
        }

        tokens
    }

    fn name(&self) -> &str {
        "standard"
    }
}
