use crate::analysis::filter::TokenFilter;
use crate::analysis::token::Token;

/// bech32 human readable parts that mark a token as an encoded key, id or
/// invoice rather than a word.
const BECH32_PREFIXES: &[&str] = &[
    "npub1", "nsec1", "note1", "nevent1", "nprofile1", "naddr1", "nrelay1", "lnbc", "lnurl",
];

/// Drops references embedded in note content (`nostr:npub1..`, bare
/// `note1..`, 64 character hex ids, lightning invoices). They are unique per
/// note and only bloat the content index.
#[derive(Debug, Clone)]
pub struct EntityFilter {
    pub min_hex_len: usize,
}

impl Default for EntityFilter {
    fn default() -> Self {
        EntityFilter { min_hex_len: 32 }
    }
}

impl EntityFilter {
    pub fn is_entity(&self, text: &str) -> bool {
        let text = text.strip_prefix("nostr:").unwrap_or(text);
        if BECH32_PREFIXES.iter().any(|prefix| text.len() > prefix.len() + 8 && text.starts_with(prefix)) {
            return true;
        }
        text.len() >= self.min_hex_len && text.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl TokenFilter for EntityFilter {
    fn apply(&self, tokens: &mut Vec<Token>) {
        tokens.retain(|token| !self.is_entity(&token.text));
    }

    fn name(&self) -> &'static str {
        "entity"
    }
}
