use crate::analysis::token::Token;

/// One step of the analysis chain. Filters edit the token list in place and
/// may drop tokens, but never renumber positions.
pub trait TokenFilter: Send + Sync {
    fn apply(&self, tokens: &mut Vec<Token>);

    fn name(&self) -> &'static str;
}
