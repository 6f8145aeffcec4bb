/// One word of note content after analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,      // Normalized term
    pub position: u32,     // Word index in the content, before filtering
    pub offset: usize,     // Byte offset in the original content
}

impl Token {
    pub fn new(text: impl Into<String>, position: u32, offset: usize) -> Self {
        Token {
            text: text.into(),
            position,
            offset,
        }
    }
}
