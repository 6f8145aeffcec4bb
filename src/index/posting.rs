use serde::{Deserialize, Serialize};
use crate::core::error::Result;

/// Value stored under each content index key: how a term occurs in one note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub term_freq: u32,       // Occurrences of the term in the note
    pub first_position: u32,  // Word index of the first occurrence
    pub doc_len: u32,         // Indexed terms in the note, for length normalization
}

impl Posting {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
