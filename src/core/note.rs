use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::core::error::Result;
use crate::core::types::{NoteId, Pubkey, Sig};

/// A signed, immutable nostr note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub pubkey: Pubkey,
    pub created_at: u64,
    pub kind: u32,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: Sig,
}

impl Note {
    /// Canonical serialization that the id commits to:
    /// `[0,"<pubkey>",created_at,kind,tags,"content"]` as compact JSON.
    pub fn canonical_json(
        pubkey: &Pubkey,
        created_at: u64,
        kind: u32,
        tags: &[Vec<String>],
        content: &str,
    ) -> Result<String> {
        Ok(serde_json::to_string(&(0u8, pubkey, created_at, kind, tags, content))?)
    }

    pub fn compute_id(
        pubkey: &Pubkey,
        created_at: u64,
        kind: u32,
        tags: &[Vec<String>],
        content: &str,
    ) -> Result<NoteId> {
        let canonical = Self::canonical_json(pubkey, created_at, kind, tags, content)?;
        Ok(NoteId(Sha256::digest(canonical.as_bytes()).into()))
    }

    /// Recompute the id from the note's fields.
    pub fn recompute_id(&self) -> Result<NoteId> {
        Self::compute_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)
    }

    pub fn has_valid_id(&self) -> Result<bool> {
        Ok(self.recompute_id()? == self.id)
    }

    /// Iterate `(name, value)` pairs of tags that have at least a name and a value.
    pub fn tag_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().filter_map(|tag| match tag.as_slice() {
            [name, value, ..] => Some((name.as_str(), value.as_str())),
            _ => None,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_is_compact_and_escaped() {
        let pubkey = Pubkey([1; 32]);
        let tags = vec![vec!["t".to_string(), "nostr".to_string()]];
        let json = Note::canonical_json(&pubkey, 10, 1, &tags, "line\n\"quoted\"").unwrap();
        assert_eq!(
            json,
            format!(r#"[0,"{}",10,1,[["t","nostr"]],"line\n\"quoted\""]"#, "01".repeat(32))
        );
    }

    #[test]
    fn tag_pairs_skip_incomplete_tags() {
        let note = Note {
            id: NoteId([0; 32]),
            pubkey: Pubkey([0; 32]),
            created_at: 0,
            kind: 1,
            tags: vec![
                vec!["t".into()],
                vec!["t".into(), "rust".into(), "extra".into()],
                vec![],
            ],
            content: String::new(),
            sig: Sig([0; 64]),
        };
        let pairs: Vec<_> = note.tag_pairs().collect();
        assert_eq!(pairs, vec![("t", "rust")]);
    }

    #[test]
    fn binary_encoding_roundtrip() {
        let note = Note {
            id: NoteId([9; 32]),
            pubkey: Pubkey([8; 32]),
            created_at: 1_700_000_000,
            kind: 30023,
            tags: vec![vec!["d".into(), "slug".into()]],
            content: "long form".into(),
            sig: Sig([7; 64]),
        };
        assert_eq!(Note::decode(&note.encode().unwrap()).unwrap(), note);
    }
}
