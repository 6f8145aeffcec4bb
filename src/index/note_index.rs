use std::ops::Bound;
use crate::core::error::{Error, Result};
use crate::core::note::Note;
use crate::core::types::{NoteKey, Pubkey};
use crate::storage::db::Db;

// Every secondary index key ends with the same 16 byte suffix:
//
//   [ prefix ... ][ created_at u64 BE ][ note_key u64 BE ]
//
// so a prefix scan walks notes in created_at order, and ties fall back to
// insertion order. The prefix identifies the indexed value:
//
//   note_kind        kind u64 BE
//   note_pubkey      32 byte x-only key
//   note_tags        name_len u8 | name | value_len u32 BE | value
//   note_created_at  (empty)
pub const SUFFIX_LEN: usize = 16;

/// One decoded secondary index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexKey<'a> {
    pub prefix: &'a [u8],
    pub created_at: u64,
    pub note_key: NoteKey,
}

pub fn kind_prefix(kind: u64) -> Vec<u8> {
    kind.to_be_bytes().to_vec()
}

pub fn author_prefix(pubkey: &Pubkey) -> Vec<u8> {
    pubkey.as_bytes().to_vec()
}

/// Tag names longer than 255 bytes are never indexed, so there is no prefix
/// to scan for them.
pub fn tag_prefix(name: &str, value: &str) -> Option<Vec<u8>> {
    let name_len = u8::try_from(name.len()).ok()?;
    let value_len = u32::try_from(value.len()).ok()?;

    let mut prefix = Vec::with_capacity(5 + name.len() + value.len());
    prefix.push(name_len);
    prefix.extend_from_slice(name.as_bytes());
    prefix.extend_from_slice(&value_len.to_be_bytes());
    prefix.extend_from_slice(value.as_bytes());
    Some(prefix)
}

pub fn index_key(prefix: &[u8], created_at: u64, note_key: NoteKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + SUFFIX_LEN);
    key.extend_from_slice(prefix);
    key.extend_from_slice(&created_at.to_be_bytes());
    key.extend_from_slice(&note_key.to_be_bytes());
    key
}

pub fn parse_index_key(key: &[u8]) -> Result<IndexKey<'_>> {
    if key.len() < SUFFIX_LEN {
        return Err(Error::corrupt(format!("index key of {} bytes has no suffix", key.len())));
    }
    let (prefix, suffix) = key.split_at(key.len() - SUFFIX_LEN);
    let (created_at, note_key) = suffix.split_at(8);

    Ok(IndexKey {
        prefix,
        created_at: read_u64(created_at),
        note_key: NoteKey(read_u64(note_key)),
    })
}

/// Key range covering `prefix` with `since <= created_at < until`.
pub fn time_range(
    prefix: &[u8],
    since: Option<u64>,
    until: Option<u64>,
) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let lower = Bound::Included(index_key(prefix, since.unwrap_or(0), NoteKey(0)));
    let upper = match until {
        Some(until) => Bound::Excluded(index_key(prefix, until, NoteKey(0))),
        None => Bound::Included(index_key(prefix, u64::MAX, NoteKey(u64::MAX))),
    };
    (lower, upper)
}

/// Only single character tag names are indexed; filters can't ask for
/// anything longer.
pub fn is_indexed_tag(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some() && chars.next().is_none()
}

/// Secondary index keys derived from a note, excluding the content index.
pub fn note_index_keys(note: &Note, note_key: NoteKey) -> Vec<(Db, Vec<u8>)> {
    let created_at = note.created_at;
    let mut keys = vec![
        (Db::NoteKind, index_key(&kind_prefix(note.kind as u64), created_at, note_key)),
        (Db::NotePubkey, index_key(&author_prefix(&note.pubkey), created_at, note_key)),
        (Db::NoteCreatedAt, index_key(&[], created_at, note_key)),
    ];

    for (name, value) in note.tag_pairs() {
        if !is_indexed_tag(name) {
            continue;
        }
        if let Some(prefix) = tag_prefix(name, value) {
            keys.push((Db::NoteTags, index_key(&prefix, created_at, note_key)));
        }
    }

    keys
}

/// `(name, value)` of a tag index prefix.
pub fn parse_tag_prefix(prefix: &[u8]) -> Result<(&str, &str)> {
    let bad = || Error::corrupt("malformed tag index key");

    let name_len = *prefix.first().ok_or_else(bad)? as usize;
    let name = prefix.get(1..1 + name_len).ok_or_else(bad)?;
    let len_at = 1 + name_len;
    let value_len = prefix.get(len_at..len_at + 4).ok_or_else(bad)?;
    let value_len = u32::from_be_bytes([value_len[0], value_len[1], value_len[2], value_len[3]]) as usize;
    let value = prefix.get(len_at + 4..).ok_or_else(bad)?;
    if value.len() != value_len {
        return Err(bad());
    }

    let name = std::str::from_utf8(name).map_err(|_| bad())?;
    let value = std::str::from_utf8(value).map_err(|_| bad())?;
    Ok((name, value))
}

pub fn parse_kind_prefix(prefix: &[u8]) -> Result<u64> {
    if prefix.len() != 8 {
        return Err(Error::corrupt("malformed kind index key"));
    }
    Ok(read_u64(prefix))
}

pub fn parse_note_key(key: &[u8]) -> Result<NoteKey> {
    if key.len() != 8 {
        return Err(Error::corrupt(format!("note key of {} bytes", key.len())));
    }
    Ok(NoteKey(read_u64(key)))
}

pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_parses_back() {
        let key = index_key(&kind_prefix(7), 1_700_000_000, NoteKey(42));
        let parsed = parse_index_key(&key).unwrap();
        assert_eq!(parse_kind_prefix(parsed.prefix).unwrap(), 7);
        assert_eq!(parsed.created_at, 1_700_000_000);
        assert_eq!(parsed.note_key, NoteKey(42));
    }

    #[test]
    fn tag_prefixes_do_not_collide() {
        // "ab" + "c" must not share a prefix with "a" + "bc"
        let a = tag_prefix("t", "ab").unwrap();
        let b = tag_prefix("t", "a").unwrap();
        assert!(!a.starts_with(&b));
        assert_eq!(parse_tag_prefix(&a).unwrap(), ("t", "ab"));
    }

    #[test]
    fn time_range_is_half_open() {
        let prefix = kind_prefix(1);
        let (lower, upper) = time_range(&prefix, Some(10), Some(20));
        let inside = index_key(&prefix, 10, NoteKey(5));
        let at_until = index_key(&prefix, 20, NoteKey(1));

        let Bound::Included(lower) = lower else { panic!("lower bound") };
        let Bound::Excluded(upper) = upper else { panic!("upper bound") };
        assert!(inside >= lower && inside < upper);
        assert!(at_until >= upper);
    }

    #[test]
    fn only_single_char_tags_are_indexed() {
        assert!(is_indexed_tag("t"));
        assert!(is_indexed_tag("é"));
        assert!(!is_indexed_tag("title"));
        assert!(!is_indexed_tag(""));
    }
}
