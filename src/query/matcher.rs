use crate::core::note::Note;
use crate::query::filter::{Filter, TagMatcher};

impl Filter {
    /// Evaluate every field of the filter against `note`. LIMIT does not
    /// take part in matching.
    pub fn matches(&self, note: &Note) -> bool {
        if !self.ids.is_empty() && self.ids.binary_search(&note.id).is_err() {
            return false;
        }
        if !self.authors.is_empty() && self.authors.binary_search(&note.pubkey).is_err() {
            return false;
        }
        if !self.kinds.is_empty() && self.kinds.binary_search(&(note.kind as u64)).is_err() {
            return false;
        }
        if let Some(since) = self.since {
            if note.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if note.created_at >= until {
                return false;
            }
        }

        self.tags.iter().all(|matcher| matches_tag(matcher, note))
    }
}

fn matches_tag(matcher: &TagMatcher, note: &Note) -> bool {
    let mut buf = [0u8; 4];
    let name: &str = matcher.name.encode_utf8(&mut buf);

    note.tag_pairs()
        .any(|(tag_name, value)| tag_name == name && matcher.values.iter().any(|v| v == value))
}

#[cfg(test)]
mod tests {
    use crate::core::types::{NoteId, Pubkey, Sig};
    use crate::query::types::FieldKind;
    use super::*;

    fn note(kind: u32, created_at: u64, tags: &[(&str, &str)]) -> Note {
        Note {
            id: NoteId([1; 32]),
            pubkey: Pubkey([2; 32]),
            created_at,
            kind,
            tags: tags
                .iter()
                .map(|(n, v)| vec![n.to_string(), v.to_string()])
                .collect(),
            content: String::new(),
            sig: Sig([0; 64]),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filter::builder().finish().unwrap();
        assert!(filter.matches(&note(1, 0, &[])));
    }

    #[test]
    fn kinds_are_or_fields_are_and() {
        let mut builder = Filter::builder();
        builder.int_field(FieldKind::Kinds, &[1, 7]).unwrap();
        builder.str_field(FieldKind::Tags('t'), &["nostr", "rust"]).unwrap();
        let filter = builder.finish().unwrap();

        assert!(filter.matches(&note(1, 0, &[("t", "rust")])));
        assert!(filter.matches(&note(7, 0, &[("p", "x"), ("t", "nostr")])));
        assert!(!filter.matches(&note(3, 0, &[("t", "rust")])));
        assert!(!filter.matches(&note(1, 0, &[("p", "rust")])));
        assert!(!filter.matches(&note(1, 0, &[])));
    }

    #[test]
    fn until_is_exclusive_since_inclusive() {
        let mut builder = Filter::builder();
        builder.int_field(FieldKind::Since, &[10]).unwrap();
        builder.int_field(FieldKind::Until, &[20]).unwrap();
        let filter = builder.finish().unwrap();

        assert!(!filter.matches(&note(1, 9, &[])));
        assert!(filter.matches(&note(1, 10, &[])));
        assert!(filter.matches(&note(1, 19, &[])));
        assert!(!filter.matches(&note(1, 20, &[])));
    }

    #[test]
    fn authors_and_ids() {
        let mut builder = Filter::builder();
        builder.start_field(FieldKind::Authors).unwrap();
        builder.add_id_element(&[2; 32]).unwrap();
        builder.end_field().unwrap();
        builder.start_field(FieldKind::Ids).unwrap();
        builder.add_id_element(&[9; 32]).unwrap();
        builder.end_field().unwrap();
        let filter = builder.finish().unwrap();

        let mut n = note(1, 0, &[]);
        assert!(!filter.matches(&n));
        n.id = NoteId([9; 32]);
        assert!(filter.matches(&n));
    }
}
