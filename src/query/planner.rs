use std::fmt;
use crate::core::types::{NoteId, Pubkey};
use crate::index::note_index::{author_prefix, kind_prefix, tag_prefix};
use crate::query::filter::Filter;
use crate::storage::db::Db;

/// Index chosen to produce candidates for one filter. Every other field is
/// re-checked on the candidate note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexPlan {
    Ids(Vec<NoteId>),
    Authors(Vec<Pubkey>),
    Tags { name: char, values: Vec<String> },
    Kinds(Vec<u64>),
    CreatedAt,
}

impl IndexPlan {
    pub fn db(&self) -> Db {
        match self {
            IndexPlan::Ids(_) => Db::NoteId,
            IndexPlan::Authors(_) => Db::NotePubkey,
            IndexPlan::Tags { .. } => Db::NoteTags,
            IndexPlan::Kinds(_) => Db::NoteKind,
            IndexPlan::CreatedAt => Db::NoteCreatedAt,
        }
    }

    /// Key prefixes to range scan. Id lookups are point reads and have none.
    pub fn prefixes(&self) -> Vec<Vec<u8>> {
        match self {
            IndexPlan::Ids(_) => Vec::new(),
            IndexPlan::Authors(authors) => authors.iter().map(author_prefix).collect(),
            IndexPlan::Tags { name, values } => {
                let mut buf = [0u8; 4];
                let name: &str = name.encode_utf8(&mut buf);
                values.iter().filter_map(|v| tag_prefix(name, v)).collect()
            }
            IndexPlan::Kinds(kinds) => kinds.iter().map(|k| kind_prefix(*k)).collect(),
            IndexPlan::CreatedAt => vec![Vec::new()],
        }
    }
}

impl fmt::Display for IndexPlan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IndexPlan::Ids(ids) => write!(f, "ids[{}]", ids.len()),
            IndexPlan::Authors(authors) => write!(f, "authors[{}]", authors.len()),
            IndexPlan::Tags { name, values } => write!(f, "tags#{}[{}]", name, values.len()),
            IndexPlan::Kinds(kinds) => write!(f, "kinds[{}]", kinds.len()),
            IndexPlan::CreatedAt => f.write_str("created_at"),
        }
    }
}

/// Query planner picks the most selective index a filter can use.
///
/// Exact ids beat authors, authors beat tags, tags beat kinds, and a filter
/// with none of those walks the time index. Among several tag fields the one
/// with the fewest values wins.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueryPlanner;

impl QueryPlanner {
    pub fn new() -> Self {
        QueryPlanner
    }

    pub fn plan(&self, filter: &Filter) -> IndexPlan {
        if !filter.ids().is_empty() {
            return IndexPlan::Ids(filter.ids().to_vec());
        }
        if !filter.authors().is_empty() {
            return IndexPlan::Authors(filter.authors().to_vec());
        }
        if let Some(tag) = filter.tags().iter().min_by_key(|t| t.values.len()) {
            return IndexPlan::Tags {
                name: tag.name,
                values: tag.values.clone(),
            };
        }
        if !filter.kinds().is_empty() {
            return IndexPlan::Kinds(filter.kinds().to_vec());
        }
        IndexPlan::CreatedAt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::FieldKind;

    #[test]
    fn picks_most_selective_index() {
        let planner = QueryPlanner::new();

        let mut builder = Filter::builder();
        builder.int_field(FieldKind::Kinds, &[1]).unwrap();
        assert_eq!(planner.plan(&builder.finish().unwrap()), IndexPlan::Kinds(vec![1]));

        builder.str_field(FieldKind::Tags('t'), &["a", "b"]).unwrap();
        builder.str_field(FieldKind::Tags('p'), &["c"]).unwrap();
        assert_eq!(
            planner.plan(&builder.finish().unwrap()),
            IndexPlan::Tags { name: 'p', values: vec!["c".into()] }
        );

        builder.str_field(FieldKind::Authors, &["11".repeat(32).as_str()]).unwrap();
        assert_eq!(planner.plan(&builder.finish().unwrap()).db(), Db::NotePubkey);
    }

    #[test]
    fn bare_filter_walks_time_index() {
        let mut builder = Filter::builder();
        builder.int_field(FieldKind::Limit, &[5]).unwrap();
        let plan = QueryPlanner::new().plan(&builder.finish().unwrap());
        assert_eq!(plan, IndexPlan::CreatedAt);
        assert_eq!(plan.prefixes(), vec![Vec::<u8>::new()]);
    }
}
