use std::fmt;
use serde::{Deserialize, Serialize};

/// Sort order for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,   // Oldest first
    #[default]
    Desc,  // Best or newest first
}

/// Filter field identifiers. `Tags` carries its single character name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Ids,
    Authors,
    Kinds,
    Tags(char),
    Since,
    Until,
    Limit,
}

/// Value type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Id,   // 32 byte id or pubkey, raw or hex
    Int,
    Str,
}

impl FieldKind {
    pub fn element_type(&self) -> ElementType {
        match self {
            FieldKind::Ids | FieldKind::Authors => ElementType::Id,
            FieldKind::Tags(_) => ElementType::Str,
            FieldKind::Kinds | FieldKind::Since | FieldKind::Until | FieldKind::Limit => ElementType::Int,
        }
    }

    /// Scalar fields hold exactly one element.
    pub fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Since | FieldKind::Until | FieldKind::Limit)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldKind::Ids => f.write_str("ids"),
            FieldKind::Authors => f.write_str("authors"),
            FieldKind::Kinds => f.write_str("kinds"),
            FieldKind::Tags(c) => write!(f, "#{}", c),
            FieldKind::Since => f.write_str("since"),
            FieldKind::Until => f.write_str("until"),
            FieldKind::Limit => f.write_str("limit"),
        }
    }
}
