use std::fmt;
use serde_json::{json, Map, Value};
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{NoteId, Pubkey};
use crate::query::types::{ElementType, FieldKind};

/// Most fields a single filter may carry.
pub const MAX_FILTER_FIELDS: usize = 16;
/// Most elements a single field may carry.
pub const MAX_FIELD_ELEMENTS: usize = 1024;

/// Values accepted for one tag name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagMatcher {
    pub name: char,
    pub values: Vec<String>,
}

/// Compiled, immutable note predicate. Built with [`FilterBuilder`].
///
/// Fields combine with AND, the values of one field with OR. A filter without
/// fields matches every note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub(crate) ids: Vec<NoteId>,       // Sorted
    pub(crate) authors: Vec<Pubkey>,   // Sorted
    pub(crate) kinds: Vec<u64>,        // Sorted
    pub(crate) tags: Vec<TagMatcher>,
    pub(crate) since: Option<u64>,
    pub(crate) until: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) fields: Vec<FieldKind>, // In commit order
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::new()
    }

    pub fn ids(&self) -> &[NoteId] {
        &self.ids
    }

    pub fn authors(&self) -> &[Pubkey] {
        &self.authors
    }

    pub fn kinds(&self) -> &[u64] {
        &self.kinds
    }

    pub fn tags(&self) -> &[TagMatcher] {
        &self.tags
    }

    pub fn since(&self) -> Option<u64> {
        self.since
    }

    pub fn until(&self) -> Option<u64> {
        self.until
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn fields(&self) -> &[FieldKind] {
        &self.fields
    }

    pub fn has_field(&self, kind: FieldKind) -> bool {
        self.fields.contains(&kind)
    }

    /// True when `since..until` cannot contain any timestamp.
    pub fn is_empty_range(&self) -> bool {
        match (self.since, self.until) {
            (Some(since), Some(until)) => since >= until,
            (_, Some(0)) => true,
            _ => false,
        }
    }

    /// Nostr wire form, e.g. `{"kinds":[1],"#t":["nostr"],"limit":10}`.
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for field in &self.fields {
            let value = match field {
                FieldKind::Ids => json!(self.ids.iter().map(NoteId::to_hex).collect::<Vec<_>>()),
                FieldKind::Authors => json!(self.authors.iter().map(Pubkey::to_hex).collect::<Vec<_>>()),
                FieldKind::Kinds => json!(self.kinds),
                FieldKind::Tags(c) => json!(self
                    .tags
                    .iter()
                    .find(|t| t.name == *c)
                    .map(|t| t.values.clone())
                    .unwrap_or_default()),
                FieldKind::Since => json!(self.since),
                FieldKind::Until => json!(self.until),
                FieldKind::Limit => json!(self.limit),
            };
            map.insert(field.to_string(), value);
        }
        Value::Object(map)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[derive(Debug, Clone)]
enum Elements {
    Ids(Vec<[u8; 32]>),
    Ints(Vec<u64>),
    Strs(Vec<String>),
}

impl Elements {
    fn for_kind(kind: FieldKind) -> Self {
        match kind.element_type() {
            ElementType::Id => Elements::Ids(Vec::new()),
            ElementType::Int => Elements::Ints(Vec::new()),
            ElementType::Str => Elements::Strs(Vec::new()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Elements::Ids(v) => v.len(),
            Elements::Ints(v) => v.len(),
            Elements::Strs(v) => v.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
struct OpenField {
    kind: FieldKind,
    elements: Elements,
}

impl OpenField {
    fn capacity(&self) -> usize {
        if self.kind.is_scalar() { 1 } else { MAX_FIELD_ELEMENTS }
    }

    fn check_capacity(&self) -> Result<()> {
        if self.elements.len() >= self.capacity() {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                format!("field {} holds at most {} element(s)", self.kind, self.capacity()),
            ));
        }
        Ok(())
    }

    fn type_mismatch(&self, got: ElementType) -> Error {
        Error::new(
            ErrorKind::TypeMismatch,
            format!(
                "field {} takes {:?} elements, got {:?}",
                self.kind,
                self.kind.element_type(),
                got
            ),
        )
    }
}

#[derive(Debug, Clone)]
enum BuilderState {
    Idle,
    FieldOpen(OpenField),
}

/// Explicit state machine for assembling a [`Filter`] one field at a time.
///
/// A failed call leaves the builder exactly as it was.
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    filter: Filter,
    state: BuilderState,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        FilterBuilder::new()
    }
}

impl FilterBuilder {
    pub fn new() -> Self {
        FilterBuilder {
            filter: Filter::default(),
            state: BuilderState::Idle,
        }
    }

    /// The field currently open, if any.
    pub fn open_field(&self) -> Option<FieldKind> {
        match &self.state {
            BuilderState::Idle => None,
            BuilderState::FieldOpen(open) => Some(open.kind),
        }
    }

    pub fn start_field(&mut self, kind: FieldKind) -> Result<()> {
        if let BuilderState::FieldOpen(open) = &self.state {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("field {} is still open", open.kind),
            ));
        }
        if let FieldKind::Tags(c) = kind {
            validate_tag_name(c)?;
        }
        if self.filter.has_field(kind) {
            return Err(Error::new(
                ErrorKind::DuplicateField,
                format!("field {} was already added to this filter", kind),
            ));
        }
        if self.filter.fields.len() >= MAX_FILTER_FIELDS {
            return Err(Error::new(
                ErrorKind::CapacityExceeded,
                format!("a filter holds at most {} fields", MAX_FILTER_FIELDS),
            ));
        }

        self.state = BuilderState::FieldOpen(OpenField {
            kind,
            elements: Elements::for_kind(kind),
        });
        Ok(())
    }

    pub fn start_tag_field(&mut self, name: char) -> Result<()> {
        self.start_field(FieldKind::Tags(name))
    }

    pub fn add_int_element(&mut self, value: u64) -> Result<()> {
        let open = self.open_mut()?;
        let Elements::Ints(values) = &open.elements else {
            return Err(open.type_mismatch(ElementType::Int));
        };
        if values.contains(&value) {
            return Ok(());
        }
        open.check_capacity()?;
        if let Elements::Ints(values) = &mut open.elements {
            values.push(value);
        }
        Ok(())
    }

    /// Tag values, or 64 character hex ids for IDS and AUTHORS.
    pub fn add_str_element(&mut self, value: &str) -> Result<()> {
        let open = self.open_mut()?;
        match open.kind.element_type() {
            ElementType::Str => {
                if let Elements::Strs(values) = &open.elements {
                    if values.iter().any(|v| v == value) {
                        return Ok(());
                    }
                }
                open.check_capacity()?;
                if let Elements::Strs(values) = &mut open.elements {
                    values.push(value.to_string());
                }
                Ok(())
            }
            ElementType::Id => {
                let kind = open.kind;
                let mut id = [0u8; 32];
                hex::decode_to_slice(value, &mut id).map_err(|e| {
                    Error::new(
                        ErrorKind::InvalidArgument,
                        format!("field {} expects 64 hex characters, got '{}': {}", kind, value, e),
                    )
                })?;
                self.add_id_element(&id)
            }
            ElementType::Int => Err(open.type_mismatch(ElementType::Str)),
        }
    }

    pub fn add_id_element(&mut self, id: &[u8; 32]) -> Result<()> {
        let open = self.open_mut()?;
        let Elements::Ids(ids) = &open.elements else {
            return Err(open.type_mismatch(ElementType::Id));
        };
        if ids.contains(id) {
            return Ok(());
        }
        open.check_capacity()?;
        if let Elements::Ids(ids) = &mut open.elements {
            ids.push(*id);
        }
        Ok(())
    }

    /// Commit the open field. A field with no elements is dropped.
    pub fn end_field(&mut self) -> Result<()> {
        let BuilderState::FieldOpen(open) = std::mem::replace(&mut self.state, BuilderState::Idle) else {
            return Err(no_open_field());
        };
        if open.elements.is_empty() {
            return Ok(());
        }

        let filter = &mut self.filter;
        match (open.kind, open.elements) {
            (FieldKind::Ids, Elements::Ids(ids)) => {
                filter.ids = sorted(ids.into_iter().map(NoteId).collect());
            }
            (FieldKind::Authors, Elements::Ids(ids)) => {
                filter.authors = sorted(ids.into_iter().map(Pubkey).collect());
            }
            (FieldKind::Kinds, Elements::Ints(kinds)) => filter.kinds = sorted(kinds),
            (FieldKind::Tags(name), Elements::Strs(values)) => {
                filter.tags.push(TagMatcher { name, values });
            }
            (FieldKind::Since, Elements::Ints(v)) => filter.since = v.first().copied(),
            (FieldKind::Until, Elements::Ints(v)) => filter.until = v.first().copied(),
            (FieldKind::Limit, Elements::Ints(v)) => filter.limit = v.first().copied(),
            (kind, _) => {
                return Err(Error::new(
                    ErrorKind::Internal,
                    format!("field {} holds elements of the wrong type", kind),
                ));
            }
        }
        filter.fields.push(open.kind);
        Ok(())
    }

    /// Snapshot the filter built so far. Fails while a field is open.
    pub fn finish(&self) -> Result<Filter> {
        if let BuilderState::FieldOpen(open) = &self.state {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!("field {} must be ended before finishing", open.kind),
            ));
        }
        Ok(self.filter.clone())
    }

    pub fn int_field(&mut self, kind: FieldKind, values: &[u64]) -> Result<&mut Self> {
        self.start_field(kind)?;
        self.fill(|b| values.iter().try_for_each(|v| b.add_int_element(*v)))
    }

    pub fn str_field(&mut self, kind: FieldKind, values: &[&str]) -> Result<&mut Self> {
        self.start_field(kind)?;
        self.fill(|b| values.iter().try_for_each(|v| b.add_str_element(v)))
    }

    // Roll back to Idle if filling the just-opened field fails.
    fn fill(&mut self, add: impl FnOnce(&mut Self) -> Result<()>) -> Result<&mut Self> {
        let before = self.filter.clone();
        match add(self).and_then(|_| self.end_field()) {
            Ok(()) => Ok(self),
            Err(e) => {
                self.filter = before;
                self.state = BuilderState::Idle;
                Err(e)
            }
        }
    }

    fn open_mut(&mut self) -> Result<&mut OpenField> {
        match &mut self.state {
            BuilderState::FieldOpen(open) => Ok(open),
            BuilderState::Idle => Err(no_open_field()),
        }
    }
}

fn no_open_field() -> Error {
    Error::new(ErrorKind::NoOpenField, "no field is open".to_string())
}

fn validate_tag_name(name: char) -> Result<()> {
    if name.is_ascii_alphanumeric() {
        Ok(())
    } else {
        Err(Error::new(
            ErrorKind::InvalidTagName,
            format!("tag name {:?} must be a single ASCII letter or digit", name),
        ))
    }
}

fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort();
    values.dedup();
    values
}
