//! Persisted selection: a highlighted span that outlives focus changes and edits.
//!
//! The state is advanced by a pure reducer so it can be driven without a live view.

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;
use crate::models::{Bias, Mapping, Span};

pub const PERSISTED_SELECTION_CLASS: &str = "persisted-selection";

/// Request carried by a transaction to change the persisted selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistCommand {
    Set { from: usize, to: usize },
    Clear,
}

impl PersistCommand {
    /// Missing bounds clear the selection.
    pub fn from_bounds(from: Option<usize>, to: Option<usize>) -> Self {
        match (from, to) {
            (Some(from), Some(to)) => PersistCommand::Set { from, to },
            _ => PersistCommand::Clear,
        }
    }
}

/// Presentation-only highlighted region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoration {
    pub span: Span,
    pub class: String,
}

impl Decoration {
    pub fn highlight(from: usize, to: usize, doc_size: usize) -> Result<Self, SelectionError> {
        if from >= to || to > doc_size {
            return Err(SelectionError::InvalidBounds {
                from,
                to,
                size: doc_size,
            });
        }
        Ok(Self {
            span: Span::new(from, to),
            class: PERSISTED_SELECTION_CLASS.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedSelection {
    decoration: Option<Decoration>,
}

impl PersistedSelection {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn span(&self) -> Option<Span> {
        self.decoration.as_ref().map(|d| d.span)
    }

    pub fn decorations(&self) -> &[Decoration] {
        self.decoration.as_slice()
    }

    pub fn is_empty(&self) -> bool {
        self.decoration.is_none()
    }

    fn build(from: usize, to: usize, doc_size: usize) -> Self {
        match Decoration::highlight(from, to, doc_size) {
            Ok(decoration) => Self {
                decoration: Some(decoration),
            },
            Err(e) => {
                log::debug!("Clearing persisted selection: {}", e);
                Self::empty()
            }
        }
    }
}

/// Advance the persisted selection through one transaction.
///
/// An explicit command wins. Otherwise content changes remap the bounds (the start
/// sticks right, the end sticks left, so the highlight never grows into inserted
/// text at its edges) and anything else leaves the state untouched.
pub fn reduce(
    old: &PersistedSelection,
    mapping: &Mapping,
    doc_changed: bool,
    command: Option<PersistCommand>,
    doc_size: usize,
) -> PersistedSelection {
    match command {
        Some(PersistCommand::Clear) => PersistedSelection::empty(),
        Some(PersistCommand::Set { from, to }) => PersistedSelection::build(from, to, doc_size),
        None if !doc_changed => old.clone(),
        None => match old.span() {
            Some(span) => {
                let from = mapping.map(span.from, Bias::Right);
                let to = mapping.map(span.to, Bias::Left);
                PersistedSelection::build(from, to, doc_size)
            }
            None => PersistedSelection::empty(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StepMap;

    fn set(from: usize, to: usize) -> PersistedSelection {
        reduce(
            &PersistedSelection::empty(),
            &Mapping::new(),
            false,
            Some(PersistCommand::Set { from, to }),
            40,
        )
    }

    fn mapping(step: StepMap) -> Mapping {
        let mut mapping = Mapping::new();
        mapping.push(step);
        mapping
    }

    #[test]
    fn set_validates_bounds() {
        assert_eq!(set(5, 10).span(), Some(Span::new(5, 10)));
        assert!(set(10, 10).is_empty());
        assert!(set(12, 10).is_empty());
        assert!(set(5, 41).is_empty());
        assert_eq!(
            PersistCommand::from_bounds(None, Some(3)),
            PersistCommand::Clear
        );
    }

    #[test]
    fn insertion_before_shifts_the_range() {
        let next = reduce(&set(5, 10), &mapping(StepMap::new(2, 0, 3)), true, None, 43);
        assert_eq!(next.span(), Some(Span::new(8, 13)));
    }

    #[test]
    fn insertion_at_the_edges_does_not_grow_it() {
        let next = reduce(&set(5, 10), &mapping(StepMap::new(5, 0, 2)), true, None, 42);
        assert_eq!(next.span(), Some(Span::new(7, 12)));
        let next = reduce(&set(5, 10), &mapping(StepMap::new(10, 0, 2)), true, None, 42);
        assert_eq!(next.span(), Some(Span::new(5, 10)));
    }

    #[test]
    fn covering_deletion_clears_it() {
        let next = reduce(&set(5, 10), &mapping(StepMap::new(3, 9, 0)), true, None, 31);
        assert!(next.is_empty());
    }

    #[test]
    fn partial_deletion_shrinks_it() {
        let next = reduce(&set(5, 10), &mapping(StepMap::new(8, 4, 0)), true, None, 36);
        assert_eq!(next.span(), Some(Span::new(5, 8)));
    }

    #[test]
    fn non_content_transactions_preserve_it() {
        let old = set(5, 10);
        let next = reduce(&old, &Mapping::new(), false, None, 40);
        assert_eq!(next, old);
    }

    #[test]
    fn explicit_commands_take_priority() {
        let old = set(5, 10);
        let edit = mapping(StepMap::new(0, 0, 4));
        assert!(reduce(&old, &edit, true, Some(PersistCommand::Clear), 44).is_empty());
        let next = reduce(&old, &edit, true, Some(PersistCommand::Set { from: 1, to: 3 }), 44);
        assert_eq!(next.decorations().len(), 1);
        assert_eq!(next.decorations()[0].class, PERSISTED_SELECTION_CLASS);
    }
}
