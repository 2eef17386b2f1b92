//! Editor state: the document plus its two selection slots.
//!
//! All changes go through a [`Transaction`]. Applying one swaps in the new
//! document, recomputes the live selection, and runs the persisted-selection
//! reducer in the same synchronous step.

use crate::error::ToolError;
use crate::models::{Bias, Document, Fragment, Mapping, Selection, Span};
use crate::services::selection_tracker::{self, PersistCommand, PersistedSelection};

/// A batch of document steps and selection updates built against one state.
#[derive(Debug, Clone)]
pub struct Transaction {
    doc: Document,
    mapping: Mapping,
    selection: Option<Span>,
    persist: Option<PersistCommand>,
}

impl Transaction {
    fn new(doc: Document) -> Self {
        Self {
            doc,
            mapping: Mapping::new(),
            selection: None,
            persist: None,
        }
    }

    /// Replace `[from, to)` with plain text. On error the transaction is unchanged.
    pub fn replace_text(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<&mut Self, ToolError> {
        let step = self.doc.replace_text(from, to, text)?;
        self.mapping.push(step);
        Ok(self)
    }

    /// Insert rich content at `pos`. On error the transaction is unchanged.
    pub fn insert(&mut self, pos: usize, fragment: Fragment) -> Result<&mut Self, ToolError> {
        let step = self.doc.insert_fragment(pos, fragment)?;
        self.mapping.push(step);
        Ok(self)
    }

    pub fn set_selection(&mut self, span: Span) -> &mut Self {
        self.selection = Some(span);
        self
    }

    pub fn set_persisted(&mut self, command: PersistCommand) -> &mut Self {
        self.persist = Some(command);
        self
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.mapping.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct EditorState {
    doc: Document,
    cursor: Span,
    live: Selection,
    persisted: PersistedSelection,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl EditorState {
    pub fn new(doc: Document) -> Self {
        let cursor = Span::caret(1.min(doc.size()));
        let live = Selection::from_span(&doc, cursor);
        Self {
            doc,
            cursor,
            live,
            persisted: PersistedSelection::empty(),
        }
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn size(&self) -> usize {
        self.doc.size()
    }

    pub fn plain_text(&self) -> String {
        self.doc.text_content()
    }

    pub fn live_selection(&self) -> &Selection {
        &self.live
    }

    pub fn persisted(&self) -> &PersistedSelection {
        &self.persisted
    }

    /// The persisted span as a full selection, for use as command context.
    pub fn persisted_selection(&self) -> Option<Selection> {
        self.persisted
            .span()
            .map(|span| Selection::from_span(&self.doc, span))
    }

    pub fn tr(&self) -> Transaction {
        Transaction::new(self.doc.clone())
    }

    /// Apply a transaction. Returns whether the document content changed.
    pub fn apply(&mut self, tr: Transaction) -> bool {
        let doc_changed = tr.doc_changed();
        let size = tr.doc.size();

        let cursor = match tr.selection {
            Some(span) => span,
            None => map_cursor(self.cursor, &tr.mapping),
        };
        let from = cursor.from.min(size);
        self.cursor = Span::new(from, cursor.to.clamp(from, size));

        self.persisted = selection_tracker::reduce(
            &self.persisted,
            &tr.mapping,
            doc_changed,
            tr.persist,
            size,
        );

        if doc_changed {
            self.doc = tr.doc;
        }
        self.live = Selection::from_span(&self.doc, self.cursor);
        doc_changed
    }

    /// Move the live cursor/selection, as the view does on focus or click.
    pub fn set_selection(&mut self, from: usize, to: usize) {
        let mut tr = self.tr();
        tr.set_selection(Span::new(from, to));
        self.apply(tr);
    }

    /// Freeze a span as the persisted selection; `None` bounds clear it.
    pub fn set_persisted(&mut self, from: Option<usize>, to: Option<usize>) {
        let mut tr = self.tr();
        tr.set_persisted(PersistCommand::from_bounds(from, to));
        self.apply(tr);
    }

    /// Swap in a different document, dropping both selections.
    pub fn load_document(&mut self, doc: Document) {
        *self = Self::new(doc);
    }
}

fn map_cursor(cursor: Span, mapping: &Mapping) -> Span {
    if cursor.is_empty() {
        return Span::caret(mapping.map(cursor.from, Bias::Right));
    }
    let from = mapping.map(cursor.from, Bias::Right);
    let to = mapping.map(cursor.to, Bias::Left);
    if from <= to {
        Span::new(from, to)
    } else {
        Span::caret(to)
    }
}
