use serde::{Deserialize, Serialize};

use super::document::{Document, Span};

/// A selection as presented to the UI and the prompt builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub text: String,
    pub from: usize,
    pub to: usize,
    pub is_empty: bool,
    pub word_count: usize,
}

impl Selection {
    pub fn from_span(doc: &Document, span: Span) -> Self {
        let text = if span.is_empty() {
            String::new()
        } else {
            doc.text_between(span.from, span.to)
        };
        let word_count = text.split_whitespace().count();
        Self {
            text,
            from: span.from,
            to: span.to,
            is_empty: span.is_empty(),
            word_count,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.from, self.to)
    }
}
