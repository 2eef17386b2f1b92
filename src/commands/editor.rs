use super::Session;
use crate::models::{Selection, ToolCall};
use crate::services::markup;
use crate::services::selection_tracker::Decoration;
use crate::services::tool_executor;

/// Replace the open document with one parsed from markdown. Clears the conversation.
pub fn load_document(session: &Session, markdown: &str) {
    session.pipeline().reset();
    session
        .editor()
        .lock()
        .load_document(markup::parse_document(markdown));
}

/// Document text with one line per block.
pub fn get_document_text(session: &Session) -> String {
    let editor = session.editor().lock();
    editor.doc().text_between(0, editor.size())
}

pub fn get_document_size(session: &Session) -> usize {
    session.editor().lock().size()
}

pub fn get_live_selection(session: &Session) -> Selection {
    session.editor().lock().live_selection().clone()
}

pub fn set_selection(session: &Session, from: usize, to: usize) -> Selection {
    let mut editor = session.editor().lock();
    editor.set_selection(from, to);
    editor.live_selection().clone()
}

/// Pin a span as AI context. `None` bounds, or bounds that do not fit, clear it.
pub fn set_persisted_selection(
    session: &Session,
    from: Option<usize>,
    to: Option<usize>,
) -> Option<Selection> {
    let mut editor = session.editor().lock();
    editor.set_persisted(from, to);
    editor.persisted_selection()
}

pub fn get_persisted_selection(session: &Session) -> Option<Selection> {
    session.editor().lock().persisted_selection()
}

pub fn get_highlights(session: &Session) -> Vec<Decoration> {
    session.editor().lock().persisted().decorations().to_vec()
}

/// Run a tool call directly, bypassing the language model.
pub fn apply_tool_call(session: &Session, tool_call: &ToolCall) -> bool {
    tool_executor::execute(&mut session.editor().lock(), tool_call)
}
