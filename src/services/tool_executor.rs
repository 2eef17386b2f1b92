use crate::error::ToolError;
use crate::models::{Bias, Fragment, Location, Placement, PositionStrategy, Span, ToolCall};
use crate::services::editor_state::EditorState;
use crate::services::markup::markdown_to_fragment;
use crate::services::position_resolver;

/// Result of a tool call that was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub tool_name: &'static str,
    /// The changed range in post-edit positions.
    pub span: Span,
}

/// Apply a tool call. `false` means it was rejected and the document is untouched.
pub fn execute(state: &mut EditorState, tool_call: &ToolCall) -> bool {
    match try_execute(state, tool_call) {
        Ok(applied) => {
            log::info!(
                "Applied {} at {}..{}",
                applied.tool_name,
                applied.span.from,
                applied.span.to
            );
            true
        }
        Err(e) => {
            log::warn!("Rejected {}: {}", tool_call.name(), e);
            false
        }
    }
}

/// Apply a tool call, reporting why it was rejected. Validation happens before any mutation.
pub fn try_execute(state: &mut EditorState, tool_call: &ToolCall) -> Result<Applied, ToolError> {
    let size = state.size();
    match tool_call {
        ToolCall::ReplaceText { from, to, new_text } => {
            let (from, to) = (*from, *to);
            if to < from || to > size {
                return Err(ToolError::OutOfBounds { from, to, size });
            }
            let mut tr = state.tr();
            tr.replace_text(from, to, new_text)?;
            let end = tr.mapping().map(to, Bias::Right);
            state.apply(tr);
            Ok(Applied {
                tool_name: tool_call.name(),
                span: Span::new(from, end),
            })
        }
        ToolCall::InsertText { position, content } => {
            let pos = insert_position(state, position)?;
            if pos > size {
                return Err(ToolError::InvalidPosition {
                    position: pos,
                    size,
                });
            }
            let fragment = content_to_fragment(content);
            let mut tr = state.tr();
            tr.insert(pos, fragment)?;
            let end = tr.mapping().map(pos, Bias::Right);
            state.apply(tr);
            Ok(Applied {
                tool_name: tool_call.name(),
                span: Span::new(pos, end),
            })
        }
    }
}

fn insert_position(state: &EditorState, position: &PositionStrategy) -> Result<usize, ToolError> {
    match position {
        PositionStrategy::Absolute {
            location: Location::Start,
        } => Ok(1),
        PositionStrategy::Absolute {
            location: Location::End,
        } => Ok(state.size().saturating_sub(1)),
        PositionStrategy::Relative { anchor, placement } => {
            let resolved = position_resolver::resolve(state.doc(), anchor)
                .map_err(|_| ToolError::AnchorNotFound(anchor.clone()))?;
            Ok(match placement {
                Placement::After => resolved.span.to,
                Placement::Before => resolved.span.from,
            })
        }
        PositionStrategy::Selection => Ok(state.live_selection().to),
    }
}

fn content_to_fragment(content: &str) -> Fragment {
    markdown_to_fragment(content).unwrap_or_else(|e| {
        log::debug!("Inserting raw text, markup conversion failed: {}", e);
        Fragment::text(content)
    })
}
