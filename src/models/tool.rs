use serde::{Deserialize, Serialize};

use super::chat::ToolType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Before,
    After,
}

/// Where `insertText` places its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PositionStrategy {
    Absolute { location: Location },
    Relative { anchor: String, placement: Placement },
    Selection,
}

/// A validated document mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ReplaceText {
        from: usize,
        to: usize,
        new_text: String,
    },
    InsertText {
        position: PositionStrategy,
        content: String,
    },
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ReplaceText { .. } => REPLACE_TEXT,
            ToolCall::InsertText { .. } => INSERT_TEXT,
        }
    }

    pub fn tool_type(&self) -> ToolType {
        match self {
            ToolCall::ReplaceText { .. } => ToolType::Replace,
            ToolCall::InsertText { .. } => ToolType::Insert,
        }
    }
}

pub const REPLACE_TEXT: &str = "replaceText";
pub const INSERT_TEXT: &str = "insertText";

/// Arguments the model sends for `replaceText`; the span is resolved locally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceTextArgs {
    pub search_text: String,
    pub new_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertTextArgs {
    pub position: PositionStrategy,
    pub content: String,
}

/// A model tool invocation after argument parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditCommand {
    Replace(ReplaceTextArgs),
    Insert(InsertTextArgs),
}

impl EditCommand {
    pub fn tool_type(&self) -> ToolType {
        match self {
            EditCommand::Replace(_) => ToolType::Replace,
            EditCommand::Insert(_) => ToolType::Insert,
        }
    }
}
