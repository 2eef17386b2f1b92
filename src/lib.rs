//! Natural-language editing for rich-text documents.
//!
//! A prompt goes through the [`CommandPipeline`](services::command_pipeline::CommandPipeline)
//! to a function-calling language model. The returned tool call is resolved against the
//! document text and applied atomically, while the persisted selection follows every edit.

pub mod commands;
pub mod error;
pub mod models;
pub mod services;

pub use commands::Session;
pub use error::{CommandError, ToolError};
pub use models::{Document, Selection, Span, ToolCall};
pub use services::command_pipeline::{CommandOutcome, CommandPipeline, PipelineConfig};
pub use services::editor_state::EditorState;
pub use services::llm_client::{Completion, CompletionRequest, LanguageModel, ModelToolCall};
