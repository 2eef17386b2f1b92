use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::CommandError;
use crate::models::{
    Conversation, EditCommand, InsertTextArgs, Intent, Message, ReplaceTextArgs, Selection,
    Span, ToolCall, ToolType, INSERT_TEXT, REPLACE_TEXT,
};
use crate::services::config_service::Config;
use crate::services::editor_state::EditorState;
use crate::services::llm_client::{
    ChatMessage, Completion, CompletionRequest, LanguageModel, LlmClient, ModelToolCall,
    ToolDefinition,
};
use crate::services::{position_resolver, tool_executor};

const EDITOR_SYSTEM_PROMPT: &str = r##"You are a writing assistant embedded in a document editor. The user talks to you about the document shown below and may ask you to change it.

## Your Tools

- replaceText: replace a passage. `searchText` must be copied from the document exactly as it appears; `newText` is the full replacement.
- insertText: add new content. `position` is one of:
  - {"kind": "absolute", "location": "start" | "end"}
  - {"kind": "relative", "anchor": "<text copied from the document>", "placement": "before" | "after"}
  - {"kind": "selection"} to insert right after the user's selected text
  `content` may use markdown.

## Rules

1. Call exactly one tool when the user asks for a change.
2. Keep `searchText` and `anchor` short but unique.
3. When the user only asks a question, answer in plain text and do not call a tool.
4. If you cannot make the requested change, say why in one or two sentences."##;

/// Characters of document text sent as context.
const MAX_DOCUMENT_CONTEXT: usize = 12_000;

static QUESTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(what|why|how|who|when|where|which|explain|is|are|does|do)\b")
        .expect("question pattern is valid")
});

static EDIT_VERB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(rewrite|replace|change|fix|insert|add|delete|remove|shorten|expand|translate|improve|rephrase|correct|make|append|prepend)\b",
    )
    .expect("edit verb pattern is valid")
});

/// Label a prompt for display. Does not affect what the pipeline does.
pub fn classify_intent(prompt: &str) -> Intent {
    if QUESTION_RE.is_match(prompt) {
        Intent::Discussion
    } else if EDIT_VERB_RE.is_match(prompt) {
        Intent::Edit
    } else {
        Intent::Discussion
    }
}

/// Tool schemas offered to the model.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            REPLACE_TEXT,
            "Replace a passage of the document with new text.",
            json!({
                "type": "object",
                "properties": {
                    "searchText": {
                        "type": "string",
                        "description": "Exact text from the document to replace"
                    },
                    "newText": {
                        "type": "string",
                        "description": "Replacement text"
                    }
                },
                "required": ["searchText", "newText"]
            }),
        ),
        ToolDefinition::function(
            INSERT_TEXT,
            "Insert new content into the document.",
            json!({
                "type": "object",
                "properties": {
                    "position": {
                        "oneOf": [
                            {
                                "type": "object",
                                "properties": {
                                    "kind": { "const": "absolute" },
                                    "location": { "enum": ["start", "end"] }
                                },
                                "required": ["kind", "location"]
                            },
                            {
                                "type": "object",
                                "properties": {
                                    "kind": { "const": "relative" },
                                    "anchor": { "type": "string" },
                                    "placement": { "enum": ["before", "after"] }
                                },
                                "required": ["kind", "anchor", "placement"]
                            },
                            {
                                "type": "object",
                                "properties": { "kind": { "const": "selection" } },
                                "required": ["kind"]
                            }
                        ]
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to insert, markdown allowed"
                    }
                },
                "required": ["position", "content"]
            }),
        ),
    ]
}

/// Turn a raw model tool invocation into a validated command.
pub fn parse_tool_call(call: &ModelToolCall) -> Result<EditCommand, CommandError> {
    let malformed = |e: serde_json::Error| {
        log::warn!("Could not parse {} arguments: {}", call.name, e);
        CommandError::MalformedArguments
    };
    match call.name.as_str() {
        REPLACE_TEXT => {
            let args: ReplaceTextArgs = serde_json::from_str(&call.arguments).map_err(malformed)?;
            if args.search_text.trim().is_empty() {
                return Err(CommandError::MalformedArguments);
            }
            Ok(EditCommand::Replace(args))
        }
        INSERT_TEXT => {
            let args: InsertTextArgs = serde_json::from_str(&call.arguments).map_err(malformed)?;
            Ok(EditCommand::Insert(args))
        }
        other => {
            log::warn!("Model called unknown tool {}", other);
            Err(CommandError::MalformedArguments)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Sending,
}

/// What one `submit` call ended with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Empty prompt, or a request was already in flight.
    Ignored,
    /// A tool call changed the document.
    Applied { tool_type: ToolType, span: Span },
    /// The model answered in text.
    Replied,
    /// An assistant message describing the failure was appended.
    Failed(CommandError),
    /// Cancelled by the caller; no assistant message.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub timeout: Duration,
    pub temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeout: config.timeout(),
            temperature: config.temperature(),
        }
    }
}

struct InFlight {
    id: u64,
    token: CancellationToken,
}

/// Runs prompts through the language model and applies the edits it asks for.
pub struct CommandPipeline {
    editor: Arc<Mutex<EditorState>>,
    model: Arc<dyn LanguageModel>,
    config: Mutex<PipelineConfig>,
    conversation: Mutex<Conversation>,
    in_flight: Mutex<Option<InFlight>>,
    next_request: AtomicU64,
}

impl CommandPipeline {
    pub fn new(
        editor: Arc<Mutex<EditorState>>,
        model: Arc<dyn LanguageModel>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            editor,
            model,
            config: Mutex::new(config),
            conversation: Mutex::new(Conversation::new()),
            in_flight: Mutex::new(None),
            next_request: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        *self.config.lock()
    }

    /// Replace the settings used by later requests. A request in flight keeps its own.
    pub fn set_config(&self, config: PipelineConfig) {
        *self.config.lock() = config;
    }

    pub fn status(&self) -> PipelineStatus {
        if self.in_flight.lock().is_some() {
            PipelineStatus::Sending
        } else {
            PipelineStatus::Idle
        }
    }

    pub fn is_sending(&self) -> bool {
        self.status() == PipelineStatus::Sending
    }

    pub fn conversation(&self) -> Conversation {
        self.conversation.lock().clone()
    }

    pub fn editor(&self) -> &Arc<Mutex<EditorState>> {
        &self.editor
    }

    /// Clear the conversation, e.g. when the active document changes.
    pub fn reset(&self) {
        self.cancel();
        self.conversation.lock().reset();
    }

    /// Abort the request in flight. Returns `false` when idle.
    pub fn cancel(&self) -> bool {
        match self.in_flight.lock().take() {
            Some(request) => {
                log::info!("Cancelling request {}", request.id);
                request.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Send a prompt, with the persisted selection as extra context when present.
    pub async fn submit(&self, prompt: &str, selection: Option<Selection>) -> CommandOutcome {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return CommandOutcome::Ignored;
        }

        let (id, token) = {
            let mut in_flight = self.in_flight.lock();
            if in_flight.is_some() {
                log::debug!("Ignoring prompt while a request is in flight");
                return CommandOutcome::Ignored;
            }
            let id = self.next_request.fetch_add(1, Ordering::Relaxed);
            let token = CancellationToken::new();
            *in_flight = Some(InFlight {
                id,
                token: token.clone(),
            });
            (id, token)
        };

        let config = self.config();
        let intent = classify_intent(prompt);
        let request = self.build_request(prompt, selection.as_ref(), &config);
        self.conversation.lock().push(Message::user(prompt, intent));
        log::info!("Request {} sent ({:?})", id, intent);

        let response = tokio::time::timeout(config.timeout, async {
            tokio::select! {
                biased;
                _ = token.cancelled() => None,
                result = self.model.complete(request) => Some(result),
            }
        })
        .await;

        self.finish(id);
        if token.is_cancelled() {
            log::info!("Request {} was cancelled before its answer was applied", id);
            return CommandOutcome::Cancelled;
        }

        let completion = match response {
            Err(_) => {
                log::warn!("Request {} timed out after {:?}", id, config.timeout);
                return self.fail(CommandError::Timeout);
            }
            Ok(None) => return CommandOutcome::Cancelled,
            Ok(Some(Err(e))) => {
                log::warn!("Request {} failed: {}", id, e);
                return self.fail(CommandError::from(&e));
            }
            Ok(Some(Ok(completion))) => completion,
        };

        match completion {
            Completion::Text(text) => {
                let text = text.trim();
                let reply = if text.is_empty() {
                    "I wasn't able to act on that request."
                } else {
                    text
                };
                self.reply(Message::assistant(reply, None));
                CommandOutcome::Replied
            }
            Completion::ToolCall(call) => match parse_tool_call(&call) {
                Ok(command) => self.run(command),
                Err(e) => self.fail(e),
            },
        }
    }

    fn build_request(
        &self,
        prompt: &str,
        selection: Option<&Selection>,
        config: &PipelineConfig,
    ) -> CompletionRequest {
        let document = {
            let editor = self.editor.lock();
            editor.doc().text_between(0, editor.size())
        };
        let system = format!(
            "{}\n\n## Document\n\n{}",
            EDITOR_SYSTEM_PROMPT,
            truncate_text(&document, MAX_DOCUMENT_CONTEXT)
        );

        let mut messages = vec![LlmClient::system_message(&system)];
        {
            let conversation = self.conversation.lock();
            messages.extend(conversation.messages().iter().map(|m| ChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            }));
        }

        let user = match selection.filter(|s| !s.is_empty) {
            Some(selection) => format!(
                "Selected text: \"{}\"\n\n{}",
                truncate_text(&selection.text, 2_000),
                prompt
            ),
            None => prompt.to_string(),
        };
        messages.push(LlmClient::user_message(&user));

        CompletionRequest {
            messages,
            tools: tool_definitions(),
            temperature: Some(config.temperature),
        }
    }

    fn run(&self, command: EditCommand) -> CommandOutcome {
        let tool_type = command.tool_type();
        let mut editor = self.editor.lock();

        let (tool_call, summary) = match command {
            EditCommand::Replace(args) => {
                let resolved = match position_resolver::resolve(editor.doc(), &args.search_text) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        log::warn!("{}", e);
                        drop(editor);
                        return self.fail(CommandError::NotFound);
                    }
                };
                let summary = format!(
                    "Replaced \"{}\" with \"{}\".",
                    truncate_text(&args.search_text, 60),
                    truncate_text(&args.new_text, 60)
                );
                (
                    ToolCall::ReplaceText {
                        from: resolved.span.from,
                        to: resolved.span.to,
                        new_text: args.new_text,
                    },
                    summary,
                )
            }
            EditCommand::Insert(args) => {
                let summary = format!("Inserted \"{}\".", truncate_text(&args.content, 60));
                (
                    ToolCall::InsertText {
                        position: args.position,
                        content: args.content,
                    },
                    summary,
                )
            }
        };

        let result = tool_executor::try_execute(&mut editor, &tool_call);
        drop(editor);

        match result {
            Ok(applied) => {
                log::info!(
                    "Applied {} at {}..{}",
                    applied.tool_name,
                    applied.span.from,
                    applied.span.to
                );
                self.reply(Message::assistant(&summary, Some(tool_type)));
                CommandOutcome::Applied {
                    tool_type,
                    span: applied.span,
                }
            }
            Err(e) => {
                log::warn!("Rejected {}: {}", tool_call.name(), e);
                let category = CommandError::from(&e);
                self.reply(Message::assistant(category.user_message(), Some(tool_type)));
                CommandOutcome::Failed(category)
            }
        }
    }

    fn fail(&self, error: CommandError) -> CommandOutcome {
        self.reply(Message::assistant(error.user_message(), None));
        CommandOutcome::Failed(error)
    }

    fn reply(&self, message: Message) {
        self.conversation.lock().push(message);
    }

    fn finish(&self, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.as_ref().is_some_and(|request| request.id == id) {
            *in_flight = None;
        }
    }
}

/// Truncate text to max length in characters, adding ellipsis if needed
fn truncate_text(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    let Some((cut, _)) = trimmed.char_indices().nth(max_len) else {
        return trimmed.to_string();
    };
    let truncated = &trimmed[..cut];
    // Try to break at a word boundary
    if let Some(last_space) = truncated.rfind(' ') {
        if last_space > cut / 2 {
            return format!("{}...", &trimmed[..last_space]);
        }
    }
    format!("{}...", truncated)
}
