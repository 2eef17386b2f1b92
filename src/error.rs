use thiserror::Error;

/// Failure to locate a target string in the document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Text not found in document: {0:?}")]
    NotFound(String),
}

/// Why a tool call was rejected. A rejected call never mutates the document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Span {from}..{to} is outside the document (size {size})")]
    OutOfBounds { from: usize, to: usize, size: usize },

    #[error("Anchor not found: {0:?}")]
    AnchorNotFound(String),

    #[error("Position {position} is outside the document (size {size})")]
    InvalidPosition { position: usize, size: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("Invalid highlight bounds {from}..{to} for document of size {size}")]
    InvalidBounds { from: usize, to: usize, size: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("Markup produced no content")]
    Empty,

    #[error("Unsupported markup: {0}")]
    Unsupported(String),
}

/// Errors raised by the language-model service.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No API key configured. Please add your API key in Settings.")]
    MissingApiKey,

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find data directory")]
    NoDataDir,

    #[error("Failed to access config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// User-facing failure categories surfaced by the command pipeline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("rate limited")]
    RateLimited,
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("timeout")]
    Timeout,
    #[error("text not found")]
    NotFound,
    #[error("malformed tool arguments")]
    MalformedArguments,
    #[error("out of bounds")]
    OutOfBounds,
    #[error("cancelled")]
    Cancelled,
    #[error("unknown")]
    Unknown,
}

impl CommandError {
    /// Fixed message shown to the user for this category.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => {
                "Your API key is missing or invalid. Please check it in Settings."
            }
            Self::RateLimited => "Too many requests. Please wait a moment and try again.",
            Self::ServiceUnavailable => {
                "The AI service is temporarily unavailable. Please try again later."
            }
            Self::Timeout => "The request timed out. Please try again.",
            Self::NotFound => {
                "I couldn't find that text in the document. Try quoting it exactly."
            }
            Self::MalformedArguments => "I failed to parse the edit I was asked to make.",
            Self::OutOfBounds => "That edit falls outside the document, so nothing was changed.",
            Self::Cancelled => "Request cancelled.",
            Self::Unknown => "Something went wrong. Please try again.",
        }
    }
}

impl From<&LlmError> for CommandError {
    fn from(error: &LlmError) -> Self {
        match error {
            LlmError::MissingApiKey => Self::Unauthorized,
            LlmError::Status { status, .. } => match *status {
                401 | 403 => Self::Unauthorized,
                429 => Self::RateLimited,
                500..=599 => Self::ServiceUnavailable,
                _ => Self::Unknown,
            },
            LlmError::Request(e) if e.is_timeout() => Self::Timeout,
            LlmError::Request(_) | LlmError::InvalidResponse(_) => Self::Unknown,
        }
    }
}

impl From<&ToolError> for CommandError {
    fn from(error: &ToolError) -> Self {
        match error {
            ToolError::AnchorNotFound(_) => Self::NotFound,
            ToolError::OutOfBounds { .. } | ToolError::InvalidPosition { .. } => Self::OutOfBounds,
        }
    }
}
