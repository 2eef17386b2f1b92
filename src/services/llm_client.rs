use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;
use crate::services::config_service::{Config, CredentialStore, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// OpenAI-compatible function tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolDefinition {
    Function { function: FunctionDefinition },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: Option<String>,
    pub parameters: Option<Value>,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        ToolDefinition::Function {
            function: FunctionDefinition {
                name: name.to_string(),
                description: Some(description.to_string()),
                parameters: Some(parameters),
            },
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolDefinition::Function { function } => &function.name,
        }
    }
}

/// What the pipeline asks of a language model.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
}

/// A tool invocation returned by the model; `arguments` is raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelToolCall {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Text(String),
    ToolCall(ModelToolCall),
}

/// A function-calling chat model. Dropping the returned future abandons the request.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;
}

/// OpenAI-compatible chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

/// OpenAI-compatible chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl ChatCompletionResponse {
    fn into_completion(self) -> Result<Completion, LlmError> {
        let message = self
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::InvalidResponse("No response content".to_string()))?;

        if let Some(call) = message.tool_calls.into_iter().flatten().next() {
            return Ok(Completion::ToolCall(ModelToolCall {
                name: call.function.name,
                arguments: call.function.arguments,
            }));
        }
        Ok(Completion::Text(message.content.unwrap_or_default()))
    }
}

/// LLM Client for OpenAI-compatible APIs
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    /// Create a new LLM client from the app's configuration
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key = config.api_key.as_deref().unwrap_or("");
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        Self::new(
            config.base_url(),
            api_key,
            config.model(),
            config.timeout(),
        )
    }

    fn completions_url(&self) -> String {
        if self.base_url.contains("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
        }
    }

    /// Helper to create a system message
    pub fn system_message(content: &str) -> ChatMessage {
        ChatMessage {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    /// Helper to create a user message
    pub fn user_message(content: &str) -> ChatMessage {
        ChatMessage {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            tools: (!request.tools.is_empty()).then_some(request.tools.as_slice()),
            tool_choice: (!request.tools.is_empty()).then_some("auto"),
        };

        log::debug!(
            "Sending {} messages with {} tools to {}",
            request.messages.len(),
            request.tools.len(),
            self.model
        );

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            log::warn!("Language model returned {}", status);
            return Err(LlmError::Status { status, body });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        completion.into_completion()
    }
}

/// Client built from the credential store on first use and rebuilt after settings change.
pub struct StoredClient {
    store: Arc<CredentialStore>,
    cached: Arc<Mutex<Option<Arc<LlmClient>>>>,
    _subscription: Subscription,
}

impl StoredClient {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        let cached: Arc<Mutex<Option<Arc<LlmClient>>>> = Arc::new(Mutex::new(None));
        let cache = cached.clone();
        let subscription = store.subscribe(move |event| {
            log::debug!("Dropping cached client after {:?}", event);
            *cache.lock() = None;
        });
        Self {
            store,
            cached,
            _subscription: subscription,
        }
    }

    fn client(&self) -> Result<Arc<LlmClient>, LlmError> {
        let mut cached = self.cached.lock();
        if let Some(client) = cached.as_ref() {
            return Ok(client.clone());
        }
        let client = Arc::new(LlmClient::from_config(&self.store.config())?);
        *cached = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl LanguageModel for StoredClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        let client = self.client()?;
        client.complete(request).await
    }
}
