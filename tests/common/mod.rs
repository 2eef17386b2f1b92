#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use inkwell_lib::error::LlmError;
use inkwell_lib::{Completion, CompletionRequest, LanguageModel, ModelToolCall};
use parking_lot::Mutex;
use tokio::sync::Notify;

pub enum Step {
    Respond(Result<Completion, LlmError>),
    /// Never answers; only cancellation or the timeout ends the request.
    Hang,
    /// Runs the callback while the request is in flight, then plays the inner step.
    After(Box<dyn FnOnce() + Send>, Box<Step>),
}

/// Language model that plays back a fixed script and records what it was sent.
#[derive(Default)]
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<CompletionRequest>>,
    pub started: Notify,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            ..Self::default()
        })
    }

    pub fn tool_call(name: &str, arguments: &str) -> Step {
        Step::Respond(Ok(Completion::ToolCall(ModelToolCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        })))
    }

    pub fn text(reply: &str) -> Step {
        Step::Respond(Ok(Completion::Text(reply.to_string())))
    }

    pub fn status(status: u16) -> Step {
        Step::Respond(Err(LlmError::Status {
            status,
            body: String::new(),
        }))
    }

    pub fn after(callback: impl FnOnce() + Send + 'static, step: Step) -> Step {
        Step::After(Box::new(callback), Box::new(step))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock()[index].clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError> {
        self.requests.lock().push(request);
        let mut step = self.steps.lock().pop_front();
        self.started.notify_one();
        while let Some(Step::After(callback, next)) = step {
            callback();
            step = Some(*next);
        }
        match step {
            Some(Step::Respond(result)) => result,
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::After(..)) | None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
        }
    }
}
