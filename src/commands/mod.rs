mod chat;
mod config;
mod editor;

pub use chat::*;
pub use config::*;
pub use editor::*;

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::ConfigError;
use crate::services::command_pipeline::{CommandPipeline, PipelineConfig};
use crate::services::config_service::{self, CredentialStore, Subscription};
use crate::services::editor_state::EditorState;
use crate::services::llm_client::{LanguageModel, StoredClient};

/// Everything the UI talks to for one open document.
pub struct Session {
    editor: Arc<Mutex<EditorState>>,
    credentials: Arc<CredentialStore>,
    pipeline: Arc<CommandPipeline>,
    _settings: Subscription,
}

impl Session {
    /// Open a session whose requests go to the endpoint configured at `config_path`.
    pub fn open(config_path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let credentials = Arc::new(CredentialStore::open(config_path)?);
        let model = Arc::new(StoredClient::new(credentials.clone()));
        Ok(Self::with_model(credentials, model))
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(config_service::get_config_path()?)
    }

    pub fn with_model(credentials: Arc<CredentialStore>, model: Arc<dyn LanguageModel>) -> Self {
        let editor = Arc::new(Mutex::new(EditorState::default()));
        let config = PipelineConfig::from(&credentials.config());
        let pipeline = Arc::new(CommandPipeline::new(editor.clone(), model, config));

        let store = Arc::downgrade(&credentials);
        let target = Arc::downgrade(&pipeline);
        let settings = credentials.subscribe(move |_| {
            if let (Some(store), Some(pipeline)) = (store.upgrade(), target.upgrade()) {
                pipeline.set_config(PipelineConfig::from(&store.config()));
            }
        });

        Self {
            editor,
            credentials,
            pipeline,
            _settings: settings,
        }
    }

    pub fn editor(&self) -> &Arc<Mutex<EditorState>> {
        &self.editor
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn pipeline(&self) -> &CommandPipeline {
        &self.pipeline
    }
}
