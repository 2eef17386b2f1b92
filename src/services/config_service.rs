use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    /// Upper bound on a single language-model request.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

pub fn get_app_data_dir() -> Result<PathBuf, ConfigError> {
    let data_dir = dirs::data_dir()
        .ok_or(ConfigError::NoDataDir)?
        .join("Inkwell");

    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}

/// Stored config with every unset field filled with its default.
fn effective(config: Config) -> Config {
    Config {
        base_url: Some(config.base_url().to_string()),
        model: Some(config.model().to_string()),
        timeout_secs: Some(config.timeout().as_secs()),
        temperature: Some(config.temperature()),
        api_key: config.api_key,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialEvent {
    ApiKeyChanged { has_key: bool },
    /// Base URL, model or request timeout changed.
    SettingsChanged,
}

type Listener = Arc<dyn Fn(&CredentialEvent) + Send + Sync>;
type Listeners = Mutex<Vec<(usize, Listener)>>;

/// Keeps the listener registered until dropped.
#[must_use]
pub struct Subscription {
    id: usize,
    listeners: Weak<Listeners>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Owns the persisted credentials and tells subscribers when any setting changes.
pub struct CredentialStore {
    path: PathBuf,
    config: Mutex<Config>,
    listeners: Arc<Listeners>,
    next_id: AtomicUsize,
}

impl CredentialStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = load_from(&path)?;
        Ok(Self {
            path,
            config: Mutex::new(config),
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicUsize::new(0),
        })
    }

    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(get_config_path()?)
    }

    pub fn config(&self) -> Config {
        effective(self.config.lock().clone())
    }

    pub fn api_key(&self) -> Option<String> {
        self.config.lock().api_key.clone()
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), ConfigError> {
        let key = key.trim();
        self.update(|config| {
            config.api_key = (!key.is_empty()).then(|| key.to_string());
        })?;
        self.notify(CredentialEvent::ApiKeyChanged {
            has_key: !key.is_empty(),
        });
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<(), ConfigError> {
        self.set_api_key("")
    }

    pub fn set_base_url(&self, url: &str) -> Result<(), ConfigError> {
        self.update(|config| config.base_url = Some(url.trim().to_string()))?;
        self.notify(CredentialEvent::SettingsChanged);
        Ok(())
    }

    pub fn set_model(&self, model: &str) -> Result<(), ConfigError> {
        self.update(|config| config.model = Some(model.trim().to_string()))?;
        self.notify(CredentialEvent::SettingsChanged);
        Ok(())
    }

    pub fn set_timeout_secs(&self, secs: u64) -> Result<(), ConfigError> {
        self.update(|config| config.timeout_secs = Some(secs))?;
        self.notify(CredentialEvent::SettingsChanged);
        Ok(())
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&CredentialEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    fn update(&self, f: impl FnOnce(&mut Config)) -> Result<(), ConfigError> {
        let mut config = self.config.lock();
        let mut next = config.clone();
        f(&mut next);
        save_to(&self.path, &next)?;
        *config = next;
        Ok(())
    }

    fn notify(&self, event: CredentialEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            api_key: Some("sk-test".to_string()),
            timeout_secs: Some(10),
            ..Config::default()
        };
        save_to(&path, &config).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn subscribers_hear_key_changes_until_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::open(dir.path().join("config.json")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = seen.clone();
        let subscription = store.subscribe(move |event| sink.lock().push(*event));
        store.set_api_key("sk-live").unwrap();
        store.clear_api_key().unwrap();
        assert_eq!(
            *seen.lock(),
            vec![
                CredentialEvent::ApiKeyChanged { has_key: true },
                CredentialEvent::ApiKeyChanged { has_key: false },
            ]
        );

        drop(subscription);
        store.set_api_key("sk-again").unwrap();
        assert_eq!(seen.lock().len(), 2);
        assert_eq!(store.api_key().as_deref(), Some("sk-again"));
    }

    #[test]
    fn settings_changes_are_announced_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let store = CredentialStore::open(&path).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store.subscribe(move |event| sink.lock().push(*event));

        store.set_model(" gpt-4o ").unwrap();
        store.set_timeout_secs(5).unwrap();
        assert_eq!(
            *seen.lock(),
            vec![CredentialEvent::SettingsChanged, CredentialEvent::SettingsChanged]
        );

        let saved = load_from(&path).unwrap();
        assert_eq!(saved.model.as_deref(), Some("gpt-4o"));
        assert_eq!(saved.timeout_secs, Some(5));
        assert_eq!(store.config().model(), "gpt-4o");
        assert_eq!(store.config().timeout(), Duration::from_secs(5));
    }

    #[test]
    fn effective_config_fills_defaults() {
        let filled = effective(Config::default());
        assert_eq!(filled.base_url.as_deref(), Some(DEFAULT_BASE_URL));
        assert_eq!(filled.model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(filled.timeout_secs, Some(DEFAULT_TIMEOUT_SECS));
        assert_eq!(filled.temperature, Some(DEFAULT_TEMPERATURE));
        assert!(!filled.has_api_key());
    }
}
