use super::Session;
use crate::services::config_service::Config;

pub fn get_api_key(session: &Session) -> Option<String> {
    session.credentials().api_key()
}

pub fn set_api_key(session: &Session, key: &str) -> Result<(), String> {
    session
        .credentials()
        .set_api_key(key)
        .map_err(|e| e.to_string())
}

pub fn set_base_url(session: &Session, url: &str) -> Result<(), String> {
    session
        .credentials()
        .set_base_url(url)
        .map_err(|e| e.to_string())
}

pub fn set_model(session: &Session, model: &str) -> Result<(), String> {
    session
        .credentials()
        .set_model(model)
        .map_err(|e| e.to_string())
}

pub fn set_timeout_secs(session: &Session, secs: u64) -> Result<(), String> {
    session
        .credentials()
        .set_timeout_secs(secs)
        .map_err(|e| e.to_string())
}

pub fn get_config(session: &Session) -> Config {
    session.credentials().config()
}
