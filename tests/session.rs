mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ScriptedModel, Step};
use inkwell_lib::commands::{self, Session};
use inkwell_lib::models::{Location, PositionStrategy};
use inkwell_lib::services::config_service::CredentialStore;
use inkwell_lib::services::selection_tracker::PERSISTED_SELECTION_CLASS;
use inkwell_lib::{CommandError, CommandOutcome, Span, ToolCall};
use pretty_assertions::assert_eq;

fn session(steps: Vec<Step>) -> (Session, Arc<ScriptedModel>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(CredentialStore::open(dir.path().join("config.json")).unwrap());
    let model = ScriptedModel::new(steps);
    (Session::with_model(store, model.clone()), model, dir)
}

#[test]
fn loading_markdown_resets_selection_state() {
    let (session, _model, _dir) = session(vec![]);
    commands::load_document(&session, "# Notes\n\nThe quick brown fox");
    assert_eq!(commands::get_document_text(&session), "Notes\nThe quick brown fox");

    // "quick" sits after the heading (size 7) and the paragraph's opening token.
    let pinned = commands::set_persisted_selection(&session, Some(12), Some(17)).unwrap();
    assert_eq!(pinned.text, "quick");
    let highlights = commands::get_highlights(&session);
    assert_eq!(highlights.len(), 1);
    assert_eq!(highlights[0].span, Span::new(12, 17));
    assert_eq!(highlights[0].class, PERSISTED_SELECTION_CLASS);

    commands::load_document(&session, "Fresh start");
    assert_eq!(commands::get_persisted_selection(&session), None);
    assert!(commands::get_highlights(&session).is_empty());
}

#[test]
fn invalid_persisted_bounds_clear_instead_of_failing() {
    let (session, _model, _dir) = session(vec![]);
    commands::load_document(&session, "Short");
    commands::set_persisted_selection(&session, Some(1), Some(4));
    assert_eq!(commands::set_persisted_selection(&session, Some(3), Some(99)), None);
    assert_eq!(commands::set_persisted_selection(&session, Some(4), Some(4)), None);
    assert!(commands::get_highlights(&session).is_empty());
}

#[tokio::test]
async fn prompts_use_the_persisted_selection() {
    let (session, model, _dir) = session(vec![ScriptedModel::tool_call(
        "insertText",
        r#"{"position":{"kind":"selection"},"content":" and lazy"}"#,
    )]);
    commands::load_document(&session, "The quick brown fox");
    commands::set_persisted_selection(&session, Some(5), Some(10));
    commands::set_selection(&session, 5, 10);

    let outcome = commands::send_prompt(&session, "Add another adjective").await;

    assert!(matches!(outcome, CommandOutcome::Applied { .. }));
    assert_eq!(
        commands::get_document_text(&session),
        "The quick and lazy brown fox"
    );
    assert!(model.request(0).messages[1].content.contains("\"quick\""));
    assert_eq!(commands::get_conversation(&session).len(), 2);

    commands::reset_conversation(&session);
    assert!(commands::get_conversation(&session).is_empty());
}

#[test]
fn direct_tool_calls_bypass_the_model() {
    let (session, model, _dir) = session(vec![]);
    commands::load_document(&session, "Body");
    let call = ToolCall::InsertText {
        position: PositionStrategy::Absolute {
            location: Location::Start,
        },
        content: "Title: ".to_string(),
    };
    assert!(commands::apply_tool_call(&session, &call));
    assert_eq!(commands::get_document_text(&session), "Title: Body");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let session = Session::open(dir.path().join("config.json")).unwrap();
    commands::load_document(&session, "Hello world");

    let outcome = commands::send_prompt(&session, "Rewrite this").await;

    assert_eq!(outcome, CommandOutcome::Failed(CommandError::Unauthorized));
    assert!(!commands::is_sending(&session));
    assert_eq!(commands::get_api_key(&session), None);
}

#[test]
fn settings_round_trip_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let session = Session::open(&path).unwrap();

    commands::set_api_key(&session, "sk-test").unwrap();
    commands::set_base_url(&session, "http://localhost:8080/v1").unwrap();
    commands::set_model(&session, "local-model").unwrap();

    let config = commands::get_config(&session);
    assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.base_url(), "http://localhost:8080/v1");
    assert_eq!(config.model(), "local-model");

    let reopened = Session::open(&path).unwrap();
    assert_eq!(commands::get_api_key(&reopened).as_deref(), Some("sk-test"));
}

#[tokio::test(start_paused = true)]
async fn timeout_setting_reaches_the_pipeline() {
    let (session, model, _dir) = session(vec![Step::Hang]);
    commands::load_document(&session, "Hello world");
    assert_eq!(session.pipeline().config().timeout, Duration::from_secs(30));

    commands::set_timeout_secs(&session, 2).unwrap();
    assert_eq!(session.pipeline().config().timeout, Duration::from_secs(2));
    assert_eq!(commands::get_config(&session).timeout_secs, Some(2));

    let started = tokio::time::Instant::now();
    let outcome = commands::send_prompt(&session, "Rewrite this").await;

    assert_eq!(outcome, CommandOutcome::Failed(CommandError::Timeout));
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(model.calls(), 1);
}
