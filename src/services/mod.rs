pub mod command_pipeline;
pub mod config_service;
pub mod editor_state;
pub mod llm_client;
pub mod markup;
pub mod position_resolver;
pub mod selection_tracker;
pub mod tool_executor;
