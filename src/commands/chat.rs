use super::Session;
use crate::models::Message;
use crate::services::command_pipeline::CommandOutcome;

/// Send a prompt with the persisted selection, if any, as context.
pub async fn send_prompt(session: &Session, prompt: &str) -> CommandOutcome {
    let selection = session.editor().lock().persisted_selection();
    session.pipeline().submit(prompt, selection).await
}

pub fn cancel_prompt(session: &Session) -> bool {
    session.pipeline().cancel()
}

pub fn is_sending(session: &Session) -> bool {
    session.pipeline().is_sending()
}

pub fn get_conversation(session: &Session) -> Vec<Message> {
    session.pipeline().conversation().messages().to_vec()
}

pub fn reset_conversation(session: &Session) {
    session.pipeline().reset()
}
