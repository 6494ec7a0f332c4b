use async_trait::async_trait;

use crate::error::AiError;

/// The black-box "answer a question" capability chatbot automations use.
///
/// The question text already carries the rendered prompt and conversation
/// history; the ids are passed along so providers can attach their own
/// per-conversation state if they keep any.
#[async_trait]
pub trait AiResponder: Send + Sync + std::fmt::Debug {
    async fn answer_question(
        &self,
        question: &str,
        conversation_id: &str,
        contact_id: &str,
        channel_id: Option<&str>,
    ) -> Result<String, AiError>;
}
