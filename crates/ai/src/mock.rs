use async_trait::async_trait;

use crate::error::AiError;
use crate::responder::AiResponder;

/// An [`AiResponder`] that returns a fixed answer.
#[derive(Debug, Clone)]
pub struct StaticAiResponder {
    answer: String,
}

impl StaticAiResponder {
    #[must_use]
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
        }
    }
}

#[async_trait]
impl AiResponder for StaticAiResponder {
    async fn answer_question(
        &self,
        _question: &str,
        _conversation_id: &str,
        _contact_id: &str,
        _channel_id: Option<&str>,
    ) -> Result<String, AiError> {
        Ok(self.answer.clone())
    }
}

/// An [`AiResponder`] that always fails.
#[derive(Debug, Clone)]
pub struct FailingAiResponder {
    message: String,
}

impl FailingAiResponder {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl AiResponder for FailingAiResponder {
    async fn answer_question(
        &self,
        _question: &str,
        _conversation_id: &str,
        _contact_id: &str,
        _channel_id: Option<&str>,
    ) -> Result<String, AiError> {
        Err(AiError::Api(self.message.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_responder_answers() {
        let responder = StaticAiResponder::new("42");
        let answer = responder
            .answer_question("meaning of life?", "conv-1", "c1", None)
            .await
            .unwrap();
        assert_eq!(answer, "42");
    }

    #[tokio::test]
    async fn failing_responder_errors() {
        let responder = FailingAiResponder::new("provider down");
        let result = responder.answer_question("?", "conv-1", "c1", None).await;
        assert!(matches!(result, Err(AiError::Api(_))));
    }
}
