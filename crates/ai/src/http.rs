use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::AiConfig;
use crate::error::AiError;
use crate::responder::AiResponder;

/// HTTP-based [`AiResponder`] speaking an OpenAI-compatible chat
/// completions API.
#[derive(Debug)]
pub struct HttpAiResponder {
    client: reqwest::Client,
    config: AiConfig,
}

impl HttpAiResponder {
    /// Create a responder with the given configuration.
    pub fn new(config: AiConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AiError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Extract the assistant text from a chat completions response body.
    fn extract_content(body: &serde_json::Value) -> Result<String, AiError> {
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_owned())
            .ok_or_else(|| AiError::Parse(format!("unexpected response format: {body}")))
    }
}

#[async_trait]
impl AiResponder for HttpAiResponder {
    async fn answer_question(
        &self,
        question: &str,
        conversation_id: &str,
        _contact_id: &str,
        _channel_id: Option<&str>,
    ) -> Result<String, AiError> {
        let request_body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": question,
                }
            ],
            "user": conversation_id,
        });

        debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            conversation_id = %conversation_id,
            "sending chatbot completion request"
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AiError::Timeout(self.config.timeout_seconds)
                } else {
                    AiError::Http(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "AI provider returned error");
            return Err(AiError::Api(format!("HTTP {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("failed to parse API response: {e}")))?;

        Self::extract_content(&body)
    }
}
