use std::path::Path;

use serde::{Deserialize, Serialize};

use talaria_ai::AiConfig;
use talaria_queue::QueueConfig;

use crate::error::ServerError;

fn default_listen() -> String {
    "127.0.0.1:8080".to_owned()
}

fn default_schedule_check_secs() -> u64 {
    60
}

fn default_webhook_timeout_secs() -> u64 {
    30
}

/// Authentication settings.
///
/// When `api_token` is unset, auth is disabled and every route is open --
/// only sensible for local development.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Schedule runner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between due-schedule checks.
    #[serde(default = "default_schedule_check_secs")]
    pub check_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_schedule_check_secs(),
        }
    }
}

/// Outbound webhook action settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookActionConfig {
    /// Bound on each `execute_webhook` call.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
    /// When set, action request bodies are HMAC-SHA256 signed.
    #[serde(default)]
    pub signing_secret: Option<String>,
}

impl Default for WebhookActionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
            signing_secret: None,
        }
    }
}

/// Top-level server configuration, loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address, `host:port`.
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub webhook_actions: WebhookActionConfig,

    /// Chatbot AI provider. Chatbot automations fail gracefully when unset.
    #[serde(default)]
    pub ai: Option<AiConfig>,

    /// Users notified by the payment webhook handler.
    #[serde(default)]
    pub payment_notify_users: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            auth: AuthConfig::default(),
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
            webhook_actions: WebhookActionConfig::default(),
            ai: None,
            payment_notify_users: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| ServerError::Config(format!("cannot parse {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listen, "127.0.0.1:8080");
        assert!(config.auth.api_token.is_none());
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.scheduler.check_interval_secs, 60);
        assert!(config.ai.is_none());
    }

    #[test]
    fn partial_config_overrides_selectively() {
        let config: ServerConfig = toml::from_str(
            r#"
            listen = "0.0.0.0:9090"

            [auth]
            api_token = "secret-token"

            [queue]
            max_attempts = 3
            poll_interval_ms = 250

            [queue.backoff]
            base = 10
            multiplier = 3.0
            max = 300

            [webhook_actions]
            signing_secret = "hmac-secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.listen, "0.0.0.0:9090");
        assert_eq!(config.auth.api_token.as_deref(), Some("secret-token"));
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.queue.poll_interval_ms, 250);
        assert_eq!(config.queue.backoff.base.as_secs(), 10);
        assert_eq!(config.queue.backoff.max.as_secs(), 300);
        assert_eq!(
            config.webhook_actions.signing_secret.as_deref(),
            Some("hmac-secret")
        );
    }
}
