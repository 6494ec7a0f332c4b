//! Source-specific webhook handlers.
//!
//! Every queue item is routed by its `source` tag through the registry. A
//! handler failure (including a parse failure on a malformed payload) is an
//! ordinary processing failure: it counts toward the item's attempts and
//! goes through retry/backoff.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use talaria_core::WebhookQueueItem;

/// A handler-level failure, recorded as the item's `last_error`.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<talaria_storage::StorageError> for HandlerError {
    fn from(error: talaria_storage::StorageError) -> Self {
        Self(error.to_string())
    }
}

/// Processes one claimed queue item.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Handler name, used in logs.
    fn name(&self) -> &str;

    async fn handle(&self, item: &WebhookQueueItem) -> Result<(), HandlerError>;
}

/// Routes items to handlers by source tag, with a default fallback.
pub struct HandlerRegistry {
    by_source: HashMap<String, Arc<dyn WebhookHandler>>,
    default: Arc<dyn WebhookHandler>,
}

impl HandlerRegistry {
    /// Create a registry whose unrouted sources go to `default`.
    pub fn new(default: Arc<dyn WebhookHandler>) -> Self {
        Self {
            by_source: HashMap::new(),
            default,
        }
    }

    /// Register a handler for a specific source tag.
    #[must_use]
    pub fn with_handler(
        mut self,
        source: impl Into<String>,
        handler: Arc<dyn WebhookHandler>,
    ) -> Self {
        self.by_source.insert(source.into(), handler);
        self
    }

    /// Resolve the handler for a source.
    #[must_use]
    pub fn resolve(&self, source: &str) -> &Arc<dyn WebhookHandler> {
        self.by_source.get(source).unwrap_or(&self.default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl WebhookHandler for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn handle(&self, _item: &WebhookQueueItem) -> Result<(), HandlerError> {
            Ok(())
        }
    }

    #[test]
    fn resolves_specific_then_default() {
        let registry = HandlerRegistry::new(Arc::new(Named("default")))
            .with_handler("payment", Arc::new(Named("payment")));
        assert_eq!(registry.resolve("payment").name(), "payment");
        assert_eq!(registry.resolve("whatsapp").name(), "default");
    }
}
