use async_trait::async_trait;

use talaria_core::{Channel, Message};

use crate::error::ExecutionError;

/// Delivery seam for outbound messages.
///
/// Channel adapters (WhatsApp, Telegram, SMS, ...) live outside the engine;
/// whatever hosts it plugs one of these in. Persisting the message and
/// forwarding it are separate steps: a forward failure fails the
/// automation, but the message row already exists for the inbox UI.
#[async_trait]
pub trait OutboundForwarder: Send + Sync {
    async fn forward(&self, channel: &Channel, message: &Message) -> Result<(), ExecutionError>;
}
