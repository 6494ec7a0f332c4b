use serde::{Deserialize, Serialize};

/// Snapshot of a channel configuration.
///
/// Channel wire formats live behind their own adapters; the engine only
/// needs identity and a type tag for routing and template context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Producer type tag (`whatsapp`, `telegram`, `sms`, ...).
    pub channel_type: String,
}
