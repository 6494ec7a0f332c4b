use serde::{Deserialize, Serialize};

/// Input for creating an in-app notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NewNotification {
    pub user_id: String,
    pub title: String,
    pub body: String,
}
