use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(NotificationKind {
    General,
    Appointment,
    Billing,
    Inventory,
    Subscription,
});

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNotificationRequest {
    pub recipient_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub kind: Option<NotificationKind>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

/// Internal notification produced by a workflow rather than a request.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub clinic_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}
