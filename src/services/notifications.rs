use sqlx::PgPool;

use crate::db::notifications;
use crate::models::notifications::NewNotification;

/// Store an in-app notification produced by a workflow.
///
/// The workflow has already committed, so a failure here is logged and dropped.
pub async fn notify(pool: &PgPool, notification: NewNotification) {
    match notifications::insert_notification(pool, &notification).await {
        Ok(stored) => tracing::debug!(
            notification_id = %stored.id,
            recipient_id = %stored.recipient_id,
            "notification stored"
        ),
        Err(e) => tracing::warn!(
            error = %e,
            recipient_id = %notification.recipient_id,
            "failed to store notification"
        ),
    }
}
