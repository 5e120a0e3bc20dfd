use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::notifications::{NewNotification, Notification};
use crate::models::pagination::PaginationQuery;

const NOTIFICATION_COLUMNS: &str =
    "id, clinic_id, recipient_id, title, message, kind, is_read, created_at";

pub async fn insert_notification(
    executor: impl PgExecutor<'_>,
    notification: &NewNotification,
) -> Result<Notification, AppError> {
    let query = format!(
        "INSERT INTO notifications (id, clinic_id, recipient_id, title, message, kind, is_read, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, NOW())
         RETURNING {}",
        NOTIFICATION_COLUMNS
    );

    let notification = sqlx::query_as::<_, Notification>(&query)
        .bind(Uuid::new_v4())
        .bind(notification.clinic_id)
        .bind(notification.recipient_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .fetch_one(executor)
        .await?;

    Ok(notification)
}

pub async fn get_user_notifications(
    executor: impl PgExecutor<'_>,
    recipient_id: Uuid,
    unread_only: bool,
    pagination: &PaginationQuery,
) -> Result<Vec<Notification>, AppError> {
    let query = format!(
        "SELECT {} FROM notifications
         WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
        NOTIFICATION_COLUMNS
    );

    let notifications = sqlx::query_as::<_, Notification>(&query)
        .bind(recipient_id)
        .bind(unread_only)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(notifications)
}

pub async fn count_user_notifications(
    executor: impl PgExecutor<'_>,
    recipient_id: Uuid,
    unread_only: bool,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications
         WHERE recipient_id = $1 AND ($2 = FALSE OR is_read = FALSE)",
    )
    .bind(recipient_id)
    .bind(unread_only)
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn mark_read(
    executor: impl PgExecutor<'_>,
    recipient_id: Uuid,
    notification_id: Uuid,
) -> Result<Notification, AppError> {
    let query = format!(
        "UPDATE notifications SET is_read = TRUE
         WHERE id = $1 AND recipient_id = $2
         RETURNING {}",
        NOTIFICATION_COLUMNS
    );

    sqlx::query_as::<_, Notification>(&query)
        .bind(notification_id)
        .bind(recipient_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::NotificationNotFound, "Notification not found"))
}

pub async fn mark_all_read(
    executor: impl PgExecutor<'_>,
    recipient_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(recipient_id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}
