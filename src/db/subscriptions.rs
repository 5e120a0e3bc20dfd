use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{is_unique_violation, AppError, ErrorCode};
use crate::models::subscriptions::{
    PackageLimit, ResourceType, Subscription, SubscriptionPackage, SubscriptionStatus,
    UsageTracking,
};

// Get all active subscription packages
pub async fn get_active_packages(
    executor: impl PgExecutor<'_>,
) -> Result<Vec<SubscriptionPackage>, AppError> {
    let packages = sqlx::query_as::<_, SubscriptionPackage>(
        r#"
        SELECT id, name, description, price, duration_in_days, is_active, sort_order,
               created_at, updated_at
        FROM subscription_packages
        WHERE is_active = TRUE
        ORDER BY sort_order ASC, price ASC
        "#,
    )
    .fetch_all(executor)
    .await?;

    Ok(packages)
}

const PACKAGE_COLUMNS: &str =
    "id, name, description, price, duration_in_days, is_active, sort_order, created_at, updated_at";

fn package_not_found() -> AppError {
    AppError::not_found(ErrorCode::PackageNotFound, "Subscription package not found")
}

/// Package that can still be subscribed to.
pub async fn get_package_by_id(
    executor: impl PgExecutor<'_>,
    package_id: Uuid,
) -> Result<SubscriptionPackage, AppError> {
    let query = format!(
        "SELECT {} FROM subscription_packages WHERE id = $1 AND is_active = TRUE",
        PACKAGE_COLUMNS
    );

    sqlx::query_as::<_, SubscriptionPackage>(&query)
        .bind(package_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(package_not_found)
}

/// Package an existing subscription points at, retired or not.
pub async fn get_subscribed_package(
    executor: impl PgExecutor<'_>,
    package_id: Uuid,
) -> Result<SubscriptionPackage, AppError> {
    let query = format!(
        "SELECT {} FROM subscription_packages WHERE id = $1",
        PACKAGE_COLUMNS
    );

    sqlx::query_as::<_, SubscriptionPackage>(&query)
        .bind(package_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(package_not_found)
}

pub async fn get_package_limits(
    executor: impl PgExecutor<'_>,
    package_id: Uuid,
) -> Result<Vec<PackageLimit>, AppError> {
    let limits = sqlx::query_as::<_, PackageLimit>(
        r#"
        SELECT id, package_id, resource_type, limit_value
        FROM package_limits
        WHERE package_id = $1
        ORDER BY resource_type
        "#,
    )
    .bind(package_id)
    .fetch_all(executor)
    .await?;

    Ok(limits)
}

const SUBSCRIPTION_COLUMNS: &str = "id, user_id, package_id, start_date, end_date, status, \
     is_active, auto_renew, previous_subscription_id, created_at, updated_at";

// Only one row per user is expected to match; the newest wins if data drifted.
pub async fn get_active_subscription(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Option<Subscription>, AppError> {
    let query = format!(
        "SELECT {} FROM subscriptions
         WHERE user_id = $1 AND is_active = TRUE AND status = 'Active'
         ORDER BY created_at DESC
         LIMIT 1",
        SUBSCRIPTION_COLUMNS
    );

    let subscription = sqlx::query_as::<_, Subscription>(&query)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

    Ok(subscription)
}

pub async fn get_user_subscriptions(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
) -> Result<Vec<Subscription>, AppError> {
    let query = format!(
        "SELECT {} FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
        SUBSCRIPTION_COLUMNS
    );

    let subscriptions = sqlx::query_as::<_, Subscription>(&query)
        .bind(user_id)
        .fetch_all(executor)
        .await?;

    Ok(subscriptions)
}

pub async fn get_due_subscriptions(
    executor: impl PgExecutor<'_>,
    today: NaiveDate,
) -> Result<Vec<Subscription>, AppError> {
    let query = format!(
        "SELECT {} FROM subscriptions
         WHERE is_active = TRUE AND status = 'Active' AND end_date < $1
         ORDER BY end_date ASC",
        SUBSCRIPTION_COLUMNS
    );

    let subscriptions = sqlx::query_as::<_, Subscription>(&query)
        .bind(today)
        .fetch_all(executor)
        .await?;

    Ok(subscriptions)
}

pub async fn insert_subscription(
    executor: impl PgExecutor<'_>,
    user_id: Uuid,
    package_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    auto_renew: bool,
    previous_subscription_id: Option<Uuid>,
) -> Result<Subscription, AppError> {
    let query = format!(
        "INSERT INTO subscriptions
            (id, user_id, package_id, start_date, end_date, status, is_active, auto_renew,
             previous_subscription_id, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 'Active', TRUE, $6, $7, NOW(), NOW())
         RETURNING {}",
        SUBSCRIPTION_COLUMNS
    );

    let subscription = sqlx::query_as::<_, Subscription>(&query)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(package_id)
        .bind(start_date)
        .bind(end_date)
        .bind(auto_renew)
        .bind(previous_subscription_id)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "subscriptions_one_active_idx") {
                AppError::bad_request(
                    ErrorCode::ActiveSubscriptionExists,
                    "You already have an active subscription. Upgrade or cancel it first.",
                )
            } else {
                e.into()
            }
        })?;

    Ok(subscription)
}

/// Soft-terminate or reactivate; anything but `Active` also clears `is_active`.
pub async fn update_status(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    status: SubscriptionStatus,
) -> Result<Subscription, AppError> {
    let query = format!(
        "UPDATE subscriptions
         SET status = $2,
             is_active = ($2 = 'Active'),
             auto_renew = CASE WHEN $2 = 'Cancelled' THEN FALSE ELSE auto_renew END,
             updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        SUBSCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Subscription>(&query)
        .bind(subscription_id)
        .bind(status.as_str())
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::SubscriptionNotFound, "Subscription not found"))
}

pub async fn update_auto_renew(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    auto_renew: bool,
) -> Result<Subscription, AppError> {
    let query = format!(
        "UPDATE subscriptions SET auto_renew = $2, updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        SUBSCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Subscription>(&query)
        .bind(subscription_id)
        .bind(auto_renew)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::SubscriptionNotFound, "Subscription not found"))
}

pub async fn extend_subscription(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Subscription, AppError> {
    let query = format!(
        "UPDATE subscriptions
         SET start_date = $2, end_date = $3, status = 'Active', is_active = TRUE, updated_at = NOW()
         WHERE id = $1
         RETURNING {}",
        SUBSCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Subscription>(&query)
        .bind(subscription_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::SubscriptionNotFound, "Subscription not found"))
}

pub async fn get_usage(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
) -> Result<Vec<UsageTracking>, AppError> {
    let usage = sqlx::query_as::<_, UsageTracking>(
        r#"
        SELECT id, subscription_id, resource_type, current_usage, updated_at
        FROM usage_tracking
        WHERE subscription_id = $1
        ORDER BY resource_type
        "#,
    )
    .bind(subscription_id)
    .fetch_all(executor)
    .await?;

    Ok(usage)
}

pub async fn ensure_usage_row(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    resource_type: ResourceType,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO usage_tracking (id, subscription_id, resource_type, current_usage, updated_at)
        VALUES ($1, $2, $3, 0, NOW())
        ON CONFLICT (subscription_id, resource_type) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subscription_id)
    .bind(resource_type.as_str())
    .execute(executor)
    .await?;

    Ok(())
}

/// Atomically add `amount` unless that would pass `limit_value` (`-1` = unlimited).
/// Returns `None` when the limit blocked the increment.
pub async fn increment_usage_within_limit(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    resource_type: ResourceType,
    amount: i32,
    limit_value: i32,
) -> Result<Option<UsageTracking>, AppError> {
    let usage = sqlx::query_as::<_, UsageTracking>(
        r#"
        UPDATE usage_tracking
        SET current_usage = current_usage + $3, updated_at = NOW()
        WHERE subscription_id = $1
          AND resource_type = $2
          AND ($4 = -1 OR current_usage + $3 <= $4)
        RETURNING id, subscription_id, resource_type, current_usage, updated_at
        "#,
    )
    .bind(subscription_id)
    .bind(resource_type.as_str())
    .bind(amount)
    .bind(limit_value)
    .fetch_optional(executor)
    .await?;

    Ok(usage)
}

pub async fn decrement_usage(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
    resource_type: ResourceType,
    amount: i32,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE usage_tracking
        SET current_usage = GREATEST(current_usage - $3, 0), updated_at = NOW()
        WHERE subscription_id = $1 AND resource_type = $2
        "#,
    )
    .bind(subscription_id)
    .bind(resource_type.as_str())
    .bind(amount)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn reset_usage(
    executor: impl PgExecutor<'_>,
    subscription_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE usage_tracking SET current_usage = 0, updated_at = NOW() WHERE subscription_id = $1",
    )
    .bind(subscription_id)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn copy_usage(
    executor: impl PgExecutor<'_>,
    from_subscription_id: Uuid,
    to_subscription_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO usage_tracking (id, subscription_id, resource_type, current_usage, updated_at)
        SELECT gen_random_uuid(), $2, resource_type, current_usage, NOW()
        FROM usage_tracking
        WHERE subscription_id = $1
        ON CONFLICT (subscription_id, resource_type)
        DO UPDATE SET current_usage = EXCLUDED.current_usage, updated_at = NOW()
        "#,
    )
    .bind(from_subscription_id)
    .bind(to_subscription_id)
    .execute(executor)
    .await?;

    Ok(())
}
