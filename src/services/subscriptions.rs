use chrono::{Duration, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use std::time::Duration as StdDuration;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode, RedisHelper};
use crate::db::subscriptions;
use crate::models::subscriptions::{
    ExpiryRunSummary, PackageWithLimits, SubscribeRequest, Subscription, SubscriptionDetails,
    SubscriptionStatus,
};
use crate::services::usage_limits;

const PACKAGES_CACHE_KEY: &str = "clinic:subscription_packages";
const PACKAGES_CACHE_TTL: StdDuration = StdDuration::from_secs(600);

pub fn end_date_for(start_date: NaiveDate, duration_in_days: i32) -> NaiveDate {
    start_date + Duration::days(duration_in_days as i64)
}

/// New end date when renewing: the period is added to whichever is later, today or the
/// current end date, so early renewals do not lose paid days.
pub fn renewed_end_date(today: NaiveDate, end_date: NaiveDate, duration_in_days: i32) -> NaiveDate {
    end_date_for(today.max(end_date), duration_in_days)
}

pub fn days_remaining(end_date: NaiveDate, today: NaiveDate) -> i64 {
    (end_date - today).num_days().max(0)
}

fn no_active_subscription() -> AppError {
    AppError::bad_request(
        ErrorCode::NoActiveSubscription,
        "You do not have an active subscription",
    )
}

/// Active packages with their limits; served from Redis when possible.
#[tracing::instrument(name = "List subscription packages", skip(pool, cache))]
pub async fn list_packages(
    pool: &PgPool,
    cache: &RedisHelper,
) -> Result<Vec<PackageWithLimits>, AppError> {
    match cache.get::<Vec<PackageWithLimits>>(PACKAGES_CACHE_KEY).await {
        Ok(Some(packages)) => return Ok(packages),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "package cache unavailable"),
    }

    let packages = subscriptions::get_active_packages(pool).await?;
    let mut result = Vec::with_capacity(packages.len());
    for package in packages {
        let limits = subscriptions::get_package_limits(pool, package.id).await?;
        result.push(PackageWithLimits { package, limits });
    }

    if let Err(e) = cache
        .set(PACKAGES_CACHE_KEY, &result, Some(PACKAGES_CACHE_TTL))
        .await
    {
        tracing::warn!(error = %e, "failed to cache subscription packages");
    }

    Ok(result)
}

pub async fn get_package(pool: &PgPool, package_id: Uuid) -> Result<PackageWithLimits, AppError> {
    let package = subscriptions::get_package_by_id(pool, package_id).await?;
    let limits = subscriptions::get_package_limits(pool, package.id).await?;
    Ok(PackageWithLimits { package, limits })
}

#[tracing::instrument(name = "Subscribe", skip(pool, request))]
pub async fn subscribe(
    pool: &PgPool,
    user_id: Uuid,
    request: &SubscribeRequest,
) -> Result<Subscription, AppError> {
    let mut tx = pool.begin().await?;

    if subscriptions::get_active_subscription(&mut *tx, user_id)
        .await?
        .is_some()
    {
        return Err(AppError::bad_request(
            ErrorCode::ActiveSubscriptionExists,
            "You already have an active subscription. Upgrade or cancel it first.",
        ));
    }

    let package = subscriptions::get_package_by_id(&mut *tx, request.package_id).await?;
    let start_date = Utc::now().date_naive();
    let subscription = subscriptions::insert_subscription(
        &mut *tx,
        user_id,
        package.id,
        start_date,
        end_date_for(start_date, package.duration_in_days),
        request.auto_renew,
        None,
    )
    .await?;

    let limits = subscriptions::get_package_limits(&mut *tx, package.id).await?;
    for limit in &limits {
        subscriptions::ensure_usage_row(&mut *tx, subscription.id, limit.resource_type).await?;
    }

    tx.commit().await?;
    tracing::info!(subscription_id = %subscription.id, package = %package.name, "subscription started");

    Ok(subscription)
}

/// Replace the active subscription with one on another package, carrying usage over.
#[tracing::instrument(name = "Upgrade subscription", skip(pool))]
pub async fn upgrade(
    pool: &PgPool,
    user_id: Uuid,
    package_id: Uuid,
) -> Result<Subscription, AppError> {
    let mut tx = pool.begin().await?;

    let current = subscriptions::get_active_subscription(&mut *tx, user_id)
        .await?
        .ok_or_else(no_active_subscription)?;
    if current.package_id == package_id {
        return Err(AppError::bad_request(
            ErrorCode::InvalidUpgrade,
            "You are already subscribed to this package",
        ));
    }

    let package = subscriptions::get_package_by_id(&mut *tx, package_id).await?;
    subscriptions::update_status(&mut *tx, current.id, SubscriptionStatus::Upgraded).await?;

    let start_date = Utc::now().date_naive();
    let upgraded = subscriptions::insert_subscription(
        &mut *tx,
        user_id,
        package.id,
        start_date,
        end_date_for(start_date, package.duration_in_days),
        current.auto_renew,
        Some(current.id),
    )
    .await?;

    subscriptions::copy_usage(&mut *tx, current.id, upgraded.id).await?;
    for limit in subscriptions::get_package_limits(&mut *tx, package.id).await? {
        subscriptions::ensure_usage_row(&mut *tx, upgraded.id, limit.resource_type).await?;
    }

    tx.commit().await?;
    tracing::info!(from = %current.id, to = %upgraded.id, "subscription upgraded");

    Ok(upgraded)
}

#[tracing::instrument(name = "Cancel subscription", skip(pool))]
pub async fn cancel(pool: &PgPool, user_id: Uuid) -> Result<Subscription, AppError> {
    let mut conn = pool.acquire().await?;
    let current = subscriptions::get_active_subscription(&mut *conn, user_id)
        .await?
        .ok_or_else(no_active_subscription)?;

    subscriptions::update_status(&mut *conn, current.id, SubscriptionStatus::Cancelled).await
}

/// Extend the subscription by one package period and reset its usage counters.
pub async fn renew_subscription(
    conn: &mut PgConnection,
    subscription: &Subscription,
    today: NaiveDate,
) -> Result<Subscription, AppError> {
    let package =
        subscriptions::get_subscribed_package(&mut *conn, subscription.package_id).await?;
    let start_date = if subscription.end_date < today {
        today
    } else {
        subscription.start_date
    };
    let end_date = renewed_end_date(today, subscription.end_date, package.duration_in_days);

    let renewed =
        subscriptions::extend_subscription(&mut *conn, subscription.id, start_date, end_date)
            .await?;
    subscriptions::reset_usage(&mut *conn, subscription.id).await?;

    Ok(renewed)
}

#[tracing::instrument(name = "Renew subscription", skip(pool))]
pub async fn renew(pool: &PgPool, user_id: Uuid) -> Result<Subscription, AppError> {
    let mut tx = pool.begin().await?;
    let current = subscriptions::get_active_subscription(&mut *tx, user_id)
        .await?
        .ok_or_else(no_active_subscription)?;

    let renewed = renew_subscription(&mut tx, &current, Utc::now().date_naive()).await?;
    tx.commit().await?;

    Ok(renewed)
}

pub async fn set_auto_renew(
    pool: &PgPool,
    user_id: Uuid,
    auto_renew: bool,
) -> Result<Subscription, AppError> {
    let current = subscriptions::get_active_subscription(pool, user_id)
        .await?
        .ok_or_else(no_active_subscription)?;

    subscriptions::update_auto_renew(pool, current.id, auto_renew).await
}

pub async fn current_details(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<SubscriptionDetails>, AppError> {
    let subscription = match subscriptions::get_active_subscription(pool, user_id).await? {
        Some(subscription) => subscription,
        None => return Ok(None),
    };

    let package = subscriptions::get_subscribed_package(pool, subscription.package_id).await?;
    let limits = subscriptions::get_package_limits(pool, package.id).await?;
    let usage = subscriptions::get_usage(pool, subscription.id).await?;
    let days_remaining = days_remaining(subscription.end_date, Utc::now().date_naive());

    Ok(Some(SubscriptionDetails {
        usage: usage_limits::summarize(&limits, &usage),
        subscription,
        package,
        days_remaining,
    }))
}

/// Renew `subscription` when it auto-renews, expire it otherwise. Returns `true` on renewal.
async fn settle_due(
    pool: &PgPool,
    subscription: &Subscription,
    today: NaiveDate,
) -> Result<bool, AppError> {
    let mut tx = pool.begin().await?;
    let renewed = if subscription.auto_renew {
        renew_subscription(&mut tx, subscription, today).await?;
        true
    } else {
        subscriptions::update_status(&mut *tx, subscription.id, SubscriptionStatus::Expired)
            .await?;
        false
    };
    tx.commit().await?;
    Ok(renewed)
}

/// Renew or expire every active subscription whose end date is before `today`.
///
/// Each subscription settles in its own transaction; a failure is logged and
/// counted, and the run moves on to the next one.
#[tracing::instrument(name = "Process expired subscriptions", skip(pool))]
pub async fn process_expired(pool: &PgPool, today: NaiveDate) -> Result<ExpiryRunSummary, AppError> {
    let due = subscriptions::get_due_subscriptions(pool, today).await?;
    let mut summary = ExpiryRunSummary::default();

    for subscription in &due {
        match settle_due(pool, subscription, today).await {
            Ok(true) => summary.renewed += 1,
            Ok(false) => summary.expired += 1,
            Err(e) => {
                tracing::error!(
                    subscription_id = %subscription.id,
                    user_id = %subscription.user_id,
                    error = %e,
                    "failed to settle due subscription"
                );
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
