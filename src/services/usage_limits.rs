//! Subscription quota checks for quota-counted resources.
//!
//! A clinic's quota belongs to the clinic owner's active subscription, so every
//! entry point takes the owner's staff id rather than the caller's.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::db::subscriptions;
use crate::models::subscriptions::{
    PackageLimit, ResourceType, Subscription, UsageSummary, UsageTracking, UNLIMITED,
};

/// `true` when `requested` more units fit under `limit`.
pub fn validate_usage_limit(current_usage: i32, limit_value: i32, requested: i32) -> bool {
    if limit_value == UNLIMITED {
        return true;
    }
    current_usage.saturating_add(requested) <= limit_value
}

/// Cap for `resource`; resources without a declared limit are unlimited.
pub fn limit_for(limits: &[PackageLimit], resource: ResourceType) -> i32 {
    limits
        .iter()
        .find(|limit| limit.resource_type == resource)
        .map(|limit| limit.limit_value)
        .unwrap_or(UNLIMITED)
}

pub fn summarize(limits: &[PackageLimit], usage: &[UsageTracking]) -> Vec<UsageSummary> {
    [
        ResourceType::Clinics,
        ResourceType::Patients,
        ResourceType::Staff,
        ResourceType::Appointments,
    ]
    .into_iter()
    .map(|resource_type| {
        let current_usage = usage
            .iter()
            .find(|row| row.resource_type == resource_type)
            .map(|row| row.current_usage)
            .unwrap_or(0);
        let limit_value = limit_for(limits, resource_type);
        let remaining = (limit_value != UNLIMITED).then(|| (limit_value - current_usage).max(0));

        UsageSummary {
            resource_type,
            current_usage,
            limit_value,
            remaining,
        }
    })
    .collect()
}

fn limit_exceeded(resource: ResourceType) -> AppError {
    AppError::bad_request(
        ErrorCode::UsageLimitExceeded,
        format!(
            "Your subscription limit for {} has been reached. Upgrade your package to add more.",
            resource.as_str().to_lowercase()
        ),
    )
}

async fn require_active(
    conn: &mut PgConnection,
    owner_id: Uuid,
) -> Result<Subscription, AppError> {
    subscriptions::get_active_subscription(&mut *conn, owner_id)
        .await?
        .ok_or_else(|| {
            AppError::bad_request(
                ErrorCode::NoActiveSubscription,
                "An active subscription is required for this operation",
            )
        })
}

/// Read-only check used by the UI before showing a create form.
#[tracing::instrument(name = "Validate usage limit", skip(pool))]
pub async fn check_usage_limit(
    pool: &PgPool,
    owner_id: Uuid,
    resource: ResourceType,
    requested: i32,
) -> Result<bool, AppError> {
    let mut conn = pool.acquire().await?;
    let subscription = match subscriptions::get_active_subscription(&mut *conn, owner_id).await? {
        Some(subscription) => subscription,
        None => return Ok(false),
    };
    let limits = subscriptions::get_package_limits(&mut *conn, subscription.package_id).await?;
    let usage = subscriptions::get_usage(&mut *conn, subscription.id).await?;

    let current = usage
        .iter()
        .find(|row| row.resource_type == resource)
        .map(|row| row.current_usage)
        .unwrap_or(0);

    Ok(validate_usage_limit(current, limit_for(&limits, resource), requested))
}

/// Reserve `amount` units inside the caller's transaction.
///
/// The increment is a single conditional `UPDATE`, so two concurrent requests
/// cannot both pass the check and overshoot the cap.
#[tracing::instrument(name = "Consume usage", skip(conn))]
pub async fn consume(
    conn: &mut PgConnection,
    owner_id: Uuid,
    resource: ResourceType,
    amount: i32,
) -> Result<UsageTracking, AppError> {
    let subscription = require_active(conn, owner_id).await?;
    let limits = subscriptions::get_package_limits(&mut *conn, subscription.package_id).await?;
    let limit_value = limit_for(&limits, resource);

    subscriptions::ensure_usage_row(&mut *conn, subscription.id, resource).await?;

    match subscriptions::increment_usage_within_limit(
        &mut *conn,
        subscription.id,
        resource,
        amount,
        limit_value,
    )
    .await?
    {
        Some(usage) => Ok(usage),
        None => {
            tracing::warn!(
                owner_id = %owner_id,
                resource = resource.as_str(),
                limit_value,
                "usage limit reached"
            );
            Err(limit_exceeded(resource))
        }
    }
}

/// Give back `amount` units after a soft delete. Missing subscriptions are ignored.
#[tracing::instrument(name = "Release usage", skip(conn))]
pub async fn release(
    conn: &mut PgConnection,
    owner_id: Uuid,
    resource: ResourceType,
    amount: i32,
) -> Result<(), AppError> {
    if let Some(subscription) = subscriptions::get_active_subscription(&mut *conn, owner_id).await? {
        subscriptions::decrement_usage(&mut *conn, subscription.id, resource, amount).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::staff::StaffRole;
    use chrono::Utc;
    use claim::{assert_err, assert_ok};
    use quickcheck_macros::quickcheck;

    fn limit(resource_type: ResourceType, limit_value: i32) -> PackageLimit {
        PackageLimit {
            id: Uuid::new_v4(),
            package_id: Uuid::nil(),
            resource_type,
            limit_value,
        }
    }

    fn usage(resource_type: ResourceType, current_usage: i32) -> UsageTracking {
        UsageTracking {
            id: Uuid::new_v4(),
            subscription_id: Uuid::nil(),
            resource_type,
            current_usage,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn usage_below_limit_is_allowed() {
        assert!(validate_usage_limit(0, 1, 1));
        assert!(validate_usage_limit(2, 3, 1));
    }

    #[test]
    fn usage_at_limit_is_rejected() {
        assert!(!validate_usage_limit(1, 1, 1));
        assert!(!validate_usage_limit(2, 3, 2));
    }

    #[quickcheck]
    fn unlimited_never_blocks(current: i32, requested: i32) -> bool {
        validate_usage_limit(current, UNLIMITED, requested)
    }

    #[quickcheck]
    fn allowed_usage_never_exceeds_limit(current: u16, limit: u16, requested: u8) -> bool {
        let (current, limit, requested) = (current as i32, limit as i32, requested as i32);
        !validate_usage_limit(current, limit, requested) || current + requested <= limit
    }

    #[test]
    fn missing_limit_means_unlimited() {
        let limits = vec![limit(ResourceType::Clinics, 1)];
        assert_eq!(limit_for(&limits, ResourceType::Clinics), 1);
        assert_eq!(limit_for(&limits, ResourceType::Patients), UNLIMITED);
    }

    #[test]
    fn summary_reports_remaining_quota() {
        let limits = vec![
            limit(ResourceType::Clinics, 3),
            limit(ResourceType::Patients, 100),
            limit(ResourceType::Staff, UNLIMITED),
        ];
        let rows = vec![
            usage(ResourceType::Clinics, 1),
            usage(ResourceType::Patients, 120),
        ];

        let summary = summarize(&limits, &rows);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[0].remaining, Some(2));
        assert_eq!(summary[1].remaining, Some(0));
        assert_eq!(summary[2].remaining, None);
        assert_eq!(summary[3].current_usage, 0);
        assert_eq!(summary[3].limit_value, UNLIMITED);
    }

    async fn owner_on_patient_cap(pool: &PgPool, cap: i32) -> Uuid {
        let package =
            fixtures::insert_package(pool, 30, &[(ResourceType::Patients, cap)], true).await;
        let owner_id = fixtures::insert_staff(pool, None, StaffRole::Owner).await;
        fixtures::subscribe(pool, owner_id, package, false).await;
        owner_id
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn consume_counts_up_to_the_limit_and_no_further(pool: PgPool) {
        let owner_id = owner_on_patient_cap(&pool, 2).await;
        let mut conn = pool.acquire().await.unwrap();

        let first = assert_ok!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_eq!(first.current_usage, 1);
        let second = assert_ok!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_eq!(second.current_usage, 2);

        let error = assert_err!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_eq!(error.code, ErrorCode::UsageLimitExceeded);
        assert!(!check_usage_limit(&pool, owner_id, ResourceType::Patients, 1)
            .await
            .unwrap());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn release_frees_quota_and_never_goes_negative(pool: PgPool) {
        let owner_id = owner_on_patient_cap(&pool, 1).await;
        let mut conn = pool.acquire().await.unwrap();

        assert_ok!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_err!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);

        assert_ok!(release(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_ok!(release(&mut conn, owner_id, ResourceType::Patients, 1).await);
        let subscription = subscriptions::get_active_subscription(&pool, owner_id)
            .await
            .unwrap()
            .unwrap();
        let usage = subscriptions::get_usage(&pool, subscription.id).await.unwrap();
        assert_eq!(usage[0].current_usage, 0);

        let again = assert_ok!(consume(&mut conn, owner_id, ResourceType::Patients, 1).await);
        assert_eq!(again.current_usage, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn undeclared_resource_is_unlimited(pool: PgPool) {
        let owner_id = owner_on_patient_cap(&pool, 1).await;
        let mut conn = pool.acquire().await.unwrap();

        for expected in 1..=5 {
            let usage = assert_ok!(consume(&mut conn, owner_id, ResourceType::Staff, 1).await);
            assert_eq!(usage.current_usage, expected);
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn consume_without_subscription_is_rejected(pool: PgPool) {
        let owner_id = fixtures::insert_staff(&pool, None, StaffRole::Owner).await;
        let mut conn = pool.acquire().await.unwrap();

        let error = assert_err!(consume(&mut conn, owner_id, ResourceType::Clinics, 1).await);
        assert_eq!(error.code, ErrorCode::NoActiveSubscription);
        assert_ok!(release(&mut conn, owner_id, ResourceType::Clinics, 1).await);
    }
}
