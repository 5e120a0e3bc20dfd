use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::common::string_enum;

string_enum!(SubscriptionStatus {
    Active,
    Cancelled,
    Upgraded,
    Expired,
});

string_enum!(
    /// Quota-counted resource kinds.
    ResourceType {
        Clinics,
        Patients,
        Staff,
        Appointments,
    }
);

/// `limit_value` of a package limit meaning "no cap".
pub const UNLIMITED: i32 = -1;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct SubscriptionPackage {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: BigDecimal,
    pub duration_in_days: i32,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, PartialEq)]
pub struct PackageLimit {
    pub id: Uuid,
    pub package_id: Uuid,
    pub resource_type: ResourceType,
    pub limit_value: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PackageWithLimits {
    #[serde(flatten)]
    pub package: SubscriptionPackage,
    pub limits: Vec<PackageLimit>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: SubscriptionStatus,
    pub is_active: bool,
    pub auto_renew: bool,
    pub previous_subscription_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, PartialEq)]
pub struct UsageTracking {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub resource_type: ResourceType,
    pub current_usage: i32,
    pub updated_at: DateTime<Utc>,
}

/// Usage of one resource against its package cap.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct UsageSummary {
    pub resource_type: ResourceType,
    pub current_usage: i32,
    pub limit_value: i32,
    /// `None` when the resource is unlimited.
    pub remaining: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionDetails {
    pub subscription: Subscription,
    pub package: SubscriptionPackage,
    pub usage: Vec<UsageSummary>,
    pub days_remaining: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub package_id: Uuid,
    #[serde(default)]
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeRequest {
    pub package_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AutoRenewRequest {
    pub auto_renew: bool,
}

#[derive(Debug, Deserialize)]
pub struct UsageCheckQuery {
    pub resource_type: ResourceType,
    pub requested: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UsageCheckResponse {
    pub resource_type: ResourceType,
    pub allowed: bool,
}

#[derive(Debug, Default, Serialize)]
pub struct ExpiryRunSummary {
    pub renewed: u64,
    pub expired: u64,
    pub failed: u64,
}
