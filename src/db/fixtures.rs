//! Rows seeded straight into Postgres for `#[sqlx::test]` cases.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use fake::faker::name::en::Name;
use fake::Fake;
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::ClinicContext;
use crate::models::staff::StaffRole;
use crate::models::subscriptions::{ResourceType, SubscribeRequest, Subscription};
use crate::services::subscriptions;

pub const STARTER: Uuid = Uuid::from_u128(1);
pub const PROFESSIONAL: Uuid = Uuid::from_u128(2);

/// One clinic with its owner, a doctor and a patient.
pub struct Tenant {
    pub owner_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
}

impl Tenant {
    pub fn owner_context(&self) -> ClinicContext {
        ClinicContext {
            user_id: self.owner_id,
            clinic_id: Some(self.clinic_id),
            role: StaffRole::Owner,
            email: "owner@clinic.test".to_string(),
        }
    }
}

pub async fn insert_staff(pool: &PgPool, clinic_id: Option<Uuid>, role: StaffRole) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO staff (id, clinic_id, full_name, email, role) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(clinic_id)
    .bind(Name().fake::<String>())
    .bind(format!("{}@clinic.test", id.simple()))
    .bind(role.as_str())
    .execute(pool)
    .await
    .expect("Failed to insert staff");
    id
}

pub async fn insert_clinic(pool: &PgPool, owner_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO clinics (id, owner_id, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(owner_id)
        .bind(format!("Clinic {}", id.simple()))
        .execute(pool)
        .await
        .expect("Failed to insert clinic");
    id
}

pub async fn insert_patient(pool: &PgPool, clinic_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO patients (id, clinic_id, patient_code, full_name) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(clinic_id)
    .bind(format!("P-{}", &id.simple().to_string()[..8]))
    .bind(Name().fake::<String>())
    .execute(pool)
    .await
    .expect("Failed to insert patient");
    id
}

/// A package with the given limits; retired packages have `is_active = FALSE`.
pub async fn insert_package(
    pool: &PgPool,
    duration_in_days: i32,
    limits: &[(ResourceType, i32)],
    is_active: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO subscription_packages (id, name, price, duration_in_days, is_active)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(format!("Plan {}", id.simple()))
    .bind(BigDecimal::from(10))
    .bind(duration_in_days)
    .bind(is_active)
    .execute(pool)
    .await
    .expect("Failed to insert package");

    for (resource_type, limit_value) in limits {
        sqlx::query(
            "INSERT INTO package_limits (id, package_id, resource_type, limit_value)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(resource_type.as_str())
        .bind(limit_value)
        .execute(pool)
        .await
        .expect("Failed to insert package limit");
    }
    id
}

pub async fn retire_package(pool: &PgPool, package_id: Uuid) {
    sqlx::query("UPDATE subscription_packages SET is_active = FALSE WHERE id = $1")
        .bind(package_id)
        .execute(pool)
        .await
        .expect("Failed to retire package");
}

pub async fn subscribe(
    pool: &PgPool,
    owner_id: Uuid,
    package_id: Uuid,
    auto_renew: bool,
) -> Subscription {
    subscriptions::subscribe(
        pool,
        owner_id,
        &SubscribeRequest {
            package_id,
            auto_renew,
        },
    )
    .await
    .expect("Failed to subscribe")
}

/// Move a subscription's period so it can be made due.
pub async fn set_period(pool: &PgPool, subscription_id: Uuid, start: NaiveDate, end: NaiveDate) {
    sqlx::query("UPDATE subscriptions SET start_date = $2, end_date = $3 WHERE id = $1")
        .bind(subscription_id)
        .bind(start)
        .bind(end)
        .execute(pool)
        .await
        .expect("Failed to move subscription period");
}

pub async fn set_usage(
    pool: &PgPool,
    subscription_id: Uuid,
    resource_type: ResourceType,
    current_usage: i32,
) {
    sqlx::query(
        "UPDATE usage_tracking SET current_usage = $3
         WHERE subscription_id = $1 AND resource_type = $2",
    )
    .bind(subscription_id)
    .bind(resource_type.as_str())
    .bind(current_usage)
    .execute(pool)
    .await
    .expect("Failed to set usage");
}

/// Owner subscribed to `package_id`, one clinic, one doctor and one patient.
pub async fn seed_tenant_on(pool: &PgPool, package_id: Uuid) -> Tenant {
    let owner_id = insert_staff(pool, None, StaffRole::Owner).await;
    let clinic_id = insert_clinic(pool, owner_id).await;
    let doctor_id = insert_staff(pool, Some(clinic_id), StaffRole::Doctor).await;
    let patient_id = insert_patient(pool, clinic_id).await;
    subscribe(pool, owner_id, package_id, false).await;

    Tenant {
        owner_id,
        clinic_id,
        doctor_id,
        patient_id,
    }
}

pub async fn seed_tenant(pool: &PgPool) -> Tenant {
    seed_tenant_on(pool, STARTER).await
}

pub async fn insert_history(pool: &PgPool, tenant: &Tenant, patient_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO treatment_histories (id, clinic_id, patient_id, doctor_id, visit_date, diagnosis)
         VALUES ($1, $2, $3, $4, CURRENT_DATE, 'Seasonal flu')",
    )
    .bind(id)
    .bind(tenant.clinic_id)
    .bind(patient_id)
    .bind(tenant.doctor_id)
    .execute(pool)
    .await
    .expect("Failed to insert treatment history");
    id
}

pub async fn insert_medicine(pool: &PgPool, clinic_id: Uuid) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO medicines (id, clinic_id, name, unit, unit_price)
         VALUES ($1, $2, 'Amoxicillin 500mg', 'capsule', 0.50)",
    )
    .bind(id)
    .bind(clinic_id)
    .execute(pool)
    .await
    .expect("Failed to insert medicine");
    id
}

pub async fn insert_batch(
    pool: &PgPool,
    clinic_id: Uuid,
    medicine_id: Uuid,
    quantity: i32,
    expiry_date: NaiveDate,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO inventory_batches (id, clinic_id, medicine_id, batch_number, quantity,
                                        cost_price, received_date, expiry_date)
         VALUES ($1, $2, $3, $4, $5, 0.20, CURRENT_DATE, $6)",
    )
    .bind(id)
    .bind(clinic_id)
    .bind(medicine_id)
    .bind(format!("LOT-{}", &id.simple().to_string()[..6]))
    .bind(quantity)
    .bind(expiry_date)
    .execute(pool)
    .await
    .expect("Failed to insert batch");
    id
}

pub async fn batch_quantity(pool: &PgPool, batch_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT quantity FROM inventory_batches WHERE id = $1")
        .bind(batch_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read batch")
}
