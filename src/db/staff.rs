use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{is_unique_violation, like_pattern, AppError, ErrorCode};
use crate::models::pagination::PaginationQuery;
use crate::models::staff::{CreateStaffRequest, Staff, StaffRole, UpdateStaffRequest};

const STAFF_COLUMNS: &str = "id, clinic_id, full_name, email, phone, role, specialization, \
     is_active, is_deleted, created_by, created_at, updated_at, deleted_at";

fn staff_not_found() -> AppError {
    AppError::not_found(ErrorCode::StaffNotFound, "Staff member not found")
}

pub async fn email_exists(executor: impl PgExecutor<'_>, email: &str) -> Result<bool, AppError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM staff WHERE LOWER(email) = LOWER($1) AND is_deleted = FALSE)",
    )
    .bind(email.trim())
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

pub async fn insert_staff(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    created_by: Uuid,
    request: &CreateStaffRequest,
) -> Result<Staff, AppError> {
    let query = format!(
        "INSERT INTO staff (id, clinic_id, full_name, email, phone, role, specialization,
                            is_active, is_deleted, created_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, FALSE, $8, NOW(), NOW())
         RETURNING {}",
        STAFF_COLUMNS
    );

    let staff = sqlx::query_as::<_, Staff>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(request.full_name.trim())
        .bind(request.email.trim().to_lowercase())
        .bind(&request.phone)
        .bind(request.role.as_str())
        .bind(&request.specialization)
        .bind(created_by)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, "staff_email_live_idx") {
                AppError::bad_request(
                    ErrorCode::EmailAlreadyExists,
                    "A staff member with this email already exists",
                )
            } else {
                e.into()
            }
        })?;

    Ok(staff)
}

pub async fn get_staff_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    staff_id: Uuid,
) -> Result<Staff, AppError> {
    let query = format!(
        "SELECT {} FROM staff WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
        STAFF_COLUMNS
    );

    sqlx::query_as::<_, Staff>(&query)
        .bind(staff_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(staff_not_found)
}

/// An active doctor of the clinic. The clinic owner also counts as one.
pub async fn get_doctor(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    doctor_id: Uuid,
) -> Result<Staff, AppError> {
    let query = format!(
        "SELECT {} FROM staff
         WHERE id = $1 AND is_deleted = FALSE AND is_active = TRUE
           AND role IN ('Doctor', 'Owner')
           AND (clinic_id = $2 OR id = (SELECT owner_id FROM clinics WHERE id = $2))",
        STAFF_COLUMNS
    );

    sqlx::query_as::<_, Staff>(&query)
        .bind(doctor_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::not_found(ErrorCode::DoctorNotFound, "Doctor not found"))
}

pub async fn search_staff(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    role: Option<StaffRole>,
    pagination: &PaginationQuery,
) -> Result<Vec<Staff>, AppError> {
    let query = format!(
        "SELECT {} FROM staff
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::VARCHAR IS NULL OR role = $2)
           AND ($3::TEXT IS NULL OR full_name ILIKE $3 OR email ILIKE $3 OR phone ILIKE $3)
         ORDER BY full_name ASC
         LIMIT $4 OFFSET $5",
        STAFF_COLUMNS
    );

    let staff = sqlx::query_as::<_, Staff>(&query)
        .bind(clinic_id)
        .bind(role.map(|r| r.as_str()))
        .bind(pagination.search.as_deref().map(like_pattern))
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(staff)
}

pub async fn count_staff(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    role: Option<StaffRole>,
    search: Option<&str>,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM staff
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::VARCHAR IS NULL OR role = $2)
           AND ($3::TEXT IS NULL OR full_name ILIKE $3 OR email ILIKE $3 OR phone ILIKE $3)",
    )
    .bind(clinic_id)
    .bind(role.map(|r| r.as_str()))
    .bind(search.map(like_pattern))
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn update_staff(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    staff_id: Uuid,
    request: &UpdateStaffRequest,
) -> Result<Staff, AppError> {
    let query = format!(
        "UPDATE staff
         SET full_name = COALESCE($3, full_name),
             phone = COALESCE($4, phone),
             role = COALESCE($5, role),
             specialization = COALESCE($6, specialization),
             is_active = COALESCE($7, is_active),
             updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        STAFF_COLUMNS
    );

    sqlx::query_as::<_, Staff>(&query)
        .bind(staff_id)
        .bind(clinic_id)
        .bind(request.full_name.as_deref().map(str::trim))
        .bind(&request.phone)
        .bind(request.role.map(|r| r.as_str()))
        .bind(&request.specialization)
        .bind(request.is_active)
        .fetch_optional(executor)
        .await?
        .ok_or_else(staff_not_found)
}

pub async fn set_active(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    staff_id: Uuid,
    is_active: bool,
) -> Result<Staff, AppError> {
    let query = format!(
        "UPDATE staff SET is_active = $3, updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        STAFF_COLUMNS
    );

    sqlx::query_as::<_, Staff>(&query)
        .bind(staff_id)
        .bind(clinic_id)
        .bind(is_active)
        .fetch_optional(executor)
        .await?
        .ok_or_else(staff_not_found)
}

pub async fn soft_delete_staff(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    staff_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE staff SET is_deleted = TRUE, is_active = FALSE, deleted_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
    )
    .bind(staff_id)
    .bind(clinic_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(staff_not_found());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use claim::{assert_err, assert_ok};
    use fake::faker::name::en::Name;
    use fake::Fake;
    use sqlx::PgPool;

    fn nurse(email: &str) -> CreateStaffRequest {
        CreateStaffRequest {
            full_name: Name().fake(),
            email: email.to_string(),
            phone: None,
            role: StaffRole::Nurse,
            specialization: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_email_insert_is_a_client_error(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;

        let (clinic_id, owner_id) = (tenant.clinic_id, tenant.owner_id);

        assert_ok!(insert_staff(&pool, clinic_id, owner_id, &nurse("ada@clinic.test")).await);
        let error =
            assert_err!(insert_staff(&pool, clinic_id, owner_id, &nurse(" ADA@clinic.test")).await);
        assert_eq!(error.code, ErrorCode::EmailAlreadyExists);
        assert!(email_exists(&pool, "Ada@Clinic.test").await.unwrap());
    }
}
