use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::core::{AppError, ClinicContext, ErrorCode};
use crate::models::clinics::{Clinic, CreateClinicRequest, UpdateClinicRequest};

const CLINIC_COLUMNS: &str = "id, owner_id, name, address, phone, email, is_active, is_deleted, \
     created_at, updated_at, deleted_at";

fn clinic_not_found() -> AppError {
    AppError::not_found(ErrorCode::ClinicNotFound, "Clinic not found")
}

pub async fn create_clinic(
    executor: impl PgExecutor<'_>,
    owner_id: Uuid,
    request: &CreateClinicRequest,
) -> Result<Clinic, AppError> {
    let query = format!(
        "INSERT INTO clinics (id, owner_id, name, address, phone, email, is_active, is_deleted,
                              created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE, FALSE, NOW(), NOW())
         RETURNING {}",
        CLINIC_COLUMNS
    );

    let clinic = sqlx::query_as::<_, Clinic>(&query)
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&request.name)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .fetch_one(executor)
        .await?;

    Ok(clinic)
}

pub async fn get_clinic_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
) -> Result<Clinic, AppError> {
    let query = format!(
        "SELECT {} FROM clinics WHERE id = $1 AND is_deleted = FALSE",
        CLINIC_COLUMNS
    );

    sqlx::query_as::<_, Clinic>(&query)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(clinic_not_found)
}

pub async fn get_owned_clinics(
    executor: impl PgExecutor<'_>,
    owner_id: Uuid,
) -> Result<Vec<Clinic>, AppError> {
    let query = format!(
        "SELECT {} FROM clinics WHERE owner_id = $1 AND is_deleted = FALSE ORDER BY created_at ASC",
        CLINIC_COLUMNS
    );

    let clinics = sqlx::query_as::<_, Clinic>(&query)
        .bind(owner_id)
        .fetch_all(executor)
        .await?;

    Ok(clinics)
}

/// Resolve the request's clinic and check the caller may act on it.
///
/// Owners must own the clinic; other staff are trusted to the clinic in their token
/// but the clinic must still exist and be active.
pub async fn ensure_clinic_access(pool: &PgPool, ctx: &ClinicContext) -> Result<Clinic, AppError> {
    let clinic_id = ctx.require_clinic()?;
    let clinic = get_clinic_by_id(pool, clinic_id).await?;

    if ctx.is_owner() {
        if clinic.owner_id != ctx.user_id {
            return Err(AppError::forbidden_error("You do not own this clinic"));
        }
    } else if !clinic.is_active {
        return Err(AppError::forbidden_error("This clinic is inactive"));
    }

    Ok(clinic)
}

pub async fn update_clinic(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    request: &UpdateClinicRequest,
) -> Result<Clinic, AppError> {
    let query = format!(
        "UPDATE clinics
         SET name = COALESCE($2, name),
             address = COALESCE($3, address),
             phone = COALESCE($4, phone),
             email = COALESCE($5, email),
             is_active = COALESCE($6, is_active),
             updated_at = NOW()
         WHERE id = $1 AND is_deleted = FALSE
         RETURNING {}",
        CLINIC_COLUMNS
    );

    sqlx::query_as::<_, Clinic>(&query)
        .bind(clinic_id)
        .bind(&request.name)
        .bind(&request.address)
        .bind(&request.phone)
        .bind(&request.email)
        .bind(request.is_active)
        .fetch_optional(executor)
        .await?
        .ok_or_else(clinic_not_found)
}

pub async fn soft_delete_clinic(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE clinics SET is_deleted = TRUE, is_active = FALSE, deleted_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND is_deleted = FALSE",
    )
    .bind(clinic_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(clinic_not_found());
    }
    Ok(())
}
