use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{like_pattern, AppError, ErrorCode};
use crate::models::pagination::PaginationQuery;
use crate::models::patients::{CreatePatientRequest, Patient, UpdatePatientRequest};

const PATIENT_COLUMNS: &str = "id, clinic_id, patient_code, full_name, date_of_birth, gender, \
     phone, email, address, blood_type, allergies, emergency_contact_name, \
     emergency_contact_phone, is_deleted, created_by, created_at, updated_at, deleted_at";

fn patient_not_found() -> AppError {
    AppError::not_found(ErrorCode::PatientNotFound, "Patient not found")
}

pub async fn insert_patient(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_code: &str,
    created_by: Uuid,
    request: &CreatePatientRequest,
) -> Result<Patient, AppError> {
    let query = format!(
        "INSERT INTO patients (id, clinic_id, patient_code, full_name, date_of_birth, gender, phone,
                               email, address, blood_type, allergies, emergency_contact_name,
                               emergency_contact_phone, is_deleted, created_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, FALSE, $14, NOW(), NOW())
         RETURNING {}",
        PATIENT_COLUMNS
    );

    let patient = sqlx::query_as::<_, Patient>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(patient_code)
        .bind(request.full_name.trim())
        .bind(request.date_of_birth)
        .bind(request.gender.map(|g| g.as_str()))
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.address)
        .bind(&request.blood_type)
        .bind(&request.allergies)
        .bind(&request.emergency_contact_name)
        .bind(&request.emergency_contact_phone)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

    Ok(patient)
}

pub async fn get_patient_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
) -> Result<Patient, AppError> {
    let query = format!(
        "SELECT {} FROM patients WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
        PATIENT_COLUMNS
    );

    sqlx::query_as::<_, Patient>(&query)
        .bind(patient_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(patient_not_found)
}

// Search matches name, phone or patient code
pub async fn search_patients(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    pagination: &PaginationQuery,
) -> Result<Vec<Patient>, AppError> {
    let query = format!(
        "SELECT {} FROM patients
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::TEXT IS NULL OR full_name ILIKE $2 OR phone ILIKE $2 OR patient_code ILIKE $2)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
        PATIENT_COLUMNS
    );

    let patients = sqlx::query_as::<_, Patient>(&query)
        .bind(clinic_id)
        .bind(pagination.search.as_deref().map(like_pattern))
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(patients)
}

pub async fn count_patients(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    search: Option<&str>,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM patients
         WHERE clinic_id = $1 AND is_deleted = FALSE
           AND ($2::TEXT IS NULL OR full_name ILIKE $2 OR phone ILIKE $2 OR patient_code ILIKE $2)",
    )
    .bind(clinic_id)
    .bind(search.map(like_pattern))
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn update_patient(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    request: &UpdatePatientRequest,
) -> Result<Patient, AppError> {
    let query = format!(
        "UPDATE patients
         SET full_name = COALESCE($3, full_name),
             date_of_birth = COALESCE($4, date_of_birth),
             gender = COALESCE($5, gender),
             phone = COALESCE($6, phone),
             email = COALESCE($7, email),
             address = COALESCE($8, address),
             blood_type = COALESCE($9, blood_type),
             allergies = COALESCE($10, allergies),
             emergency_contact_name = COALESCE($11, emergency_contact_name),
             emergency_contact_phone = COALESCE($12, emergency_contact_phone),
             updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        PATIENT_COLUMNS
    );

    sqlx::query_as::<_, Patient>(&query)
        .bind(patient_id)
        .bind(clinic_id)
        .bind(request.full_name.as_deref().map(str::trim))
        .bind(request.date_of_birth)
        .bind(request.gender.map(|g| g.as_str()))
        .bind(&request.phone)
        .bind(&request.email)
        .bind(&request.address)
        .bind(&request.blood_type)
        .bind(&request.allergies)
        .bind(&request.emergency_contact_name)
        .bind(&request.emergency_contact_phone)
        .fetch_optional(executor)
        .await?
        .ok_or_else(patient_not_found)
}

pub async fn soft_delete_patient(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE patients SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
    )
    .bind(patient_id)
    .bind(clinic_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(patient_not_found());
    }
    Ok(())
}
