use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::pagination::PaginationQuery;
use crate::models::treatment_history::{
    CreateTreatmentHistoryRequest, TreatmentHistory, UpdateTreatmentHistoryRequest,
};

const HISTORY_COLUMNS: &str = "id, clinic_id, patient_id, doctor_id, appointment_id, visit_date, \
     symptoms, diagnosis, treatment, notes, created_at, updated_at";

fn history_not_found() -> AppError {
    AppError::not_found(
        ErrorCode::TreatmentHistoryNotFound,
        "Treatment history not found",
    )
}

pub async fn insert_history(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    doctor_id: Uuid,
    visit_date: NaiveDate,
    request: &CreateTreatmentHistoryRequest,
) -> Result<TreatmentHistory, AppError> {
    let query = format!(
        "INSERT INTO treatment_histories (id, clinic_id, patient_id, doctor_id, appointment_id,
                                          visit_date, symptoms, diagnosis, treatment, notes,
                                          created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
         RETURNING {}",
        HISTORY_COLUMNS
    );

    let history = sqlx::query_as::<_, TreatmentHistory>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(request.patient_id)
        .bind(doctor_id)
        .bind(request.appointment_id)
        .bind(visit_date)
        .bind(&request.symptoms)
        .bind(request.diagnosis.trim())
        .bind(&request.treatment)
        .bind(&request.notes)
        .fetch_one(executor)
        .await?;

    Ok(history)
}

pub async fn get_history_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    history_id: Uuid,
) -> Result<TreatmentHistory, AppError> {
    let query = format!(
        "SELECT {} FROM treatment_histories WHERE id = $1 AND clinic_id = $2",
        HISTORY_COLUMNS
    );

    sqlx::query_as::<_, TreatmentHistory>(&query)
        .bind(history_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(history_not_found)
}

pub async fn get_patient_history(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    pagination: &PaginationQuery,
) -> Result<Vec<TreatmentHistory>, AppError> {
    let query = format!(
        "SELECT {} FROM treatment_histories
         WHERE clinic_id = $1 AND patient_id = $2
         ORDER BY visit_date DESC, created_at DESC
         LIMIT $3 OFFSET $4",
        HISTORY_COLUMNS
    );

    let history = sqlx::query_as::<_, TreatmentHistory>(&query)
        .bind(clinic_id)
        .bind(patient_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(history)
}

pub async fn count_patient_history(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
) -> Result<i64, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM treatment_histories WHERE clinic_id = $1 AND patient_id = $2",
    )
    .bind(clinic_id)
    .bind(patient_id)
    .fetch_one(executor)
    .await?;

    Ok(total)
}

pub async fn update_history(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    history_id: Uuid,
    request: &UpdateTreatmentHistoryRequest,
) -> Result<TreatmentHistory, AppError> {
    let query = format!(
        "UPDATE treatment_histories
         SET symptoms = COALESCE($3, symptoms),
             diagnosis = COALESCE($4, diagnosis),
             treatment = COALESCE($5, treatment),
             notes = COALESCE($6, notes),
             updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2
         RETURNING {}",
        HISTORY_COLUMNS
    );

    sqlx::query_as::<_, TreatmentHistory>(&query)
        .bind(history_id)
        .bind(clinic_id)
        .bind(&request.symptoms)
        .bind(request.diagnosis.as_deref().map(str::trim))
        .bind(&request.treatment)
        .bind(&request.notes)
        .fetch_optional(executor)
        .await?
        .ok_or_else(history_not_found)
}
