use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::prescriptions::{
    Prescription, PrescriptionItem, PrescriptionItemRequest, PrescriptionStatus,
};

const PRESCRIPTION_COLUMNS: &str = "id, clinic_id, patient_id, doctor_id, treatment_history_id, \
     notes, status, dispensed_by, dispensed_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, prescription_id, medicine_id, quantity, dosage, frequency, duration_days, instructions";

fn prescription_not_found() -> AppError {
    AppError::not_found(ErrorCode::PrescriptionNotFound, "Prescription not found")
}

pub async fn insert_prescription(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    treatment_history_id: Option<Uuid>,
    notes: Option<&str>,
) -> Result<Prescription, AppError> {
    let query = format!(
        "INSERT INTO prescriptions (id, clinic_id, patient_id, doctor_id, treatment_history_id,
                                    notes, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'Pending', NOW(), NOW())
         RETURNING {}",
        PRESCRIPTION_COLUMNS
    );

    let prescription = sqlx::query_as::<_, Prescription>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(patient_id)
        .bind(doctor_id)
        .bind(treatment_history_id)
        .bind(notes)
        .fetch_one(executor)
        .await?;

    Ok(prescription)
}

pub async fn insert_item(
    executor: impl PgExecutor<'_>,
    prescription_id: Uuid,
    item: &PrescriptionItemRequest,
) -> Result<PrescriptionItem, AppError> {
    let query = format!(
        "INSERT INTO prescription_items (id, prescription_id, medicine_id, quantity, dosage,
                                         frequency, duration_days, instructions)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {}",
        ITEM_COLUMNS
    );

    let item = sqlx::query_as::<_, PrescriptionItem>(&query)
        .bind(Uuid::new_v4())
        .bind(prescription_id)
        .bind(item.medicine_id)
        .bind(item.quantity)
        .bind(item.dosage.trim())
        .bind(&item.frequency)
        .bind(item.duration_days)
        .bind(&item.instructions)
        .fetch_one(executor)
        .await?;

    Ok(item)
}

pub async fn get_prescription_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    prescription_id: Uuid,
) -> Result<Prescription, AppError> {
    let query = format!(
        "SELECT {} FROM prescriptions WHERE id = $1 AND clinic_id = $2",
        PRESCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Prescription>(&query)
        .bind(prescription_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(prescription_not_found)
}

pub async fn lock_prescription(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    prescription_id: Uuid,
) -> Result<Prescription, AppError> {
    let query = format!(
        "SELECT {} FROM prescriptions WHERE id = $1 AND clinic_id = $2 FOR UPDATE",
        PRESCRIPTION_COLUMNS
    );

    sqlx::query_as::<_, Prescription>(&query)
        .bind(prescription_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(prescription_not_found)
}

pub async fn get_items(
    executor: impl PgExecutor<'_>,
    prescription_id: Uuid,
) -> Result<Vec<PrescriptionItem>, AppError> {
    let query = format!(
        "SELECT {} FROM prescription_items WHERE prescription_id = $1 ORDER BY id",
        ITEM_COLUMNS
    );

    let items = sqlx::query_as::<_, PrescriptionItem>(&query)
        .bind(prescription_id)
        .fetch_all(executor)
        .await?;

    Ok(items)
}

pub async fn get_patient_prescriptions(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
) -> Result<Vec<Prescription>, AppError> {
    let query = format!(
        "SELECT {} FROM prescriptions
         WHERE clinic_id = $1 AND patient_id = $2
         ORDER BY created_at DESC",
        PRESCRIPTION_COLUMNS
    );

    let prescriptions = sqlx::query_as::<_, Prescription>(&query)
        .bind(clinic_id)
        .bind(patient_id)
        .fetch_all(executor)
        .await?;

    Ok(prescriptions)
}

/// Move a pending prescription to `status`. `None` when it was no longer pending.
pub async fn close_pending(
    executor: impl PgExecutor<'_>,
    prescription_id: Uuid,
    status: PrescriptionStatus,
    dispensed_by: Option<Uuid>,
) -> Result<Option<Prescription>, AppError> {
    let query = format!(
        "UPDATE prescriptions
         SET status = $2,
             dispensed_by = $3,
             dispensed_at = CASE WHEN $2 = 'Dispensed' THEN NOW() ELSE NULL END,
             updated_at = NOW()
         WHERE id = $1 AND status = 'Pending'
         RETURNING {}",
        PRESCRIPTION_COLUMNS
    );

    let prescription = sqlx::query_as::<_, Prescription>(&query)
        .bind(prescription_id)
        .bind(status.as_str())
        .bind(dispensed_by)
        .fetch_optional(executor)
        .await?;

    Ok(prescription)
}
