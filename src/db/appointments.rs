use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::appointments::{
    Appointment, AppointmentDetails, AppointmentQuery, AppointmentStatus,
};
use crate::models::pagination::PaginationQuery;

const APPOINTMENT_COLUMNS: &str = "id, clinic_id, patient_id, doctor_id, start_time, \
     duration_minutes, reason, notes, status, is_deleted, created_by, created_at, updated_at, \
     deleted_at";

const DETAILS_SELECT: &str = "SELECT a.id, a.patient_id, p.full_name AS patient_name, a.doctor_id,
            s.full_name AS doctor_name, a.start_time, a.duration_minutes, a.reason, a.status
     FROM appointments a
     JOIN patients p ON p.id = a.patient_id
     JOIN staff s ON s.id = a.doctor_id";

const LIST_FILTER: &str = "WHERE a.clinic_id = $1 AND a.is_deleted = FALSE
       AND ($2::TIMESTAMPTZ IS NULL OR a.start_time >= $2)
       AND ($3::TIMESTAMPTZ IS NULL OR a.start_time < $3)
       AND ($4::UUID IS NULL OR a.doctor_id = $4)
       AND ($5::UUID IS NULL OR a.patient_id = $5)
       AND ($6::VARCHAR IS NULL OR a.status = $6)";

pub fn appointment_not_found() -> AppError {
    AppError::not_found(ErrorCode::AppointmentNotFound, "Appointment not found")
}

/// Take a row lock on the doctor so bookings for one doctor are serialized
/// until the surrounding transaction ends.
pub async fn lock_doctor_schedule(
    executor: impl PgExecutor<'_>,
    doctor_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("SELECT id FROM staff WHERE id = $1 FOR UPDATE")
        .bind(doctor_id)
        .fetch_optional(executor)
        .await?;
    Ok(())
}

/// Live appointments of a doctor that touch `[from, to)`.
pub async fn get_doctor_appointments_between(
    executor: impl PgExecutor<'_>,
    doctor_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Appointment>, AppError> {
    let query = format!(
        "SELECT {} FROM appointments
         WHERE doctor_id = $1 AND is_deleted = FALSE
           AND status NOT IN ('Cancelled', 'NoShow')
           AND start_time < $3
           AND start_time + duration_minutes * INTERVAL '1 minute' > $2
         ORDER BY start_time ASC",
        APPOINTMENT_COLUMNS
    );

    let appointments = sqlx::query_as::<_, Appointment>(&query)
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

    Ok(appointments)
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_appointment(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    doctor_id: Uuid,
    start_time: DateTime<Utc>,
    duration_minutes: i32,
    reason: Option<&str>,
    notes: Option<&str>,
    created_by: Uuid,
) -> Result<Appointment, AppError> {
    let query = format!(
        "INSERT INTO appointments (id, clinic_id, patient_id, doctor_id, start_time, duration_minutes,
                                   reason, notes, status, is_deleted, created_by, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'Scheduled', FALSE, $9, NOW(), NOW())
         RETURNING {}",
        APPOINTMENT_COLUMNS
    );

    let appointment = sqlx::query_as::<_, Appointment>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(patient_id)
        .bind(doctor_id)
        .bind(start_time)
        .bind(duration_minutes)
        .bind(reason)
        .bind(notes)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

    Ok(appointment)
}

pub async fn get_appointment_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    appointment_id: Uuid,
) -> Result<Appointment, AppError> {
    let query = format!(
        "SELECT {} FROM appointments WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
        APPOINTMENT_COLUMNS
    );

    sqlx::query_as::<_, Appointment>(&query)
        .bind(appointment_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(appointment_not_found)
}

pub async fn list_appointments(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    filter: &AppointmentQuery,
    pagination: &PaginationQuery,
) -> Result<Vec<AppointmentDetails>, AppError> {
    let query = format!(
        "{} {} ORDER BY a.start_time ASC LIMIT $7 OFFSET $8",
        DETAILS_SELECT, LIST_FILTER
    );

    let appointments = sqlx::query_as::<_, AppointmentDetails>(&query)
        .bind(clinic_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.doctor_id)
        .bind(filter.patient_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(executor)
        .await?;

    Ok(appointments)
}

pub async fn count_appointments(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    filter: &AppointmentQuery,
) -> Result<i64, AppError> {
    let query = format!("SELECT COUNT(*) FROM appointments a {}", LIST_FILTER);

    let total: i64 = sqlx::query_scalar(&query)
        .bind(clinic_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.doctor_id)
        .bind(filter.patient_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_one(executor)
        .await?;

    Ok(total)
}

pub async fn get_appointment_details(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    appointment_id: Uuid,
) -> Result<AppointmentDetails, AppError> {
    let query = format!(
        "{} WHERE a.id = $1 AND a.clinic_id = $2 AND a.is_deleted = FALSE",
        DETAILS_SELECT
    );

    sqlx::query_as::<_, AppointmentDetails>(&query)
        .bind(appointment_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(appointment_not_found)
}

/// Overwrite schedule fields with already-merged values.
pub async fn update_appointment(
    executor: impl PgExecutor<'_>,
    appointment: &Appointment,
) -> Result<Appointment, AppError> {
    let query = format!(
        "UPDATE appointments
         SET doctor_id = $3, start_time = $4, duration_minutes = $5, reason = $6, notes = $7,
             updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        APPOINTMENT_COLUMNS
    );

    sqlx::query_as::<_, Appointment>(&query)
        .bind(appointment.id)
        .bind(appointment.clinic_id)
        .bind(appointment.doctor_id)
        .bind(appointment.start_time)
        .bind(appointment.duration_minutes)
        .bind(&appointment.reason)
        .bind(&appointment.notes)
        .fetch_optional(executor)
        .await?
        .ok_or_else(appointment_not_found)
}

pub async fn update_status(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, AppError> {
    let query = format!(
        "UPDATE appointments SET status = $3, updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE
         RETURNING {}",
        APPOINTMENT_COLUMNS
    );

    sqlx::query_as::<_, Appointment>(&query)
        .bind(appointment_id)
        .bind(clinic_id)
        .bind(status.as_str())
        .fetch_optional(executor)
        .await?
        .ok_or_else(appointment_not_found)
}

pub async fn soft_delete_appointment(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    appointment_id: Uuid,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE appointments SET is_deleted = TRUE, deleted_at = NOW(), updated_at = NOW()
         WHERE id = $1 AND clinic_id = $2 AND is_deleted = FALSE",
    )
    .bind(appointment_id)
    .bind(clinic_id)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(appointment_not_found());
    }
    Ok(())
}
