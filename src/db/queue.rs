use chrono::NaiveDate;
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::queue::{QueueEntry, QueueStatus};

const ENTRY_COLUMNS: &str = "id, clinic_id, patient_id, doctor_id, queue_date, queue_number, \
     status, checked_in_at, called_at, completed_at";

fn entry_not_found() -> AppError {
    AppError::not_found(ErrorCode::QueueEntryNotFound, "Queue entry not found")
}

/// Serialize check-ins for one clinic and day until the transaction ends.
pub async fn lock_queue_day(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    queue_date: NaiveDate,
) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::TEXT || ':' || $2::TEXT, 0))")
        .bind(clinic_id)
        .bind(queue_date)
        .execute(executor)
        .await?;
    Ok(())
}

/// Insert with the next queue number of the day (max + 1).
pub async fn insert_entry(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    patient_id: Uuid,
    doctor_id: Option<Uuid>,
    queue_date: NaiveDate,
) -> Result<QueueEntry, AppError> {
    let query = format!(
        "INSERT INTO queue_entries (id, clinic_id, patient_id, doctor_id, queue_date, queue_number,
                                    status, checked_in_at)
         SELECT $1, $2, $3, $4, $5, COALESCE(MAX(queue_number), 0) + 1, 'Waiting', NOW()
         FROM queue_entries
         WHERE clinic_id = $2 AND queue_date = $5
         RETURNING {}",
        ENTRY_COLUMNS
    );

    let entry = sqlx::query_as::<_, QueueEntry>(&query)
        .bind(Uuid::new_v4())
        .bind(clinic_id)
        .bind(patient_id)
        .bind(doctor_id)
        .bind(queue_date)
        .fetch_one(executor)
        .await?;

    Ok(entry)
}

pub async fn get_entry_by_id(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    entry_id: Uuid,
) -> Result<QueueEntry, AppError> {
    let query = format!(
        "SELECT {} FROM queue_entries WHERE id = $1 AND clinic_id = $2",
        ENTRY_COLUMNS
    );

    sqlx::query_as::<_, QueueEntry>(&query)
        .bind(entry_id)
        .bind(clinic_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(entry_not_found)
}

pub async fn get_day_queue(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    queue_date: NaiveDate,
    doctor_id: Option<Uuid>,
) -> Result<Vec<QueueEntry>, AppError> {
    let query = format!(
        "SELECT {} FROM queue_entries
         WHERE clinic_id = $1 AND queue_date = $2
           AND ($3::UUID IS NULL OR doctor_id = $3 OR doctor_id IS NULL)
         ORDER BY queue_number ASC",
        ENTRY_COLUMNS
    );

    let entries = sqlx::query_as::<_, QueueEntry>(&query)
        .bind(clinic_id)
        .bind(queue_date)
        .bind(doctor_id)
        .fetch_all(executor)
        .await?;

    Ok(entries)
}

/// Lowest waiting entry, locked so two callers never take the same patient.
pub async fn lock_next_waiting(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    queue_date: NaiveDate,
    doctor_id: Option<Uuid>,
) -> Result<Option<QueueEntry>, AppError> {
    let query = format!(
        "SELECT {} FROM queue_entries
         WHERE clinic_id = $1 AND queue_date = $2 AND status = 'Waiting'
           AND ($3::UUID IS NULL OR doctor_id = $3 OR doctor_id IS NULL)
         ORDER BY queue_number ASC
         LIMIT 1
         FOR UPDATE SKIP LOCKED",
        ENTRY_COLUMNS
    );

    let entry = sqlx::query_as::<_, QueueEntry>(&query)
        .bind(clinic_id)
        .bind(queue_date)
        .bind(doctor_id)
        .fetch_optional(executor)
        .await?;

    Ok(entry)
}

/// Move an entry out of `from`, stamping `called_at` / `completed_at` as it moves on.
/// `None` when the entry is no longer in `from`.
pub async fn update_status(
    executor: impl PgExecutor<'_>,
    clinic_id: Uuid,
    entry_id: Uuid,
    from: QueueStatus,
    status: QueueStatus,
    doctor_id: Option<Uuid>,
) -> Result<Option<QueueEntry>, AppError> {
    let query = format!(
        "UPDATE queue_entries
         SET status = $3,
             doctor_id = COALESCE($4, doctor_id),
             called_at = CASE WHEN $3 = 'InProgress' THEN NOW() ELSE called_at END,
             completed_at = CASE WHEN $3 IN ('Completed', 'Skipped', 'Cancelled') THEN NOW()
                                 ELSE completed_at END
         WHERE id = $1 AND clinic_id = $2 AND status = $5
         RETURNING {}",
        ENTRY_COLUMNS
    );

    let entry = sqlx::query_as::<_, QueueEntry>(&query)
        .bind(entry_id)
        .bind(clinic_id)
        .bind(status.as_str())
        .bind(doctor_id)
        .bind(from.as_str())
        .fetch_optional(executor)
        .await?;

    Ok(entry)
}
