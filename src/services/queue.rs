use chrono::{NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::db::{patients, queue, staff};
use crate::models::queue::{CheckInRequest, QueueEntry, QueuePosition, QueueStatus};

pub fn estimate_wait_minutes(patients_ahead: i64, minutes_per_patient: i64) -> i64 {
    patients_ahead.max(0) * minutes_per_patient
}

/// Number of waiting entries with a lower queue number than `entry`.
pub fn patients_ahead(entry: &QueueEntry, queue: &[QueueEntry]) -> i64 {
    if entry.status != QueueStatus::Waiting {
        return 0;
    }
    queue
        .iter()
        .filter(|other| {
            other.status == QueueStatus::Waiting && other.queue_number < entry.queue_number
        })
        .count() as i64
}

/// Annotate a day's queue with positions, ordered by queue number.
pub fn with_positions(mut queue: Vec<QueueEntry>, minutes_per_patient: i64) -> Vec<QueuePosition> {
    queue.sort_by_key(|entry| entry.queue_number);
    queue
        .iter()
        .map(|entry| {
            let ahead = patients_ahead(entry, &queue);
            QueuePosition {
                entry: entry.clone(),
                patients_ahead: ahead,
                estimated_wait_minutes: estimate_wait_minutes(ahead, minutes_per_patient),
            }
        })
        .collect()
}

fn invalid_transition(from: QueueStatus, to: QueueStatus) -> AppError {
    AppError::bad_request(
        ErrorCode::InvalidStatusTransition,
        format!("Cannot move queue entry from {} to {}", from, to),
    )
}

pub fn can_transition(from: QueueStatus, to: QueueStatus) -> bool {
    use QueueStatus::*;
    matches!(
        (from, to),
        (Waiting, InProgress)
            | (Waiting, Skipped)
            | (Waiting, Cancelled)
            | (InProgress, Completed)
            | (InProgress, Cancelled)
    )
}

/// Put a patient at the back of today's queue.
#[tracing::instrument(name = "Queue check-in", skip(pool))]
pub async fn check_in(
    pool: &PgPool,
    clinic_id: Uuid,
    request: &CheckInRequest,
    minutes_per_patient: i64,
) -> Result<QueuePosition, AppError> {
    let today = Utc::now().date_naive();
    let mut tx = pool.begin().await?;

    patients::get_patient_by_id(&mut *tx, clinic_id, request.patient_id).await?;
    if let Some(doctor_id) = request.doctor_id {
        staff::get_doctor(&mut *tx, clinic_id, doctor_id).await?;
    }

    queue::lock_queue_day(&mut *tx, clinic_id, today).await?;
    let entry =
        queue::insert_entry(&mut *tx, clinic_id, request.patient_id, request.doctor_id, today)
            .await?;
    let day = queue::get_day_queue(&mut *tx, clinic_id, today, None).await?;
    tx.commit().await?;

    let ahead = patients_ahead(&entry, &day);
    Ok(QueuePosition {
        entry,
        patients_ahead: ahead,
        estimated_wait_minutes: estimate_wait_minutes(ahead, minutes_per_patient),
    })
}

pub async fn day_queue(
    pool: &PgPool,
    clinic_id: Uuid,
    date: NaiveDate,
    doctor_id: Option<Uuid>,
    minutes_per_patient: i64,
) -> Result<Vec<QueuePosition>, AppError> {
    let entries = queue::get_day_queue(pool, clinic_id, date, doctor_id).await?;
    Ok(with_positions(entries, minutes_per_patient))
}

pub async fn position(
    pool: &PgPool,
    clinic_id: Uuid,
    entry_id: Uuid,
    minutes_per_patient: i64,
) -> Result<QueuePosition, AppError> {
    let entry = queue::get_entry_by_id(pool, clinic_id, entry_id).await?;
    let day = queue::get_day_queue(pool, clinic_id, entry.queue_date, None).await?;
    let ahead = patients_ahead(&entry, &day);

    Ok(QueuePosition {
        entry,
        patients_ahead: ahead,
        estimated_wait_minutes: estimate_wait_minutes(ahead, minutes_per_patient),
    })
}

/// Move the lowest waiting number to `InProgress`.
#[tracing::instrument(name = "Call next patient", skip(pool))]
pub async fn call_next(
    pool: &PgPool,
    clinic_id: Uuid,
    doctor_id: Option<Uuid>,
) -> Result<QueueEntry, AppError> {
    let today = Utc::now().date_naive();
    let mut tx = pool.begin().await?;

    let next = queue::lock_next_waiting(&mut *tx, clinic_id, today, doctor_id)
        .await?
        .ok_or_else(|| AppError::bad_request(ErrorCode::QueueEmpty, "No patients are waiting"))?;
    let entry = queue::update_status(
        &mut *tx,
        clinic_id,
        next.id,
        QueueStatus::Waiting,
        QueueStatus::InProgress,
        doctor_id,
    )
    .await?
    .ok_or_else(|| invalid_transition(next.status, QueueStatus::InProgress))?;

    tx.commit().await?;
    Ok(entry)
}

#[tracing::instrument(name = "Update queue entry", skip(pool))]
pub async fn transition(
    pool: &PgPool,
    clinic_id: Uuid,
    entry_id: Uuid,
    status: QueueStatus,
) -> Result<QueueEntry, AppError> {
    let entry = queue::get_entry_by_id(pool, clinic_id, entry_id).await?;
    if !can_transition(entry.status, status) {
        return Err(invalid_transition(entry.status, status));
    }

    // Someone else may have moved the entry since it was read.
    queue::update_status(pool, clinic_id, entry.id, entry.status, status, None)
        .await?
        .ok_or_else(|| invalid_transition(entry.status, status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use claim::{assert_err, assert_none, assert_ok};

    fn entry(queue_number: i32, status: QueueStatus) -> QueueEntry {
        QueueEntry {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            doctor_id: None,
            queue_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            queue_number,
            status,
            checked_in_at: Utc::now(),
            called_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn wait_is_linear_in_patients_ahead() {
        assert_eq!(estimate_wait_minutes(0, 15), 0);
        assert_eq!(estimate_wait_minutes(3, 15), 45);
    }

    #[test]
    fn only_waiting_patients_count_as_ahead() {
        let queue = vec![
            entry(3, QueueStatus::Waiting),
            entry(1, QueueStatus::Completed),
            entry(2, QueueStatus::InProgress),
            entry(4, QueueStatus::Waiting),
            entry(5, QueueStatus::Waiting),
        ];

        let positions = with_positions(queue, 15);
        let numbers: Vec<_> = positions.iter().map(|p| p.entry.queue_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let ahead: Vec<_> = positions.iter().map(|p| p.patients_ahead).collect();
        assert_eq!(ahead, vec![0, 0, 0, 1, 2]);
        assert_eq!(positions[4].estimated_wait_minutes, 30);
    }

    #[test]
    fn finished_entries_stay_finished() {
        assert!(can_transition(QueueStatus::Waiting, QueueStatus::InProgress));
        assert!(can_transition(QueueStatus::InProgress, QueueStatus::Completed));
        assert!(!can_transition(QueueStatus::Completed, QueueStatus::Waiting));
        assert!(!can_transition(QueueStatus::Skipped, QueueStatus::InProgress));
        assert!(!can_transition(QueueStatus::Waiting, QueueStatus::Completed));
    }

    async fn check_in_patient(pool: &PgPool, clinic_id: Uuid, patient_id: Uuid) -> QueuePosition {
        let request = CheckInRequest {
            patient_id,
            doctor_id: None,
        };
        check_in(pool, clinic_id, &request, 15)
            .await
            .expect("Failed to check in")
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn check_ins_are_numbered_in_arrival_order(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let second_patient = fixtures::insert_patient(&pool, tenant.clinic_id).await;

        let first = check_in_patient(&pool, tenant.clinic_id, tenant.patient_id).await;
        let second = check_in_patient(&pool, tenant.clinic_id, second_patient).await;
        assert_eq!(first.entry.queue_number, 1);
        assert_eq!(second.entry.queue_number, 2);
        assert_eq!(second.patients_ahead, 1);
        assert_eq!(second.estimated_wait_minutes, 15);

        let other = fixtures::seed_tenant(&pool).await;
        let elsewhere = check_in_patient(&pool, other.clinic_id, other.patient_id).await;
        assert_eq!(elsewhere.entry.queue_number, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn call_next_takes_the_lowest_waiting_number(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let second_patient = fixtures::insert_patient(&pool, tenant.clinic_id).await;
        let first = check_in_patient(&pool, tenant.clinic_id, tenant.patient_id).await;
        check_in_patient(&pool, tenant.clinic_id, second_patient).await;

        let called = assert_ok!(call_next(&pool, tenant.clinic_id, Some(tenant.doctor_id)).await);
        assert_eq!(called.id, first.entry.id);
        assert_eq!(called.status, QueueStatus::InProgress);
        assert_eq!(called.doctor_id, Some(tenant.doctor_id));

        assert_ok!(call_next(&pool, tenant.clinic_id, None).await);
        let error = assert_err!(call_next(&pool, tenant.clinic_id, None).await);
        assert_eq!(error.code, ErrorCode::QueueEmpty);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn stale_transition_does_not_overwrite_a_newer_status(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let waiting = check_in_patient(&pool, tenant.clinic_id, tenant.patient_id).await.entry;

        // The entry was read as Waiting, then called before the skip lands.
        assert_ok!(call_next(&pool, tenant.clinic_id, None).await);
        let stale = queue::update_status(
            &pool,
            tenant.clinic_id,
            waiting.id,
            waiting.status,
            QueueStatus::Skipped,
            None,
        )
        .await
        .unwrap();
        assert_none!(stale);

        let current = queue::get_entry_by_id(&pool, tenant.clinic_id, waiting.id).await.unwrap();
        assert_eq!(current.status, QueueStatus::InProgress);

        let error = assert_err!(
            transition(&pool, tenant.clinic_id, waiting.id, QueueStatus::Skipped).await
        );
        assert_eq!(error.code, ErrorCode::InvalidStatusTransition);
        let done = assert_ok!(
            transition(&pool, tenant.clinic_id, waiting.id, QueueStatus::Completed).await
        );
        assert_eq!(done.status, QueueStatus::Completed);
        assert!(done.completed_at.is_some());
    }
}
