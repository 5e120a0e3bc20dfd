use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::core::{AppError, ClinicContext, ErrorCode};
use crate::db::{appointments, clinics, patients, staff};
use crate::models::appointments::{
    Appointment, AppointmentStatus, CreateAppointmentRequest, UpdateAppointmentRequest,
};
use crate::models::notifications::{NewNotification, NotificationKind};
use crate::models::subscriptions::ResourceType;
use crate::services::{notifications, scheduling, usage_limits};

// Longest bookable appointment; bounds the window searched for overlaps.
const MAX_DURATION_MINUTES: i64 = 480;

async fn ensure_doctor_free(
    conn: &mut sqlx::PgConnection,
    doctor_id: Uuid,
    start_time: chrono::DateTime<Utc>,
    duration_minutes: i32,
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    appointments::lock_doctor_schedule(&mut *conn, doctor_id).await?;

    let window_start = start_time - Duration::minutes(MAX_DURATION_MINUTES);
    let window_end = start_time + Duration::minutes(duration_minutes as i64);
    let booked = appointments::get_doctor_appointments_between(
        &mut *conn,
        doctor_id,
        window_start,
        window_end,
    )
    .await?;

    scheduling::ensure_slot_free(start_time, duration_minutes, &booked, exclude)
}

/// Book an appointment: doctor must be free and the owner's quota must allow it.
#[tracing::instrument(name = "Book appointment", skip(pool, ctx, request))]
pub async fn book(
    pool: &PgPool,
    ctx: &ClinicContext,
    request: &CreateAppointmentRequest,
) -> Result<Appointment, AppError> {
    let clinic = clinics::ensure_clinic_access(pool, ctx).await?;
    let mut tx = pool.begin().await?;

    patients::get_patient_by_id(&mut *tx, clinic.id, request.patient_id).await?;
    staff::get_doctor(&mut *tx, clinic.id, request.doctor_id).await?;
    ensure_doctor_free(
        &mut tx,
        request.doctor_id,
        request.start_time,
        request.duration_minutes,
        None,
    )
    .await?;

    usage_limits::consume(&mut tx, clinic.owner_id, ResourceType::Appointments, 1).await?;

    let appointment = appointments::insert_appointment(
        &mut *tx,
        clinic.id,
        request.patient_id,
        request.doctor_id,
        request.start_time,
        request.duration_minutes,
        request.reason.as_deref(),
        request.notes.as_deref(),
        ctx.user_id,
    )
    .await?;

    tx.commit().await?;

    notifications::notify(
        pool,
        NewNotification {
            clinic_id: Some(clinic.id),
            recipient_id: appointment.doctor_id,
            title: "New appointment".to_string(),
            message: format!(
                "Appointment booked for {}",
                appointment.start_time.format("%Y-%m-%d %H:%M UTC")
            ),
            kind: NotificationKind::Appointment,
        },
    )
    .await;

    Ok(appointment)
}

/// Merge the changes and re-check the slot, ignoring the appointment itself.
#[tracing::instrument(name = "Reschedule appointment", skip(pool, request))]
pub async fn reschedule(
    pool: &PgPool,
    clinic_id: Uuid,
    appointment_id: Uuid,
    request: &UpdateAppointmentRequest,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let mut appointment =
        appointments::get_appointment_by_id(&mut *tx, clinic_id, appointment_id).await?;

    if appointment.status.is_terminal() {
        return Err(AppError::bad_request(
            ErrorCode::InvalidStatusTransition,
            format!(
                "A {} appointment cannot be changed",
                appointment.status.as_str().to_lowercase()
            ),
        ));
    }

    let schedule_changed = request.doctor_id.is_some()
        || request.start_time.is_some()
        || request.duration_minutes.is_some();

    if let Some(doctor_id) = request.doctor_id {
        staff::get_doctor(&mut *tx, clinic_id, doctor_id).await?;
        appointment.doctor_id = doctor_id;
    }
    if let Some(start_time) = request.start_time {
        appointment.start_time = start_time;
    }
    if let Some(duration) = request.duration_minutes {
        appointment.duration_minutes = duration;
    }
    if request.reason.is_some() {
        appointment.reason = request.reason.clone();
    }
    if request.notes.is_some() {
        appointment.notes = request.notes.clone();
    }

    if schedule_changed {
        ensure_doctor_free(
            &mut tx,
            appointment.doctor_id,
            appointment.start_time,
            appointment.duration_minutes,
            Some(appointment.id),
        )
        .await?;
    }

    let updated = appointments::update_appointment(&mut *tx, &appointment).await?;
    tx.commit().await?;

    Ok(updated)
}

pub fn ensure_transition(from: AppointmentStatus, to: AppointmentStatus) -> Result<(), AppError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(AppError::bad_request(
            ErrorCode::InvalidStatusTransition,
            format!("Cannot change appointment status from {} to {}", from, to),
        ))
    }
}

#[tracing::instrument(name = "Change appointment status", skip(pool))]
pub async fn change_status(
    pool: &PgPool,
    clinic_id: Uuid,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, AppError> {
    let mut tx = pool.begin().await?;
    let appointment =
        appointments::get_appointment_by_id(&mut *tx, clinic_id, appointment_id).await?;
    ensure_transition(appointment.status, status)?;

    let updated = appointments::update_status(&mut *tx, clinic_id, appointment_id, status).await?;
    tx.commit().await?;

    Ok(updated)
}

/// Soft-delete and hand the appointment back to the owner's quota.
#[tracing::instrument(name = "Delete appointment", skip(pool))]
pub async fn delete(
    pool: &PgPool,
    clinic_id: Uuid,
    owner_id: Uuid,
    appointment_id: Uuid,
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    appointments::soft_delete_appointment(&mut *tx, clinic_id, appointment_id).await?;
    usage_limits::release(&mut tx, owner_id, ResourceType::Appointments, 1).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{fixtures, subscriptions};
    use chrono::{DateTime, TimeZone};
    use claim::{assert_err, assert_ok};

    #[test]
    fn completed_appointment_cannot_be_cancelled() {
        let error = assert_err!(ensure_transition(
            AppointmentStatus::Completed,
            AppointmentStatus::Cancelled
        ));
        assert_eq!(error.code, ErrorCode::InvalidStatusTransition);
    }

    #[test]
    fn check_in_from_confirmed_is_allowed() {
        assert_ok!(ensure_transition(
            AppointmentStatus::Confirmed,
            AppointmentStatus::CheckedIn
        ));
    }

    fn tomorrow_at(hour: u32, minute: u32) -> DateTime<Utc> {
        let date = (Utc::now() + Duration::days(1)).date_naive();
        Utc.from_utc_datetime(&date.and_hms_opt(hour, minute, 0).unwrap())
    }

    fn request(tenant: &fixtures::Tenant, start_time: DateTime<Utc>) -> CreateAppointmentRequest {
        CreateAppointmentRequest {
            patient_id: tenant.patient_id,
            doctor_id: tenant.doctor_id,
            start_time,
            duration_minutes: 30,
            reason: Some("Follow-up".to_string()),
            notes: None,
        }
    }

    async fn appointments_used(pool: &PgPool, owner_id: Uuid) -> i32 {
        let subscription = subscriptions::get_active_subscription(pool, owner_id)
            .await
            .unwrap()
            .unwrap();
        subscriptions::get_usage(pool, subscription.id)
            .await
            .unwrap()
            .into_iter()
            .find(|row| row.resource_type == ResourceType::Appointments)
            .map(|row| row.current_usage)
            .unwrap_or(0)
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn overlapping_booking_for_the_same_doctor_is_refused(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let ctx = tenant.owner_context();

        assert_ok!(book(&pool, &ctx, &request(&tenant, tomorrow_at(9, 0))).await);
        let error = assert_err!(book(&pool, &ctx, &request(&tenant, tomorrow_at(9, 15))).await);
        assert_eq!(error.code, ErrorCode::TimeSlotConflict);

        assert_ok!(book(&pool, &ctx, &request(&tenant, tomorrow_at(9, 30))).await);
        assert_eq!(appointments_used(&pool, tenant.owner_id).await, 2);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn cancelled_slot_can_be_booked_again(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let ctx = tenant.owner_context();

        let first = assert_ok!(book(&pool, &ctx, &request(&tenant, tomorrow_at(11, 0))).await);
        assert_ok!(
            change_status(&pool, tenant.clinic_id, first.id, AppointmentStatus::Cancelled).await
        );
        assert_ok!(book(&pool, &ctx, &request(&tenant, tomorrow_at(11, 0))).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn deleting_an_appointment_returns_its_quota(pool: PgPool) {
        let tenant = fixtures::seed_tenant(&pool).await;
        let ctx = tenant.owner_context();

        let booked = assert_ok!(book(&pool, &ctx, &request(&tenant, tomorrow_at(14, 0))).await);
        assert_eq!(appointments_used(&pool, tenant.owner_id).await, 1);

        assert_ok!(delete(&pool, tenant.clinic_id, tenant.owner_id, booked.id).await);
        assert_eq!(appointments_used(&pool, tenant.owner_id).await, 0);
        let error = assert_err!(
            appointments::get_appointment_by_id(&pool, tenant.clinic_id, booked.id).await
        );
        assert_eq!(error.code, ErrorCode::AppointmentNotFound);
    }
}
