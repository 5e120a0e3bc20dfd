use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::core::{AppError, ErrorCode};
use crate::models::appointments::{Appointment, TimeSlot};

/// Half-open interval overlap: `[a_start, a_end)` against `[b_start, b_end)`.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && b_start < a_end
}

/// First booked appointment that collides with the candidate slot.
pub fn find_conflict<'a>(
    start: DateTime<Utc>,
    duration_minutes: i32,
    booked: &'a [Appointment],
    exclude: Option<Uuid>,
) -> Option<&'a Appointment> {
    let end = start + Duration::minutes(duration_minutes as i64);
    booked
        .iter()
        .filter(|appointment| Some(appointment.id) != exclude)
        .filter(|appointment| !appointment.is_deleted && !appointment.status.releases_slot())
        .find(|appointment| overlaps(start, end, appointment.start_time, appointment.end_time()))
}

pub fn ensure_slot_free(
    start: DateTime<Utc>,
    duration_minutes: i32,
    booked: &[Appointment],
    exclude: Option<Uuid>,
) -> Result<(), AppError> {
    match find_conflict(start, duration_minutes, booked, exclude) {
        Some(existing) => Err(AppError::bad_request(
            ErrorCode::TimeSlotConflict,
            format!(
                "The doctor already has an appointment from {} to {}",
                existing.start_time.format("%Y-%m-%d %H:%M"),
                existing.end_time().format("%H:%M")
            ),
        )),
        None => Ok(()),
    }
}

pub const MIN_SLOT_MINUTES: i64 = 5;
pub const MAX_SLOT_MINUTES: i64 = 480;

/// Free slots of `slot_minutes` between `day_start_hour` and `day_end_hour` (UTC).
pub fn available_slots(
    date: NaiveDate,
    day_start_hour: u32,
    day_end_hour: u32,
    slot_minutes: i64,
    booked: &[Appointment],
) -> Result<Vec<TimeSlot>, AppError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot_minutes) {
        return Err(AppError::bad_request(
            ErrorCode::InvalidTimeRange,
            format!(
                "Slot length must be between {} and {} minutes",
                MIN_SLOT_MINUTES, MAX_SLOT_MINUTES
            ),
        ));
    }
    if day_start_hour >= day_end_hour || day_end_hour > 24 {
        return Err(AppError::bad_request(
            ErrorCode::InvalidTimeRange,
            "Invalid working hours",
        ));
    }

    let day_start = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
        + Duration::hours(day_start_hour as i64);
    let day_end = Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
        + Duration::hours(day_end_hour as i64);
    let step = Duration::minutes(slot_minutes);

    let mut slots = Vec::new();
    let mut cursor = day_start;
    while cursor + step <= day_end {
        if find_conflict(cursor, slot_minutes as i32, booked, None).is_none() {
            slots.push(TimeSlot {
                start: cursor,
                end: cursor + step,
            });
        }
        cursor += step;
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::appointments::AppointmentStatus;
    use claim::{assert_err, assert_ok};

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, minute, 0).unwrap()
    }

    fn booked(start: DateTime<Utc>, minutes: i32, status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            clinic_id: Uuid::nil(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::nil(),
            start_time: start,
            duration_minutes: minutes,
            reason: None,
            notes: None,
            status,
            is_deleted: false,
            created_by: None,
            created_at: start,
            updated_at: start,
            deleted_at: None,
        }
    }

    #[test]
    fn overlapping_slot_is_a_conflict() {
        let existing = vec![booked(at(9, 0), 30, AppointmentStatus::Scheduled)];
        let error = assert_err!(ensure_slot_free(at(9, 15), 30, &existing, None));
        assert_eq!(error.code, ErrorCode::TimeSlotConflict);
    }

    #[test]
    fn adjacent_slots_do_not_conflict() {
        let existing = vec![booked(at(9, 0), 30, AppointmentStatus::Confirmed)];
        assert_ok!(ensure_slot_free(at(9, 30), 30, &existing, None));
        assert_ok!(ensure_slot_free(at(8, 30), 30, &existing, None));
    }

    #[test]
    fn cancelled_appointments_free_their_slot() {
        let existing = vec![
            booked(at(9, 0), 30, AppointmentStatus::Cancelled),
            booked(at(10, 0), 30, AppointmentStatus::NoShow),
        ];
        assert_ok!(ensure_slot_free(at(9, 0), 30, &existing, None));
        assert_ok!(ensure_slot_free(at(10, 0), 30, &existing, None));
    }

    #[test]
    fn rescheduling_ignores_itself() {
        let existing = vec![booked(at(9, 0), 30, AppointmentStatus::Scheduled)];
        let own_id = existing[0].id;
        assert_ok!(ensure_slot_free(at(9, 10), 30, &existing, Some(own_id)));
    }

    #[test]
    fn containing_slot_is_a_conflict() {
        let existing = vec![booked(at(9, 10), 10, AppointmentStatus::CheckedIn)];
        assert_err!(ensure_slot_free(at(9, 0), 60, &existing, None));
    }

    #[test]
    fn available_slots_skip_booked_time() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let existing = vec![booked(at(9, 0), 45, AppointmentStatus::Scheduled)];

        let slots = available_slots(date, 8, 11, 30, &existing).unwrap();
        let starts: Vec<_> = slots.iter().map(|slot| slot.start).collect();
        assert_eq!(starts, vec![at(8, 0), at(8, 30), at(10, 0), at(10, 30)]);
    }

    #[test]
    fn invalid_working_hours_are_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_err!(available_slots(date, 17, 8, 30, &[]));
        assert_err!(available_slots(date, 8, 17, 0, &[]));
    }

    #[test]
    fn slot_length_outside_bounds_is_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        for minutes in [-30, 4, 481, i64::MAX / 10, i64::MAX] {
            let error = assert_err!(available_slots(date, 8, 17, minutes, &[]));
            assert_eq!(error.code, ErrorCode::InvalidTimeRange);
        }
    }

    #[test]
    fn slot_length_bounds_are_inclusive() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        assert_eq!(assert_ok!(available_slots(date, 8, 9, MIN_SLOT_MINUTES, &[])).len(), 12);
        assert_eq!(assert_ok!(available_slots(date, 0, 24, MAX_SLOT_MINUTES, &[])).len(), 3);
    }
}
