use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(AppointmentStatus {
    Scheduled,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    NoShow,
});

impl AppointmentStatus {
    /// Appointments in these states no longer hold their time slot.
    pub fn releases_slot(&self) -> bool {
        matches!(self, Self::Cancelled | Self::NoShow)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Scheduled, Confirmed)
                | (Scheduled, CheckedIn)
                | (Scheduled, Cancelled)
                | (Scheduled, NoShow)
                | (Confirmed, CheckedIn)
                | (Confirmed, Cancelled)
                | (Confirmed, NoShow)
                | (CheckedIn, Completed)
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub status: AppointmentStatus,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + chrono::Duration::minutes(self.duration_minutes as i64)
    }
}

#[derive(Debug, Serialize, Clone, sqlx::FromRow)]
pub struct AppointmentDetails {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub patient_name: String,
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub start_time: DateTime<Utc>,
    #[validate(range(min = 5, max = 480, message = "Duration must be 5-480 minutes"))]
    pub duration_minutes: i32,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAppointmentRequest {
    pub doctor_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    #[validate(range(min = 5, max = 480))]
    pub duration_minutes: Option<i32>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeAppointmentStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct AppointmentQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot_minutes: Option<i64>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TimeSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::AppointmentStatus::*;

    #[test]
    fn terminal_states_allow_no_transition() {
        for from in [Completed, Cancelled, NoShow] {
            for to in [Scheduled, Confirmed, CheckedIn, Completed, Cancelled, NoShow] {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn happy_path_is_allowed() {
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(CheckedIn));
        assert!(CheckedIn.can_transition_to(Completed));
        assert!(!Scheduled.can_transition_to(Completed));
        assert!(!CheckedIn.can_transition_to(Cancelled));
    }

    #[test]
    fn only_cancelled_and_no_show_release_the_slot() {
        assert!(Cancelled.releases_slot());
        assert!(NoShow.releases_slot());
        assert!(!Completed.releases_slot());
    }
}
