use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::common::string_enum;

string_enum!(QueueStatus {
    Waiting,
    InProgress,
    Completed,
    Skipped,
    Cancelled,
});

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct QueueEntry {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub queue_date: NaiveDate,
    pub queue_number: i32,
    pub status: QueueStatus,
    pub checked_in_at: DateTime<Utc>,
    pub called_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Queue entry annotated with its place in line.
#[derive(Debug, Serialize, Clone)]
pub struct QueuePosition {
    #[serde(flatten)]
    pub entry: QueueEntry,
    pub patients_ahead: i64,
    pub estimated_wait_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CheckInRequest {
    pub patient_id: Uuid,
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CallNextRequest {
    pub doctor_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub date: Option<NaiveDate>,
    pub doctor_id: Option<Uuid>,
}
