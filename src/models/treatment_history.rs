use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct TreatmentHistory {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_id: Option<Uuid>,
    pub visit_date: NaiveDate,
    pub symptoms: Option<String>,
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTreatmentHistoryRequest {
    pub patient_id: Uuid,
    /// Defaults to the caller when omitted.
    pub doctor_id: Option<Uuid>,
    pub appointment_id: Option<Uuid>,
    pub visit_date: Option<NaiveDate>,
    pub symptoms: Option<String>,
    #[validate(length(min = 1, message = "Diagnosis is required"))]
    pub diagnosis: String,
    pub treatment: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTreatmentHistoryRequest {
    pub symptoms: Option<String>,
    #[validate(length(min = 1))]
    pub diagnosis: Option<String>,
    pub treatment: Option<String>,
    pub notes: Option<String>,
}
