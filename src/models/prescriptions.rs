use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(PrescriptionStatus {
    Pending,
    Dispensed,
    Cancelled,
});

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Prescription {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub treatment_history_id: Option<Uuid>,
    pub notes: Option<String>,
    pub status: PrescriptionStatus,
    pub dispensed_by: Option<Uuid>,
    pub dispensed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct PrescriptionItem {
    pub id: Uuid,
    pub prescription_id: Uuid,
    pub medicine_id: Uuid,
    pub quantity: i32,
    pub dosage: String,
    pub frequency: Option<String>,
    pub duration_days: Option<i32>,
    pub instructions: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PrescriptionWithItems {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub items: Vec<PrescriptionItem>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PrescriptionItemRequest {
    pub medicine_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 100))]
    pub dosage: String,
    #[validate(length(max = 100))]
    pub frequency: Option<String>,
    #[validate(range(min = 1))]
    pub duration_days: Option<i32>,
    pub instructions: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub treatment_history_id: Option<Uuid>,
    pub notes: Option<String>,
    #[validate]
    pub items: Vec<PrescriptionItemRequest>,
}
