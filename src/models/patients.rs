use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(Gender { Male, Female, Other });

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Patient {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_code: String,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePatientRequest {
    #[validate(length(min = 1, max = 150, message = "Full name is required"))]
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 5))]
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    #[validate(length(max = 150))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 30))]
    pub emergency_contact_phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePatientRequest {
    #[validate(length(min = 1, max = 150))]
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 5))]
    pub blood_type: Option<String>,
    pub allergies: Option<String>,
    #[validate(length(max = 150))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 30))]
    pub emergency_contact_phone: Option<String>,
}
