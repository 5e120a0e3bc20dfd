use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::common::string_enum;

string_enum!(
    /// Role carried in the bearer token; `Owner` is the tenant owner holding the subscription.
    StaffRole {
        Owner,
        Admin,
        Doctor,
        Nurse,
        Receptionist,
        Pharmacist,
    }
);

impl StaffRole {
    pub const MANAGERS: [StaffRole; 2] = [StaffRole::Owner, StaffRole::Admin];
    pub const CLINICAL: [StaffRole; 4] = [
        StaffRole::Owner,
        StaffRole::Admin,
        StaffRole::Doctor,
        StaffRole::Nurse,
    ];
    pub const FRONT_DESK: [StaffRole; 4] = [
        StaffRole::Owner,
        StaffRole::Admin,
        StaffRole::Receptionist,
        StaffRole::Nurse,
    ];
    pub const PHARMACY: [StaffRole; 3] =
        [StaffRole::Owner, StaffRole::Admin, StaffRole::Pharmacist];
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct Staff {
    pub id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: StaffRole,
    pub specialization: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateStaffRequest {
    #[validate(length(min = 1, max = 150, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Please provide a valid email address"))]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub role: StaffRole,
    #[validate(length(max = 120))]
    pub specialization: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStaffRequest {
    #[validate(length(min = 1, max = 150))]
    pub full_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub role: Option<StaffRole>,
    #[validate(length(max = 120))]
    pub specialization: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StaffQuery {
    pub role: Option<StaffRole>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use fake::faker::internet::en::SafeEmail;
    use fake::faker::name::en::Name;
    use fake::Fake;

    #[test]
    fn valid_staff_payload_passes() {
        let request = CreateStaffRequest {
            full_name: Name().fake(),
            email: SafeEmail().fake(),
            phone: None,
            role: StaffRole::Doctor,
            specialization: Some("Pediatrics".into()),
        };
        assert_ok!(request.validate());
    }

    #[test]
    fn invalid_email_is_rejected() {
        let request = CreateStaffRequest {
            full_name: Name().fake(),
            email: "not-an-email".into(),
            phone: None,
            role: StaffRole::Nurse,
            specialization: None,
        };
        assert_err!(request.validate());
    }

    #[test]
    fn role_deserializes_from_variant_name() {
        let role: StaffRole = serde_json::from_str("\"Pharmacist\"").unwrap();
        assert_eq!(role, StaffRole::Pharmacist);
        assert!(StaffRole::MANAGERS.contains(&StaffRole::Owner));
    }
}
