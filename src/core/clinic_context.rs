use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::core::jwt_auth::JwtClaims;
use crate::core::{AppError, ErrorCode};
use crate::models::staff::StaffRole;

pub const CLINIC_HEADER: &str = "X-Clinic-Id";

/// Current tenant and caller for one request, derived from the bearer token.
///
/// Owners may address any clinic they own through the `X-Clinic-Id` header;
/// ownership of that clinic is checked by [`crate::db::clinics::ensure_clinic_access`]
/// before tenant data is touched. Every other role is pinned to the clinic in
/// its token.
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicContext {
    pub user_id: Uuid,
    pub clinic_id: Option<Uuid>,
    pub role: StaffRole,
    pub email: String,
}

impl ClinicContext {
    pub fn from_claims(claims: &JwtClaims, clinic_header: Option<&str>) -> Result<Self, AppError> {
        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::unauthorized("Invalid user ID in token"))?;
        let role: StaffRole = claims
            .role
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid role in token"))?;

        let token_clinic = claims
            .clinic_id
            .as_deref()
            .map(Uuid::parse_str)
            .transpose()
            .map_err(|_| AppError::unauthorized("Invalid clinic ID in token"))?;

        let clinic_id = match (role, clinic_header) {
            (StaffRole::Owner, Some(header)) => Some(Uuid::parse_str(header.trim()).map_err(|_| {
                AppError::bad_request(ErrorCode::ValidationError, "Invalid X-Clinic-Id header")
            })?),
            _ => token_clinic,
        };

        Ok(Self {
            user_id,
            clinic_id,
            role,
            email: claims.email.clone(),
        })
    }

    pub fn require_clinic(&self) -> Result<Uuid, AppError> {
        self.clinic_id.ok_or_else(|| {
            AppError::bad_request(
                ErrorCode::ClinicContextRequired,
                "No clinic selected for this request",
            )
        })
    }

    pub fn require_role(&self, allowed: &[StaffRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::forbidden_error(format!(
                "Access denied for role {}",
                self.role.as_str()
            )))
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == StaffRole::Owner
    }
}

impl FromRequest for ClinicContext {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let claims = JwtClaims::from_request(req, payload);
        let header = req
            .headers()
            .get(CLINIC_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        Box::pin(async move {
            let claims = claims.await?;
            let context = ClinicContext::from_claims(&claims, header.as_deref())?;
            Ok(context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use claim::{assert_err, assert_ok};

    fn claims(role: StaffRole, clinic: Option<Uuid>) -> JwtClaims {
        JwtClaims::new(
            Uuid::new_v4(),
            "staff@clinic.test",
            role,
            clinic,
            Duration::minutes(5),
        )
    }

    #[test]
    fn staff_are_pinned_to_token_clinic() {
        let clinic = Uuid::new_v4();
        let other = Uuid::new_v4().to_string();
        let ctx = assert_ok!(ClinicContext::from_claims(
            &claims(StaffRole::Receptionist, Some(clinic)),
            Some(&other)
        ));
        assert_eq!(ctx.clinic_id, Some(clinic));
    }

    #[test]
    fn owners_can_switch_clinic_with_header() {
        let other = Uuid::new_v4();
        let ctx = assert_ok!(ClinicContext::from_claims(
            &claims(StaffRole::Owner, None),
            Some(&other.to_string())
        ));
        assert_eq!(ctx.clinic_id, Some(other));
        assert!(ctx.is_owner());
    }

    #[test]
    fn missing_clinic_is_reported() {
        let ctx = ClinicContext::from_claims(&claims(StaffRole::Owner, None), None).unwrap();
        let error = assert_err!(ctx.require_clinic());
        assert_eq!(error.code, ErrorCode::ClinicContextRequired);
    }

    #[test]
    fn role_gate_rejects_other_roles() {
        let ctx =
            ClinicContext::from_claims(&claims(StaffRole::Nurse, Some(Uuid::new_v4())), None)
                .unwrap();
        assert_ok!(ctx.require_role(&[StaffRole::Nurse, StaffRole::Doctor]));
        assert_err!(ctx.require_role(&[StaffRole::Owner, StaffRole::Admin]));
    }

    #[test]
    fn unknown_role_is_unauthorized() {
        let mut raw = claims(StaffRole::Doctor, None);
        raw.role = "Janitor".into();
        assert_err!(ClinicContext::from_claims(&raw, None));
    }
}
