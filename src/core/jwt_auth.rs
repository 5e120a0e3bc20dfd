use actix_web::dev::Payload;
use actix_web::{http, web, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use uuid::Uuid;

use crate::core::config::JwtAuthConfig;
use crate::core::AppError;
use crate::models::staff::StaffRole;

/// Claims issued by the external identity provider.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtClaims {
    pub sub: String, // staff ID
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    pub exp: usize,
}

impl JwtClaims {
    pub fn new(
        staff_id: Uuid,
        email: impl Into<String>,
        role: StaffRole,
        clinic_id: Option<Uuid>,
        valid_for: Duration,
    ) -> Self {
        Self {
            sub: staff_id.to_string(),
            email: email.into(),
            role: role.as_str().to_string(),
            clinic_id: clinic_id.map(|id| id.to_string()),
            exp: (Utc::now() + valid_for).timestamp() as usize,
        }
    }
}

pub fn generate_jwt_token(claims: &JwtClaims, config: &JwtAuthConfig) -> Result<String, AppError> {
    let encoding_key = EncodingKey::from_secret(config.secret.expose_secret().as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|_| AppError::internal_error("Failed to generate JWT token"))
}

pub fn decode_jwt_token(token: &str, config: &JwtAuthConfig) -> Result<JwtClaims, AppError> {
    decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(config.secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::unauthorized("Invalid token"))
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

impl FromRequest for JwtClaims {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(claims) = req.extensions().get::<JwtClaims>() {
            return ready(Ok(claims.clone()));
        }

        let config = match req.app_data::<web::Data<JwtAuthConfig>>() {
            Some(config) => config,
            None => return ready(Err(AppError::internal_error("JWT configuration missing"))),
        };

        let token = match bearer_token(req) {
            Some(token) => token,
            None => return ready(Err(AppError::unauthorized("Invalid login credentials"))),
        };

        let claims = match decode_jwt_token(&token, config) {
            Ok(claims) => claims,
            Err(e) => return ready(Err(e)),
        };

        req.extensions_mut().insert(claims.clone());

        ready(Ok(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim::{assert_err, assert_ok};
    use secrecy::Secret;

    fn config() -> JwtAuthConfig {
        JwtAuthConfig {
            secret: Secret::new("test-secret-value".to_string()),
            token_expiration_time: 60,
        }
    }

    #[test]
    fn issued_token_decodes_to_same_claims() {
        let claims = JwtClaims::new(
            Uuid::new_v4(),
            "owner@clinic.test",
            StaffRole::Owner,
            Some(Uuid::new_v4()),
            Duration::minutes(5),
        );
        let token = generate_jwt_token(&claims, &config()).unwrap();
        let decoded = assert_ok!(decode_jwt_token(&token, &config()));
        assert_eq!(decoded, claims);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let claims = JwtClaims::new(
            Uuid::new_v4(),
            "doc@clinic.test",
            StaffRole::Doctor,
            None,
            Duration::minutes(5),
        );
        let token = generate_jwt_token(&claims, &config()).unwrap();
        let other = JwtAuthConfig {
            secret: Secret::new("another-secret".to_string()),
            token_expiration_time: 60,
        };
        assert_err!(decode_jwt_token(&token, &other));
    }

    #[test]
    fn expired_token_is_rejected() {
        let claims = JwtClaims::new(
            Uuid::new_v4(),
            "doc@clinic.test",
            StaffRole::Doctor,
            None,
            Duration::minutes(-10),
        );
        let token = generate_jwt_token(&claims, &config()).unwrap();
        assert_err!(decode_jwt_token(&token, &config()));
    }
}
