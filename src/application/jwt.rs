//! Identity token verification.
//!
//! Tokens are issued by the external user service; this crate only verifies them
//! and turns the claims into an [`Identity`].

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::domain::entities::user::{Identity, UserRole};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn identity(&self) -> AppResult<Identity> {
        let user_id = Uuid::parse_str(&self.sub).map_err(|_| AppError::InvalidCredentials)?;
        Ok(Identity {
            user_id,
            role: self.role,
        })
    }
}

#[cfg(test)]
pub fn issue(
    user_id: Uuid,
    role: UserRole,
    secret: &SecretString,
    ttl: time::Duration,
) -> AppResult<String> {
    use jsonwebtoken::{EncodingKey, Header, encode};

    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role,
        iat: now,
        exp: now + ttl.whole_seconds(),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

pub fn verify(token: &str, secret: &SecretString) -> AppResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Rejected identity token");
        AppError::InvalidCredentials
    })
}
