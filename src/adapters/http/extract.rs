//! Caller identity extraction.
//!
//! The token comes from `Authorization: Bearer <jwt>` or, failing that, the
//! `access_token` cookie. Handlers take [`CurrentUser`] or [`AdminUser`] and pass the
//! resolved [`Identity`] on to the use cases.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::jwt,
    domain::entities::user::Identity,
};

const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Any authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Identity);

/// An authenticated caller holding the admin role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Identity);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        identity_from_headers(&parts.headers, state).map(CurrentUser)
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> AppResult<Self> {
        let identity = identity_from_headers(&parts.headers, state)?;
        if !identity.is_admin() {
            tracing::warn!(user_id = %identity.user_id, "Admin route called without admin role");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(identity))
    }
}

fn identity_from_headers(headers: &HeaderMap, state: &AppState) -> AppResult<Identity> {
    let token = bearer_token(headers)
        .or_else(|| {
            CookieJar::from_headers(headers)
                .get(ACCESS_TOKEN_COOKIE)
                .map(|c| c.value().to_string())
        })
        .ok_or(AppError::InvalidCredentials)?;
    jwt::verify(&token, &state.config.jwt_secret)?.identity()
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}
