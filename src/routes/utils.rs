use axum::http::{HeaderMap, StatusCode};

use crate::db::user::UserId;

use super::auth::{AuthService, Caller};
use super::ApiError;

#[inline]
pub fn validate_auth_token(headers: &HeaderMap, service: &AuthService) -> Result<Caller, StatusCode> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token.strip_prefix("Bearer ").unwrap_or(token),
        _ => {
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    //validate our token
    match service.verify_token(jwt_header_token) {
        Ok(caller) => Ok(caller),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[inline]
pub fn require_admin(headers: &HeaderMap, service: &AuthService) -> Result<(), ApiError> {
    match validate_auth_token(headers, service)? {
        Caller::Admin => Ok(()),
        Caller::Member(id) => {
            tracing::warn!("Admin route refused for user: {id}");
            Err(ApiError::new(StatusCode::FORBIDDEN, "Admin access required"))
        }
    }
}

/// Admins may act for anyone, members only for themselves.
#[inline]
pub fn require_user(headers: &HeaderMap, service: &AuthService, user_id: UserId) -> Result<Caller, ApiError> {
    let caller = validate_auth_token(headers, service)?;
    if !caller.may_act_for(user_id) {
        tracing::warn!("Caller {caller:?} refused access to user: {user_id}");
        return Err(ApiError::new(StatusCode::FORBIDDEN, "Not allowed for this user"));
    }
    Ok(caller)
}
