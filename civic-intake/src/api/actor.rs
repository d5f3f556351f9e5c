//! Staff identity asserted by the upstream gateway
//!
//! The gateway authenticates staff and forwards three headers:
//! - `x-civic-staff-secret`: must equal the configured staff secret
//! - `x-civic-role`: `super_admin` or `official`
//! - `x-civic-department`: the official's department code
//!
//! Requests without the secret header are citizens.

use crate::error::ApiError;
use crate::types::Actor;
use crate::AppState;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use civic_common::Department;
use subtle::ConstantTimeEq;
use tracing::warn;

pub const STAFF_SECRET_HEADER: &str = "x-civic-staff-secret";
pub const ROLE_HEADER: &str = "x-civic-role";
pub const DEPARTMENT_HEADER: &str = "x-civic-department";

/// Staff actor, or `None` for an anonymous caller
pub struct MaybeStaff(pub Option<Actor>);

/// Staff actor; rejects anonymous callers with 403
pub struct Staff(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for MaybeStaff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(presented) = header(parts, STAFF_SECRET_HEADER) else {
            return Ok(MaybeStaff(None));
        };

        let Some(expected) = state.staff_secret.as_deref() else {
            warn!("Staff headers received but no staff secret is configured");
            return Err(ApiError::Forbidden("staff access is not configured".to_string()));
        };
        if !secrets_match(presented, expected) {
            warn!("Staff request with wrong secret");
            return Err(ApiError::Forbidden("invalid staff secret".to_string()));
        }

        let actor = match header(parts, ROLE_HEADER) {
            Some("super_admin") => Actor::SuperAdmin,
            Some("official") => {
                let department = header(parts, DEPARTMENT_HEADER)
                    .ok_or_else(|| {
                        ApiError::BadRequest(format!("{} header is required", DEPARTMENT_HEADER))
                    })?
                    .parse::<Department>()?;
                Actor::Official { department }
            }
            Some(other) => {
                return Err(ApiError::BadRequest(format!("unknown role '{}'", other)));
            }
            None => {
                return Err(ApiError::BadRequest(format!("{} header is required", ROLE_HEADER)));
            }
        };

        Ok(MaybeStaff(Some(actor)))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Staff {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match MaybeStaff::from_request_parts(parts, state).await? {
            MaybeStaff(Some(actor)) => Ok(Staff(actor)),
            MaybeStaff(None) => Err(ApiError::Forbidden("staff credentials required".to_string())),
        }
    }
}

/// Constant-time secret comparison (only the length can leak)
fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
