//! Caller identity
//!
//! Token issuance lives in the upstream auth gateway, which forwards the
//! authenticated user id in the `X-User-Id` header. Requests are resolved
//! against stored users; admin-only routes additionally require the
//! `admin` role.

use hyper::header::HeaderMap;

use crate::db::UserRow;
use crate::error::TrailError;
use crate::services::UserService;

/// Header carrying the authenticated user id
pub const USER_ID_HEADER: &str = "x-user-id";

/// The resolved user behind a request
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: UserRow,
}

impl Caller {
    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Fail with `Forbidden` unless the caller is an admin
    pub fn require_admin(&self) -> Result<(), TrailError> {
        if !self.user.is_admin() {
            return Err(TrailError::Forbidden(format!(
                "User {} is not allowed to perform this action",
                self.user.id
            )));
        }
        Ok(())
    }
}

/// User id from the request headers
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<&str, TrailError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TrailError::Unauthorized("missing X-User-Id header".to_string()))
}

/// Resolve the request's user; unknown ids are unauthorized
pub fn authenticate(users: &UserService, headers: &HeaderMap) -> Result<Caller, TrailError> {
    let id = user_id_from_headers(headers)?;
    let user = users
        .find(id)?
        .ok_or_else(|| TrailError::Unauthorized(format!("unknown user {}", id)))?;
    Ok(Caller { user })
}
