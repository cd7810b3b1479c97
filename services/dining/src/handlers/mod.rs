pub mod admin;
pub mod auth;
pub mod dto;
pub mod extract;
pub mod hardware;
pub mod health;
pub mod manager;
pub mod public;
pub mod student;
pub mod users;

use canteen_auth_types::session::Session;
use canteen_domain::role::Role;

use crate::error::DiningError;

/// 403 unless the session belongs to `role`. Missing sessions are already
/// rejected with 401 by the `Session` extractor.
pub fn require(session: &Session, role: Role) -> Result<(), DiningError> {
    if session.role == role {
        Ok(())
    } else {
        Err(DiningError::Forbidden)
    }
}

/// `status` query filter: absent or `ALL` lists every status.
pub fn status_filter(
    raw: Option<&str>,
) -> Result<Option<canteen_domain::meal::MealStatus>, DiningError> {
    match raw.map(str::trim) {
        None | Some("") | Some("ALL") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| DiningError::invalid("status", "must be ALL, PENDING, APPROVED, DENIED or COMPLETED")),
    }
}
