//! Session helpers for router tests.
//!
//! Mints a real signed session token so requests pass through the same
//! `Session` extractor production traffic does.

use axum::http::{HeaderName, HeaderValue, header};
use uuid::Uuid;

use canteen_auth_types::cookie::SESSION_COOKIE;
use canteen_auth_types::token::issue_session_token;
use canteen_domain::role::Role;

/// Identity to sign into a test request.
pub struct MockSession {
    pub principal_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl MockSession {
    pub fn new(role: Role) -> Self {
        Self {
            principal_id: Uuid::now_v7(),
            email: format!("{}@campus.test", role.as_str().to_lowercase()),
            role,
        }
    }

    pub fn with_id(mut self, principal_id: Uuid) -> Self {
        self.principal_id = principal_id;
        self
    }

    /// `Cookie` header carrying a session token signed with `secret`.
    pub fn cookie_header(&self, secret: &str) -> (HeaderName, HeaderValue) {
        let (token, _) = issue_session_token(self.principal_id, &self.email, self.role, secret)
            .unwrap_or_else(|e| panic!("failed to sign test session: {e}"));
        let value = HeaderValue::from_str(&format!("{SESSION_COOKIE}={token}"))
            .unwrap_or_else(|e| panic!("invalid cookie header: {e}"));
        (header::COOKIE, value)
    }
}
