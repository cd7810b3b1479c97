//! Cookie-backed session extractor.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;
use http::StatusCode;
use http::request::Parts;
use uuid::Uuid;

use canteen_domain::role::Role;

use crate::cookie::SESSION_COOKIE;
use crate::token::validate_session_token;

/// HMAC secret used to validate session tokens. Exposed to the extractor
/// through `FromRef` on the service state.
#[derive(Clone)]
pub struct SessionKey(pub Arc<str>);

impl SessionKey {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// The authenticated principal behind a request.
///
/// Rejects with 401 when the `token` cookie is absent or fails validation.
/// Role checks (403) are done by handlers after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub principal_id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRejection;

impl IntoResponse for SessionRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "kind": "UNAUTHORIZED",
            "message": "authentication required",
        });
        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

fn session_from_parts(parts: &Parts, key: &SessionKey) -> Option<Session> {
    let jar = CookieJar::from_headers(&parts.headers);
    let value = jar.get(SESSION_COOKIE)?.value().to_owned();
    let info = validate_session_token(&value, key.as_str()).ok()?;
    Some(Session {
        principal_id: info.principal_id,
        email: info.email,
        role: info.role,
    })
}

impl<S> FromRequestParts<S> for Session
where
    SessionKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = SessionRejection;

    // Resolve synchronously and hand back a 'static future so the returned
    // future does not borrow `parts`.
    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let session = session_from_parts(parts, &SessionKey::from_ref(state));
        async move { session.ok_or(SessionRejection) }
    }
}

impl<S> OptionalFromRequestParts<S> for Session
where
    SessionKey: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> impl std::future::Future<Output = Result<Option<Self>, Self::Rejection>> + Send {
        let session = session_from_parts(parts, &SessionKey::from_ref(state));
        async move { Ok(session) }
    }
}
