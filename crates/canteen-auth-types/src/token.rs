//! Session JWT issue and validation.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canteen_domain::role::Role;

/// Session lifetime in seconds (7 days). Also the cookie Max-Age.
pub const SESSION_TTL_SECS: u64 = 604800;

/// Principal identity carried by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub principal_id: Uuid,
    pub email: String,
    pub role: Role,
    pub exp: u64,
}

/// Errors returned by [`validate_session_token`].
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// JWT claims payload.
///
/// | Field | JWT claim | Meaning |
/// |-------|-----------|---------|
/// | `sub` | `sub` | principal id (UUID string) |
/// | `email` | custom | principal email at issue time |
/// | `role` | custom | `"STUDENT"`, `"MANAGER"` or `"ADMIN"` |
/// | `exp` | `exp` | seconds since epoch |
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sign a session token for a principal. Returns the token and its `exp`.
pub fn issue_session_token(
    principal_id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
) -> Result<(String, u64), TokenError> {
    let exp = now_secs() + SESSION_TTL_SECS;
    let claims = SessionClaims {
        sub: principal_id.to_string(),
        email: email.to_owned(),
        role,
        exp,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(TokenError::Signing)?;
    Ok((token, exp))
}

/// Validate a session cookie value.
///
/// HS256, `exp` checked with the default 60s leeway, `exp` and `sub` required.
pub fn validate_session_token(token: &str, secret: &str) -> Result<SessionInfo, TokenError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;
    validation.required_spec_claims.clear();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    })?;

    let claims = data.claims;
    let principal_id = claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| TokenError::Malformed)?;
    Ok(SessionInfo {
        principal_id,
        email: claims.email,
        role: claims.role,
        exp: claims.exp,
    })
}
