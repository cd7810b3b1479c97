//! Liveness and readiness endpoints.

use std::fmt::Display;

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Liveness {
    pub status: &'static str,
}

/// `GET /healthz`: the process is serving requests.
pub async fn healthz() -> Json<Liveness> {
    Json(Liveness { status: "ok" })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub status: &'static str,
    pub dependency: &'static str,
}

/// Readiness answer for one dependency check: 200 when it passed, 503 with
/// a warn log otherwise.
pub fn readiness<E: Display>(
    dependency: &'static str,
    check: Result<(), E>,
) -> (StatusCode, Json<Readiness>) {
    match check {
        Ok(()) => (
            StatusCode::OK,
            Json(Readiness {
                status: "ready",
                dependency,
            }),
        ),
        Err(e) => {
            tracing::warn!(dependency, error = %e, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Readiness {
                    status: "unavailable",
                    dependency,
                }),
            )
        }
    }
}
