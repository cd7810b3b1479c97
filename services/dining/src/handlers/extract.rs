//! Body and query extractors whose rejections use the service error shape.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::extract::rejection::{JsonRejection, QueryRejection};

use crate::error::DiningError;

/// `axum::Json` that rejects undecodable bodies with a 400 VALIDATION error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(DiningError))]
pub struct JsonBody<T>(pub T);

/// `axum::extract::Query` with the same rejection shape, reported on `query`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(DiningError))]
pub struct QueryParams<T>(pub T);

impl From<JsonRejection> for DiningError {
    fn from(rejection: JsonRejection) -> Self {
        DiningError::invalid("body", rejection.body_text())
    }
}

impl From<QueryRejection> for DiningError {
    fn from(rejection: QueryRejection) -> Self {
        DiningError::invalid("query", rejection.body_text())
    }
}
