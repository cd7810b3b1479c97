use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use canteen_core::health::{Readiness, readiness};

use crate::state::AppState;

/// `GET /readyz`: ready once the database answers a ping.
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<Readiness>) {
    readiness("database", state.db.ping().await)
}
