use axum::{Json, extract::State};
use serde::Serialize;

use crate::error::DiningError;
use crate::state::AppState;
use crate::usecase::report::PublicStatsUseCase;

// ── GET /api/public/stats ────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStatsResponse {
    pub online_users: u64,
    pub active_meals: u64,
    pub pending_requests: u64,
    pub total_meals: u64,
}

pub async fn public_stats(
    State(state): State<AppState>,
) -> Result<Json<PublicStatsResponse>, DiningError> {
    let usecase = PublicStatsUseCase {
        principals: state.principal_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let stats = usecase.execute().await?;
    Ok(Json(PublicStatsResponse {
        online_users: stats.online_users,
        active_meals: stats.active_meals,
        pending_requests: stats.pending_requests,
        total_meals: stats.total_meals,
    }))
}
