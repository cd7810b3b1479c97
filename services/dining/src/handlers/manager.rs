use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canteen_auth_types::session::Session;
use canteen_domain::role::Role;

use crate::domain::types::MealQuery;
use crate::error::DiningError;
use crate::handlers::extract::{JsonBody, QueryParams};
use crate::handlers::dto::MealRecordResponse;
use crate::handlers::{require, status_filter};
use crate::state::AppState;
use crate::usecase::approval::{CompleteMealUseCase, DecideMealInput, DecideMealUseCase};
use crate::usecase::meal::{LatestMealsUseCase, MANAGER_LIST_LIMIT, PendingMealsUseCase};
use crate::usecase::report::ManagerStatsUseCase;

// ── GET /api/manager/pending-meals ───────────────────────────────────────────

pub async fn pending_meals(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<MealRecordResponse>>, DiningError> {
    require(&session, Role::Manager)?;
    let usecase = PendingMealsUseCase {
        meals: state.meal_record_repo(),
    };
    let meals = usecase.execute().await?;
    Ok(Json(meals.into_iter().map(MealRecordResponse::from).collect()))
}

// ── GET /api/manager/meals ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct MealsQuery {
    pub status: Option<String>,
}

pub async fn list_meals(
    session: Session,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<MealsQuery>,
) -> Result<Json<Vec<MealRecordResponse>>, DiningError> {
    require(&session, Role::Manager)?;
    let status = status_filter(query.status.as_deref())?;
    let usecase = LatestMealsUseCase {
        meals: state.meal_record_repo(),
    };
    let meals = usecase
        .execute(
            MealQuery {
                statuses: status.into_iter().collect(),
                ..Default::default()
            },
            MANAGER_LIST_LIMIT,
        )
        .await?;
    Ok(Json(meals.into_iter().map(MealRecordResponse::from).collect()))
}

// ── GET /api/manager/stats ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerStatsResponse {
    pub pending: u64,
    pub today_approved: u64,
    pub today_denied: u64,
}

pub async fn stats(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<ManagerStatsResponse>, DiningError> {
    require(&session, Role::Manager)?;
    let usecase = ManagerStatsUseCase {
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let stats = usecase.execute().await?;
    Ok(Json(ManagerStatsResponse {
        pending: stats.pending,
        today_approved: stats.today_approved,
        today_denied: stats.today_denied,
    }))
}

// ── POST /api/manager/approve-meal ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveMealRequest {
    pub meal_id: Uuid,
    pub approved: bool,
    pub reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealActionResponse {
    pub success: bool,
    pub meal_record: MealRecordResponse,
}

pub async fn approve_meal(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ApproveMealRequest>,
) -> Result<Json<MealActionResponse>, DiningError> {
    require(&session, Role::Manager)?;
    let usecase = DecideMealUseCase {
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let record = usecase
        .execute(
            session.principal_id,
            DecideMealInput {
                meal_id: body.meal_id,
                approved: body.approved,
                reason: body.reason,
            },
        )
        .await?;
    Ok(Json(MealActionResponse {
        success: true,
        meal_record: record.into(),
    }))
}

// ── POST /api/manager/meals/{id}/complete ────────────────────────────────────

pub async fn complete_meal(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MealActionResponse>, DiningError> {
    require(&session, Role::Manager)?;
    let usecase = CompleteMealUseCase {
        meals: state.meal_record_repo(),
    };
    let record = usecase.execute(id).await?;
    tracing::info!(meal = %id, manager = %session.principal_id, "meal completed");
    Ok(Json(MealActionResponse {
        success: true,
        meal_record: record.into(),
    }))
}
