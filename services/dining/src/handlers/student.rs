use axum::{
    Json,
    extract::State,
};
use serde::{Deserialize, Serialize};

use canteen_auth_types::session::Session;
use canteen_domain::meal::VerificationMethod;
use canteen_domain::pagination::Page;
use canteen_domain::role::Role;

use crate::domain::types::MealQuery;
use crate::error::DiningError;
use crate::handlers::extract::{JsonBody, QueryParams};
use crate::handlers::dto::{EnrollmentResponse, MealRecordResponse, TokenResponse};
use crate::handlers::require;
use crate::state::AppState;
use crate::usecase::enrollment::StudentEnrollmentsUseCase;
use crate::usecase::meal::{
    LatestMealsUseCase, ListMealsUseCase, RECENT_MEALS_LIMIT, StudentTokensUseCase,
};
use crate::usecase::report::StudentStatsUseCase;
use crate::usecase::verification::RequestMealUseCase;

// ── GET /api/student/tokens ──────────────────────────────────────────────────

pub async fn list_tokens(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<TokenResponse>>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = StudentTokensUseCase {
        entitlements: state.entitlement_repo(),
    };
    let tokens = usecase.execute(session.principal_id).await?;
    Ok(Json(tokens.into_iter().map(TokenResponse::from).collect()))
}

// ── GET /api/student/enrollments ─────────────────────────────────────────────

pub async fn list_enrollments(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrollmentResponse>>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = StudentEnrollmentsUseCase {
        entitlements: state.entitlement_repo(),
    };
    let enrollments = usecase.execute(session.principal_id).await?;
    Ok(Json(
        enrollments
            .into_iter()
            .map(|(e, plan)| EnrollmentResponse::new(e, None, Some(plan)))
            .collect(),
    ))
}

// ── GET /api/student/meal-history ────────────────────────────────────────────

#[derive(Serialize)]
pub struct MealHistoryResponse {
    pub meals: Vec<MealRecordResponse>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

pub async fn meal_history(
    session: Session,
    State(state): State<AppState>,
    QueryParams(page): QueryParams<Page>,
) -> Result<Json<MealHistoryResponse>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = ListMealsUseCase {
        meals: state.meal_record_repo(),
    };
    let out = usecase
        .execute(None, Some(session.principal_id), page)
        .await?;
    Ok(Json(MealHistoryResponse {
        meals: out.meals.into_iter().map(MealRecordResponse::from).collect(),
        total: out.total,
        limit: out.page.limit,
        offset: out.page.offset,
    }))
}

// ── GET /api/student/recent-meals ────────────────────────────────────────────

pub async fn recent_meals(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<MealRecordResponse>>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = LatestMealsUseCase {
        meals: state.meal_record_repo(),
    };
    let meals = usecase
        .execute(
            MealQuery {
                student_id: Some(session.principal_id),
                ..Default::default()
            },
            RECENT_MEALS_LIMIT,
        )
        .await?;
    Ok(Json(meals.into_iter().map(MealRecordResponse::from).collect()))
}

// ── GET /api/student/stats ───────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStatsResponse {
    pub active_tokens: u64,
    pub active_enrollments: u64,
    pub today_meals: u64,
}

pub async fn stats(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<StudentStatsResponse>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = StudentStatsUseCase {
        entitlements: state.entitlement_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let stats = usecase.execute(session.principal_id).await?;
    Ok(Json(StudentStatsResponse {
        active_tokens: stats.active_tokens,
        active_enrollments: stats.active_enrollments,
        today_meals: stats.today_meals,
    }))
}

// ── POST /api/student/request-meal ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMealRequest {
    /// Defaults to MANUAL. Credential fields, if sent, are ignored.
    pub verification_method: Option<VerificationMethod>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMealResponse {
    pub success: bool,
    pub meal_record: MealRecordResponse,
}

pub async fn request_meal(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RequestMealRequest>,
) -> Result<Json<RequestMealResponse>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = RequestMealUseCase {
        principals: state.principal_repo(),
        entitlements: state.entitlement_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let record = usecase
        .execute(
            session.principal_id,
            body.verification_method
                .unwrap_or(VerificationMethod::Manual),
        )
        .await?;
    Ok(Json(RequestMealResponse {
        success: true,
        meal_record: record.into(),
    }))
}
