use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canteen_auth_types::session::Session;
use canteen_domain::meal::MealStatus;
use canteen_domain::pagination::Page;
use canteen_domain::role::Role;

use crate::domain::types::MealPlanChanges;
use crate::error::DiningError;
use crate::handlers::extract::{JsonBody, QueryParams};
use crate::handlers::dto::{
    EnrollmentCount, EnrollmentResponse, MealPlanResponse, MealRecordResponse, UserResponse,
    double_option,
};
use crate::handlers::student::MealHistoryResponse;
use crate::handlers::{require, status_filter};
use crate::state::AppState;
use crate::usecase::alert::{Alert, FraudAlertsUseCase};
use crate::usecase::enrollment::{
    CreateEnrollmentUseCase, DeactivateEnrollmentUseCase, ListEnrollmentsUseCase,
};
use crate::usecase::meal::ListMealsUseCase;
use crate::usecase::meal_plan::{
    CreateMealPlanInput, CreateMealPlanUseCase, DeleteMealPlanUseCase, ListMealPlansUseCase,
    UpdateMealPlanUseCase,
};
use crate::usecase::report::{AdminStatsUseCase, ReportUseCase};
use crate::usecase::user::{
    CreateStaffInput, CreateStaffUseCase, DeleteUserUseCase, ListUsersUseCase, UpdateUserInput,
    UpdateUserUseCase,
};

// ── GET /api/admin/users ─────────────────────────────────────────────────────

pub async fn list_users(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = ListUsersUseCase {
        principals: state.principal_repo(),
    };
    let users = usecase.execute().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

// ── POST /api/admin/users ────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: Role,
}

pub async fn create_user(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<impl IntoResponse, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = CreateStaffUseCase {
        principals: state.principal_repo(),
    };
    let principal = usecase
        .execute(CreateStaffInput {
            email: body.email,
            password: body.password,
            name: body.name,
            role: body.role,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(principal))))
}

// ── PUT /api/admin/users/{id} ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    /// `null` or `""` clears the card.
    #[serde(default, deserialize_with = "double_option")]
    pub id_card_number: Option<Option<String>>,
}

pub async fn update_user(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = UpdateUserUseCase {
        principals: state.principal_repo(),
    };
    let principal = usecase
        .execute(
            id,
            UpdateUserInput {
                name: body.name,
                email: body.email,
                password: body.password,
                department: body.department,
                student_id: body.student_id,
                id_card_number: body.id_card_number,
            },
        )
        .await?;
    Ok(Json(principal.into()))
}

// ── DELETE /api/admin/users/{id} ─────────────────────────────────────────────

pub async fn delete_user(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = DeleteUserUseCase {
        principals: state.principal_repo(),
    };
    usecase.execute(session.principal_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── GET /api/admin/meal-plans ────────────────────────────────────────────────

pub async fn list_meal_plans(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<MealPlanResponse>>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = ListMealPlansUseCase {
        plans: state.meal_plan_repo(),
    };
    let plans = usecase.execute().await?;
    Ok(Json(
        plans
            .into_iter()
            .map(|p| MealPlanResponse {
                count: Some(EnrollmentCount {
                    enrollments: p.enrollment_count,
                }),
                ..MealPlanResponse::from(p.plan)
            })
            .collect(),
    ))
}

// ── POST /api/admin/meal-plans ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealPlanRequest {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub meal_count: i32,
    pub duration_days: i32,
    pub is_active: Option<bool>,
}

pub async fn create_meal_plan(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateMealPlanRequest>,
) -> Result<impl IntoResponse, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = CreateMealPlanUseCase {
        plans: state.meal_plan_repo(),
    };
    let plan = usecase
        .execute(CreateMealPlanInput {
            name: body.name,
            description: body.description,
            price: body.price,
            meal_count: body.meal_count,
            duration_days: body.duration_days,
            is_active: body.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(MealPlanResponse::from(plan))))
}

// ── PUT /api/admin/meal-plans/{id} ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMealPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub meal_count: Option<i32>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

pub async fn update_meal_plan(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    JsonBody(body): JsonBody<UpdateMealPlanRequest>,
) -> Result<Json<MealPlanResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = UpdateMealPlanUseCase {
        plans: state.meal_plan_repo(),
    };
    let plan = usecase
        .execute(
            id,
            MealPlanChanges {
                name: body.name,
                description: body.description,
                price: body.price,
                meal_count: body.meal_count,
                duration_days: body.duration_days,
                is_active: body.is_active,
            },
        )
        .await?;
    Ok(Json(plan.into()))
}

// ── DELETE /api/admin/meal-plans/{id} ────────────────────────────────────────

pub async fn delete_meal_plan(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = DeleteMealPlanUseCase {
        plans: state.meal_plan_repo(),
    };
    usecase.execute(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── GET /api/admin/enrollments ───────────────────────────────────────────────

pub async fn list_enrollments(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrollmentResponse>>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = ListEnrollmentsUseCase {
        entitlements: state.entitlement_repo(),
    };
    let enrollments = usecase.execute().await?;
    Ok(Json(
        enrollments
            .into_iter()
            .map(|v| EnrollmentResponse::new(v.enrollment, Some(v.student), Some(v.plan)))
            .collect(),
    ))
}

// ── POST /api/admin/enrollments ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    /// Principal id of the student.
    pub student_id: Uuid,
    pub meal_plan_id: Uuid,
}

pub async fn create_enrollment(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = CreateEnrollmentUseCase {
        principals: state.principal_repo(),
        entitlements: state.entitlement_repo(),
        plans: state.meal_plan_repo(),
    };
    let view = usecase.execute(body.student_id, body.meal_plan_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollmentResponse::new(
            view.enrollment,
            Some(view.student),
            Some(view.plan),
        )),
    ))
}

// ── POST /api/admin/enrollments/{id}/deactivate ──────────────────────────────

pub async fn deactivate_enrollment(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EnrollmentResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = DeactivateEnrollmentUseCase {
        entitlements: state.entitlement_repo(),
    };
    let enrollment = usecase.execute(id).await?;
    Ok(Json(EnrollmentResponse::new(enrollment, None, None)))
}

// ── GET /api/admin/meals ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AdminMealsQuery {
    pub status: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub async fn list_meals(
    session: Session,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<AdminMealsQuery>,
) -> Result<Json<MealHistoryResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let status = status_filter(query.status.as_deref())?;
    let defaults = Page::default();
    let page = Page::new(
        query.limit.unwrap_or(defaults.limit),
        query.offset.unwrap_or(defaults.offset),
    );
    let usecase = ListMealsUseCase {
        meals: state.meal_record_repo(),
    };
    let out = usecase.execute(status, None, page).await?;
    Ok(Json(MealHistoryResponse {
        meals: out.meals.into_iter().map(MealRecordResponse::from).collect(),
        total: out.total,
        limit: out.page.limit,
        offset: out.page.offset,
    }))
}

// ── GET /api/admin/stats ─────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatsResponse {
    pub total_users: u64,
    pub total_students: u64,
    pub total_managers: u64,
    pub total_admins: u64,
    pub total_tokens: u64,
    pub today_meals: u64,
    pub pending_approvals: u64,
    pub active_managers: u64,
    pub active_meal_plans: u64,
    pub fraud_alerts: u64,
}

pub async fn stats(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<AdminStatsResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = AdminStatsUseCase {
        principals: state.principal_repo(),
        entitlements: state.entitlement_repo(),
        plans: state.meal_plan_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let s = usecase.execute().await?;
    Ok(Json(AdminStatsResponse {
        total_users: s.total_users,
        total_students: s.total_students,
        total_managers: s.total_managers,
        total_admins: s.total_admins,
        total_tokens: s.total_tokens,
        today_meals: s.today_meals,
        pending_approvals: s.pending_approvals,
        active_managers: s.active_managers,
        active_meal_plans: s.active_meal_plans,
        fraud_alerts: s.fraud_alerts,
    }))
}

// ── GET /api/admin/reports ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ReportQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub date: Option<String>,
}

#[derive(Serialize)]
pub struct PeriodResponse {
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub start: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub end: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatsResponse {
    pub total_meals: u64,
    pub approved_meals: u64,
    pub denied_meals: u64,
    pub pending_meals: u64,
    pub active_students: u64,
    pub fraud_attempts: u64,
}

#[derive(Serialize)]
pub struct ReportResponse {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub date: String,
    pub period: PeriodResponse,
    pub stats: ReportStatsResponse,
}

pub async fn report(
    session: Session,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ReportQuery>,
) -> Result<Json<ReportResponse>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = ReportUseCase {
        entitlements: state.entitlement_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let r = usecase
        .execute(query.kind.as_deref(), query.date.as_deref())
        .await?;
    Ok(Json(ReportResponse {
        kind: r.kind.as_str(),
        date: r.date,
        period: PeriodResponse {
            start: r.period.start,
            end: r.period.end,
        },
        stats: ReportStatsResponse {
            total_meals: r.stats.total_meals,
            approved_meals: r.stats.approved_meals,
            denied_meals: r.stats.denied_meals,
            pending_meals: r.stats.pending_meals,
            active_students: r.stats.active_students,
            fraud_attempts: r.stats.fraud_attempts,
        },
    }))
}

// ── GET /api/admin/fraud-alerts ──────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertMealRef {
    pub id: Uuid,
    pub status: MealStatus,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub requested_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// School-issued student id, `N/A` when unknown.
    pub student_id: String,
    pub student_name: String,
    pub description: String,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms_opt")]
    pub timestamp: Option<DateTime<Utc>>,
    pub reviewed: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_record_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_records: Option<Vec<AlertMealRef>>,
}

fn alert_response(index: usize, alert: Alert) -> AlertResponse {
    let timestamp = alert.timestamp();
    match alert {
        Alert::DeniedMeal(view) => AlertResponse {
            id: view.record.id.to_string(),
            kind: "DENIED_MEAL",
            student_id: view.student.student_id.unwrap_or_else(|| "N/A".into()),
            student_name: view.student.name,
            description: view
                .record
                .denied_reason
                .unwrap_or_else(|| "Meal request was denied".into()),
            timestamp,
            reviewed: false,
            status: "PENDING",
            meal_record_id: Some(view.record.id),
            meal_records: None,
        },
        Alert::DoubleServing { student, records } => AlertResponse {
            id: format!("double-{index}"),
            kind: "DOUBLE_SERVING",
            student_id: student.student_id.unwrap_or_else(|| "N/A".into()),
            student_name: student.name,
            description: format!(
                "Multiple meal requests detected for the same day ({} requests)",
                records.len()
            ),
            timestamp,
            reviewed: false,
            status: "PENDING",
            meal_record_id: None,
            meal_records: Some(
                records
                    .into_iter()
                    .map(|v| AlertMealRef {
                        id: v.record.id,
                        status: v.record.status,
                        requested_at: v.record.requested_at,
                    })
                    .collect(),
            ),
        },
    }
}

pub async fn fraud_alerts(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertResponse>>, DiningError> {
    require(&session, Role::Admin)?;
    let usecase = FraudAlertsUseCase {
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let alerts = usecase.execute().await?;
    let mut doubles = 0;
    let body = alerts
        .into_iter()
        .map(|alert| {
            let index = match alert {
                Alert::DeniedMeal(_) => 0,
                Alert::DoubleServing { .. } => {
                    doubles += 1;
                    doubles - 1
                }
            };
            alert_response(index, alert)
        })
        .collect();
    Ok(Json(body))
}
