use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Dining service error variants.
#[derive(Debug, thiserror::Error)]
pub enum DiningError {
    #[error("authentication required")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("account is not authorized for this role")]
    RoleMismatch,
    #[error("user not found")]
    UserNotFound,
    #[error("student not found")]
    StudentNotFound,
    #[error("meal record not found")]
    MealRecordNotFound,
    #[error("meal plan not found")]
    MealPlanNotFound,
    #[error("enrollment not found")]
    EnrollmentNotFound,
    #[error("invalid input")]
    Validation(Vec<FieldError>),
    #[error("meal record already processed")]
    AlreadyProcessed,
    #[error("already received a meal today")]
    AlreadyServedToday,
    #[error("no active tokens or meal plans")]
    NoEntitlement,
    #[error("meal plan is not active")]
    MealPlanInactive,
    #[error("cannot delete your own account")]
    CannotDeleteSelf,
    #[error("email already registered")]
    EmailTaken,
    #[error("student id already registered")]
    StudentIdTaken,
    #[error("id card already assigned to another student")]
    IdCardTaken,
    #[error("face id already assigned to another student")]
    FaceIdTaken,
    #[error("student already has an active meal plan")]
    ActiveEnrollmentExists,
    #[error("meal plan has enrollments")]
    MealPlanInUse,
    #[error("entitlement already consumed")]
    EntitlementExhausted,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl DiningError {
    /// Shorthand for a single-field validation failure.
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::RoleMismatch => "ROLE_MISMATCH",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::StudentNotFound => "STUDENT_NOT_FOUND",
            Self::MealRecordNotFound => "MEAL_RECORD_NOT_FOUND",
            Self::MealPlanNotFound => "MEAL_PLAN_NOT_FOUND",
            Self::EnrollmentNotFound => "ENROLLMENT_NOT_FOUND",
            Self::Validation(_) => "VALIDATION",
            Self::AlreadyProcessed => "ALREADY_PROCESSED",
            Self::AlreadyServedToday => "ALREADY_SERVED_TODAY",
            Self::NoEntitlement => "NO_ENTITLEMENT",
            Self::MealPlanInactive => "MEAL_PLAN_INACTIVE",
            Self::CannotDeleteSelf => "CANNOT_DELETE_SELF",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::StudentIdTaken => "STUDENT_ID_TAKEN",
            Self::IdCardTaken => "ID_CARD_TAKEN",
            Self::FaceIdTaken => "FACE_ID_TAKEN",
            Self::ActiveEnrollmentExists => "ACTIVE_ENROLLMENT_EXISTS",
            Self::MealPlanInUse => "MEAL_PLAN_IN_USE",
            Self::EntitlementExhausted => "ENTITLEMENT_EXHAUSTED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::RoleMismatch => StatusCode::FORBIDDEN,
            Self::UserNotFound
            | Self::StudentNotFound
            | Self::MealRecordNotFound
            | Self::MealPlanNotFound
            | Self::EnrollmentNotFound => StatusCode::NOT_FOUND,
            Self::Validation(_)
            | Self::AlreadyProcessed
            | Self::AlreadyServedToday
            | Self::NoEntitlement
            | Self::MealPlanInactive
            | Self::CannotDeleteSelf => StatusCode::BAD_REQUEST,
            Self::EmailTaken
            | Self::StudentIdTaken
            | Self::IdCardTaken
            | Self::FaceIdTaken
            | Self::ActiveEnrollmentExists
            | Self::MealPlanInUse
            | Self::EntitlementExhausted => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DiningError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 4xx are expected client errors and already visible in the TraceLayer
        // span; only internal errors carry a chain worth logging.
        if let Self::Internal(ref e) = self {
            tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
        }
        let mut body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        if let Self::Validation(details) = &self {
            body["details"] = serde_json::json!(details);
        }
        (status, axum::Json(body)).into_response()
    }
}
