//! Response bodies shared by several route groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::role::Role;
use canteen_domain::token::TokenStatus;

use crate::domain::types::{
    Enrollment, MealPlan, MealRecord, MealRecordView, Principal, StudentSummary, Token,
};

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub student_id: Option<String>,
}

impl From<StudentSummary> for StudentRef {
    fn from(s: StudentSummary) -> Self {
        Self {
            id: s.id,
            name: s.name,
            email: s.email,
            student_id: s.student_id,
        }
    }
}

/// The principal as carried by login, register and session responses.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub student_id: Option<String>,
}

impl From<&Principal> for SessionUser {
    fn from(p: &Principal) -> Self {
        Self {
            id: p.id,
            email: p.email.clone(),
            name: p.name.clone(),
            role: p.role(),
            student_id: p.student().map(|s| s.student_id.clone()),
        }
    }
}

/// Full principal as seen by admins. Student fields are `null` for staff.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub id_card_number: Option<String>,
    pub face_id: Option<String>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
}

impl From<Principal> for UserResponse {
    fn from(p: Principal) -> Self {
        let role = p.role();
        let profile = p.student().cloned();
        Self {
            id: p.id,
            email: p.email,
            name: p.name,
            role,
            student_id: profile.as_ref().map(|s| s.student_id.clone()),
            department: profile.as_ref().and_then(|s| s.department.clone()),
            id_card_number: profile.as_ref().and_then(|s| s.id_card_number.clone()),
            face_id: profile.and_then(|s| s.face_id),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub id: Uuid,
    pub token_number: String,
    pub status: TokenStatus,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub purchased_at: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms_opt")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Token> for TokenResponse {
    fn from(t: Token) -> Self {
        Self {
            id: t.id,
            token_number: t.token_number,
            status: t.status,
            purchased_at: t.purchased_at,
            expires_at: t.expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct EnrollmentCount {
    pub enrollments: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub meal_count: i32,
    pub duration_days: i32,
    pub is_active: bool,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "_count", skip_serializing_if = "Option::is_none")]
    pub count: Option<EnrollmentCount>,
}

impl From<MealPlan> for MealPlanResponse {
    fn from(p: MealPlan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            meal_count: p.meal_count,
            duration_days: p.duration_days,
            is_active: p.is_active,
            created_at: p.created_at,
            updated_at: p.updated_at,
            count: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub meal_plan_id: Uuid,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub start_date: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub end_date: DateTime<Utc>,
    pub meals_remaining: i32,
    pub is_active: bool,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_plan: Option<MealPlanResponse>,
}

impl EnrollmentResponse {
    pub fn new(e: Enrollment, student: Option<StudentSummary>, plan: Option<MealPlan>) -> Self {
        Self {
            id: e.id,
            student_id: e.student_id,
            meal_plan_id: e.meal_plan_id,
            start_date: e.start_date,
            end_date: e.end_date,
            meals_remaining: e.meals_remaining,
            is_active: e.is_active,
            created_at: e.created_at,
            student: student.map(StudentRef::from),
            meal_plan: plan.map(MealPlanResponse::from),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRef {
    pub token_number: String,
}

#[derive(Serialize)]
pub struct PlanName {
    pub name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRef {
    pub meal_plan: PlanName,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealRecordResponse {
    pub id: Uuid,
    pub student_id: Uuid,
    pub token_id: Option<Uuid>,
    pub enrollment_id: Option<Uuid>,
    pub status: MealStatus,
    pub verification_method: VerificationMethod,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub requested_at: DateTime<Utc>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms_opt")]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms_opt")]
    pub completed_at: Option<DateTime<Utc>>,
    pub denied_reason: Option<String>,
    pub approved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentRef>,
    pub token: Option<TokenRef>,
    pub enrollment: Option<EnrollmentRef>,
}

impl From<MealRecord> for MealRecordResponse {
    fn from(r: MealRecord) -> Self {
        Self {
            id: r.id,
            student_id: r.student_id,
            token_id: r.token_id(),
            enrollment_id: r.enrollment_id(),
            status: r.status,
            verification_method: r.verification_method,
            requested_at: r.requested_at,
            approved_at: r.approved_at,
            completed_at: r.completed_at,
            denied_reason: r.denied_reason,
            approved_by: r.approved_by,
            student: None,
            token: None,
            enrollment: None,
        }
    }
}

impl From<MealRecordView> for MealRecordResponse {
    fn from(view: MealRecordView) -> Self {
        Self {
            student: Some(view.student.into()),
            token: view.token_number.map(|token_number| TokenRef { token_number }),
            enrollment: view.meal_plan_name.map(|name| EnrollmentRef {
                meal_plan: PlanName { name },
            }),
            ..Self::from(view.record)
        }
    }
}
