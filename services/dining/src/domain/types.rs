use chrono::{DateTime, Utc};
use uuid::Uuid;

use canteen_domain::calendar::Window;
use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::role::Role;
use canteen_domain::token::TokenStatus;

/// Verification attributes and documents owned by a student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentProfile {
    pub student_id: String,
    pub department: Option<String>,
    /// `data:<mime>;base64,...`
    pub photo: Option<String>,
    pub id_card: Option<String>,
    pub face_id: Option<String>,
    pub id_card_number: Option<String>,
    pub pin: Option<String>,
    pub enrolled_at: DateTime<Utc>,
}

/// What kind of principal an account is. Only students carry a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalKind {
    Admin,
    Manager,
    Student(StudentProfile),
}

/// Any account that can hold a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub kind: PrincipalKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Principal {
    pub fn role(&self) -> Role {
        match self.kind {
            PrincipalKind::Admin => Role::Admin,
            PrincipalKind::Manager => Role::Manager,
            PrincipalKind::Student(_) => Role::Student,
        }
    }

    pub fn student(&self) -> Option<&StudentProfile> {
        match &self.kind {
            PrincipalKind::Student(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn summary(&self) -> StudentSummary {
        StudentSummary {
            id: self.id,
            name: self.name.clone(),
            student_id: self.student().map(|p| p.student_id.clone()),
            email: self.email.clone(),
        }
    }
}

/// Identity fields shown next to meal records and enrollments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub student_id: Option<String>,
    pub email: String,
}

/// Admin edit of any principal. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PrincipalChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub department: Option<String>,
    pub student_id: Option<String>,
    /// `Some(None)` clears the card.
    pub id_card_number: Option<Option<String>>,
}

/// Student self-service edit of verification attributes.
#[derive(Debug, Clone, Default)]
pub struct CredentialChanges {
    pub id_card_number: Option<String>,
    pub pin: Option<String>,
    pub face_id: Option<String>,
}

/// A single prepaid meal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: Uuid,
    pub student_id: Uuid,
    pub token_number: String,
    pub status: TokenStatus,
    pub purchased_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    /// ACTIVE and not past `expires_at`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == TokenStatus::Active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub meal_count: i32,
    pub duration_days: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MealPlanWithCount {
    pub plan: MealPlan,
    pub enrollment_count: u64,
}

/// Partial meal plan edit.
#[derive(Debug, Clone, Default)]
pub struct MealPlanChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub meal_count: Option<i32>,
    pub duration_days: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub id: Uuid,
    pub student_id: Uuid,
    pub meal_plan_id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub meals_remaining: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Enrollment joined with its student and plan for admin listings.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentView {
    pub enrollment: Enrollment,
    pub student: StudentSummary,
    pub plan: MealPlan,
}

/// Which entitlement a meal record will consume. At most one per record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntitlementRef {
    Token(Uuid),
    Enrollment(Uuid),
}

/// Entitlement found for a student at verification time.
#[derive(Debug, Clone, PartialEq)]
pub enum Entitlement {
    Token(Token),
    Enrollment(Enrollment, MealPlan),
}

impl Entitlement {
    pub fn reference(&self) -> EntitlementRef {
        match self {
            Self::Token(t) => EntitlementRef::Token(t.id),
            Self::Enrollment(e, _) => EntitlementRef::Enrollment(e.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealRecord {
    pub id: Uuid,
    pub student_id: Uuid,
    pub entitlement: Option<EntitlementRef>,
    pub status: MealStatus,
    pub verification_method: VerificationMethod,
    pub requested_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub denied_reason: Option<String>,
    pub approved_by: Option<Uuid>,
}

impl MealRecord {
    pub fn pending(
        student_id: Uuid,
        entitlement: EntitlementRef,
        method: VerificationMethod,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            student_id,
            entitlement: Some(entitlement),
            status: MealStatus::Pending,
            verification_method: method,
            requested_at: now,
            approved_at: None,
            completed_at: None,
            denied_reason: None,
            approved_by: None,
        }
    }

    pub fn token_id(&self) -> Option<Uuid> {
        match self.entitlement {
            Some(EntitlementRef::Token(id)) => Some(id),
            _ => None,
        }
    }

    pub fn enrollment_id(&self) -> Option<Uuid> {
        match self.entitlement {
            Some(EntitlementRef::Enrollment(id)) => Some(id),
            _ => None,
        }
    }
}

/// Meal record with the labels listings display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MealRecordView {
    pub record: MealRecord,
    pub student: StudentSummary,
    pub token_number: Option<String>,
    pub meal_plan_name: Option<String>,
}

/// Manager decision on a PENDING record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny { reason: Option<String> },
}

/// Filter shared by meal record listings and counts. Unset fields match all.
#[derive(Debug, Clone, Default)]
pub struct MealQuery {
    /// Empty matches every status.
    pub statuses: Vec<MealStatus>,
    pub student_id: Option<Uuid>,
    pub requested_in: Option<Window>,
    pub approved_in: Option<Window>,
    pub completed_in: Option<Window>,
}

impl MealQuery {
    pub fn with_status(status: MealStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    pub fn served() -> Self {
        Self {
            statuses: MealStatus::SERVED.to_vec(),
            ..Default::default()
        }
    }

    pub fn matches(&self, record: &MealRecord) -> bool {
        fn within(window: &Option<Window>, at: Option<DateTime<Utc>>) -> bool {
            match window {
                None => true,
                Some(w) => at.is_some_and(|at| w.contains(at)),
            }
        }
        (self.statuses.is_empty() || self.statuses.contains(&record.status))
            && self.student_id.is_none_or(|id| id == record.student_id)
            && within(&self.requested_in, Some(record.requested_at))
            && within(&self.approved_in, record.approved_at)
            && within(&self.completed_in, record.completed_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}
