use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use crate::domain::repository::{EntitlementRepository, MealPlanRepository, PrincipalRepository};
use crate::domain::types::{Enrollment, EnrollmentView, MealPlan};
use crate::error::DiningError;

// ── Create ───────────────────────────────────────────────────────────────────

/// Assign a meal plan to a student.
pub struct CreateEnrollmentUseCase<P, E, MP>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    MP: MealPlanRepository,
{
    pub principals: P,
    pub entitlements: E,
    pub plans: MP,
}

impl<P, E, MP> CreateEnrollmentUseCase<P, E, MP>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    MP: MealPlanRepository,
{
    pub async fn execute(
        &self,
        student_id: Uuid,
        meal_plan_id: Uuid,
    ) -> Result<EnrollmentView, DiningError> {
        let plan = self
            .plans
            .find_by_id(meal_plan_id)
            .await?
            .ok_or(DiningError::MealPlanNotFound)?;
        if !plan.is_active {
            return Err(DiningError::MealPlanInactive);
        }

        let student = self
            .principals
            .find_by_id(student_id)
            .await?
            .filter(|p| p.student().is_some())
            .ok_or(DiningError::StudentNotFound)?;

        let now = Utc::now();
        let enrollment = Enrollment {
            id: Uuid::now_v7(),
            student_id,
            meal_plan_id,
            start_date: now,
            end_date: now + TimeDelta::days(plan.duration_days.into()),
            meals_remaining: plan.meal_count,
            is_active: true,
            created_at: now,
        };
        self.entitlements.create_enrollment(&enrollment).await?;
        tracing::info!(enrollment = %enrollment.id, student = %student_id, plan = %meal_plan_id, "enrollment created");

        Ok(EnrollmentView {
            enrollment,
            student: student.summary(),
            plan,
        })
    }
}

// ── List ─────────────────────────────────────────────────────────────────────

pub struct ListEnrollmentsUseCase<E: EntitlementRepository> {
    pub entitlements: E,
}

impl<E: EntitlementRepository> ListEnrollmentsUseCase<E> {
    pub async fn execute(&self) -> Result<Vec<EnrollmentView>, DiningError> {
        self.entitlements.list_enrollments().await
    }
}

pub struct StudentEnrollmentsUseCase<E: EntitlementRepository> {
    pub entitlements: E,
}

impl<E: EntitlementRepository> StudentEnrollmentsUseCase<E> {
    pub async fn execute(&self, student_id: Uuid) -> Result<Vec<(Enrollment, MealPlan)>, DiningError> {
        self.entitlements.list_student_enrollments(student_id).await
    }
}

// ── Deactivate ───────────────────────────────────────────────────────────────

pub struct DeactivateEnrollmentUseCase<E: EntitlementRepository> {
    pub entitlements: E,
}

impl<E: EntitlementRepository> DeactivateEnrollmentUseCase<E> {
    pub async fn execute(&self, id: Uuid) -> Result<Enrollment, DiningError> {
        self.entitlements
            .deactivate_enrollment(id)
            .await?
            .ok_or(DiningError::EnrollmentNotFound)
    }
}
