use chrono::Utc;
use uuid::Uuid;

use crate::domain::repository::MealPlanRepository;
use crate::domain::types::{MealPlan, MealPlanChanges, MealPlanWithCount};
use crate::domain::validate::Violations;
use crate::error::DiningError;

fn check_changes(changes: &MealPlanChanges) -> Result<(), DiningError> {
    let mut v = Violations::new();
    v.check(
        changes.name.as_deref().is_none_or(|n| !n.trim().is_empty()),
        "name",
        "must not be empty",
    )
    .check(
        changes.price.is_none_or(|p| p.is_finite() && p > 0.0),
        "price",
        "must be positive",
    )
    .check(
        changes.meal_count.is_none_or(|c| c > 0),
        "mealCount",
        "must be a positive integer",
    )
    .check(
        changes.duration_days.is_none_or(|d| d > 0),
        "durationDays",
        "must be a positive integer",
    );
    v.into_result()
}

// ── List ─────────────────────────────────────────────────────────────────────

pub struct ListMealPlansUseCase<R: MealPlanRepository> {
    pub plans: R,
}

impl<R: MealPlanRepository> ListMealPlansUseCase<R> {
    pub async fn execute(&self) -> Result<Vec<MealPlanWithCount>, DiningError> {
        self.plans.list_with_counts().await
    }
}

// ── Create ───────────────────────────────────────────────────────────────────

pub struct CreateMealPlanInput {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub meal_count: i32,
    pub duration_days: i32,
    pub is_active: Option<bool>,
}

pub struct CreateMealPlanUseCase<R: MealPlanRepository> {
    pub plans: R,
}

impl<R: MealPlanRepository> CreateMealPlanUseCase<R> {
    pub async fn execute(&self, input: CreateMealPlanInput) -> Result<MealPlan, DiningError> {
        check_changes(&MealPlanChanges {
            name: Some(input.name.clone()),
            price: Some(input.price),
            meal_count: Some(input.meal_count),
            duration_days: Some(input.duration_days),
            ..Default::default()
        })?;
        let now = Utc::now();
        let plan = MealPlan {
            id: Uuid::now_v7(),
            name: input.name.trim().to_owned(),
            description: input.description,
            price: input.price,
            meal_count: input.meal_count,
            duration_days: input.duration_days,
            is_active: input.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };
        self.plans.create(&plan).await?;
        Ok(plan)
    }
}

// ── Update ───────────────────────────────────────────────────────────────────

pub struct UpdateMealPlanUseCase<R: MealPlanRepository> {
    pub plans: R,
}

impl<R: MealPlanRepository> UpdateMealPlanUseCase<R> {
    /// Existing enrollments keep their counters and active flag.
    pub async fn execute(&self, id: Uuid, changes: MealPlanChanges) -> Result<MealPlan, DiningError> {
        check_changes(&changes)?;
        let mut plan = self
            .plans
            .find_by_id(id)
            .await?
            .ok_or(DiningError::MealPlanNotFound)?;

        if let Some(name) = changes.name {
            plan.name = name.trim().to_owned();
        }
        if let Some(description) = changes.description {
            plan.description = Some(description);
        }
        if let Some(price) = changes.price {
            plan.price = price;
        }
        if let Some(meal_count) = changes.meal_count {
            plan.meal_count = meal_count;
        }
        if let Some(duration_days) = changes.duration_days {
            plan.duration_days = duration_days;
        }
        if let Some(is_active) = changes.is_active {
            plan.is_active = is_active;
        }
        plan.updated_at = Utc::now();

        self.plans.save(&plan).await?;
        Ok(plan)
    }
}

// ── Delete ───────────────────────────────────────────────────────────────────

pub struct DeleteMealPlanUseCase<R: MealPlanRepository> {
    pub plans: R,
}

impl<R: MealPlanRepository> DeleteMealPlanUseCase<R> {
    pub async fn execute(&self, id: Uuid) -> Result<(), DiningError> {
        if !self.plans.delete(id).await? {
            return Err(DiningError::MealPlanNotFound);
        }
        Ok(())
    }
}
