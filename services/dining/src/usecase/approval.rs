use chrono::{FixedOffset, Utc};
use uuid::Uuid;

use canteen_domain::calendar::day_window;
use canteen_domain::meal::{MealStatus, MealTransition};

use crate::domain::repository::MealRecordRepository;
use crate::domain::types::{Decision, MealRecord};
use crate::error::DiningError;

// ── Decide ───────────────────────────────────────────────────────────────────

pub struct DecideMealInput {
    pub meal_id: Uuid,
    pub approved: bool,
    pub reason: Option<String>,
}

/// Manager approval or denial of a PENDING record.
pub struct DecideMealUseCase<M: MealRecordRepository> {
    pub meals: M,
    pub offset: FixedOffset,
}

impl<M: MealRecordRepository> DecideMealUseCase<M> {
    pub async fn execute(
        &self,
        manager_id: Uuid,
        input: DecideMealInput,
    ) -> Result<MealRecord, DiningError> {
        let record = self
            .meals
            .find_by_id(input.meal_id)
            .await?
            .ok_or(DiningError::MealRecordNotFound)?;

        let (transition, decision) = if input.approved {
            (MealTransition::Approve, Decision::Approve)
        } else {
            (
                MealTransition::Deny,
                Decision::Deny {
                    reason: input.reason,
                },
            )
        };
        // Fast rejection; the repository enforces the same rule atomically.
        record
            .status
            .apply(transition)
            .map_err(|_| DiningError::AlreadyProcessed)?;

        let now = Utc::now();
        let today = day_window(now, self.offset);
        let updated = self
            .meals
            .finalize(record.id, &decision, manager_id, now, today)
            .await?;
        tracing::info!(
            meal = %updated.id,
            student = %updated.student_id,
            status = %updated.status,
            manager = %manager_id,
            "meal decided"
        );
        Ok(updated)
    }
}

// ── Complete ─────────────────────────────────────────────────────────────────

/// APPROVED -> COMPLETED once the meal is handed over.
pub struct CompleteMealUseCase<M: MealRecordRepository> {
    pub meals: M,
}

impl<M: MealRecordRepository> CompleteMealUseCase<M> {
    pub async fn execute(&self, meal_id: Uuid) -> Result<MealRecord, DiningError> {
        let record = self
            .meals
            .find_by_id(meal_id)
            .await?
            .ok_or(DiningError::MealRecordNotFound)?;
        if record.status.apply(MealTransition::Complete) != Ok(MealStatus::Completed) {
            return Err(DiningError::AlreadyProcessed);
        }
        self.meals.complete(meal_id).await
    }
}
