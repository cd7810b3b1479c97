use uuid::Uuid;

use canteen_domain::meal::MealStatus;
use canteen_domain::pagination::Page;

use crate::domain::repository::{EntitlementRepository, MealRecordRepository};
use crate::domain::types::{MealQuery, MealRecordView, SortOrder, Token};
use crate::error::DiningError;

/// Manager listings are capped at this many records.
pub const MANAGER_LIST_LIMIT: u64 = 100;
pub const RECENT_MEALS_LIMIT: u64 = 10;

/// One page of meal records plus the unpaged total.
#[derive(Debug)]
pub struct MealPage {
    pub meals: Vec<MealRecordView>,
    pub total: u64,
    pub page: Page,
}

// ── Paged listings (admin, student history) ─────────────────────────────────

pub struct ListMealsUseCase<M: MealRecordRepository> {
    pub meals: M,
}

impl<M: MealRecordRepository> ListMealsUseCase<M> {
    /// Newest first. `status: None` lists every status.
    pub async fn execute(
        &self,
        status: Option<MealStatus>,
        student_id: Option<Uuid>,
        page: Page,
    ) -> Result<MealPage, DiningError> {
        let page = page.clamped();
        let query = MealQuery {
            statuses: status.into_iter().collect(),
            student_id,
            ..Default::default()
        };
        let meals = self
            .meals
            .list(&query, SortOrder::NewestFirst, Some(page))
            .await?;
        let total = self.meals.count(&query).await?;
        Ok(MealPage { meals, total, page })
    }
}

// ── Manager queue ────────────────────────────────────────────────────────────

pub struct PendingMealsUseCase<M: MealRecordRepository> {
    pub meals: M,
}

impl<M: MealRecordRepository> PendingMealsUseCase<M> {
    /// Oldest request first so the queue is served in order.
    pub async fn execute(&self) -> Result<Vec<MealRecordView>, DiningError> {
        self.meals
            .list(
                &MealQuery::with_status(MealStatus::Pending),
                SortOrder::OldestFirst,
                None,
            )
            .await
    }
}

/// Fixed-size newest-first listing: manager meals and student recent meals.
pub struct LatestMealsUseCase<M: MealRecordRepository> {
    pub meals: M,
}

impl<M: MealRecordRepository> LatestMealsUseCase<M> {
    pub async fn execute(
        &self,
        query: MealQuery,
        limit: u64,
    ) -> Result<Vec<MealRecordView>, DiningError> {
        self.meals
            .list(&query, SortOrder::NewestFirst, Some(Page::new(limit, 0)))
            .await
    }
}

// ── Student tokens ───────────────────────────────────────────────────────────

pub struct StudentTokensUseCase<E: EntitlementRepository> {
    pub entitlements: E,
}

impl<E: EntitlementRepository> StudentTokensUseCase<E> {
    pub async fn execute(&self, student_id: Uuid) -> Result<Vec<Token>, DiningError> {
        self.entitlements.list_tokens(student_id).await
    }
}
