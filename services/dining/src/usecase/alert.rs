use chrono::{DateTime, FixedOffset, Utc};

use canteen_domain::calendar::day_window;
use canteen_domain::meal::MealStatus;
use canteen_domain::pagination::Page;

use crate::domain::repository::MealRecordRepository;
use crate::domain::types::{MealQuery, MealRecordView, SortOrder, StudentSummary};
use crate::error::DiningError;

pub const DENIED_ALERT_LIMIT: u64 = 100;

/// Suspicious activity derived from the ledger on read. Nothing is stored.
#[derive(Debug, Clone)]
pub enum Alert {
    DeniedMeal(MealRecordView),
    /// Several requests by one student today.
    DoubleServing {
        student: StudentSummary,
        records: Vec<MealRecordView>,
    },
}

impl Alert {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DeniedMeal(view) => Some(view.record.requested_at),
            Self::DoubleServing { records, .. } => records.first().map(|r| r.record.requested_at),
        }
    }
}

pub struct FraudAlertsUseCase<M: MealRecordRepository> {
    pub meals: M,
    pub offset: FixedOffset,
}

impl<M: MealRecordRepository> FraudAlertsUseCase<M> {
    pub async fn execute(&self) -> Result<Vec<Alert>, DiningError> {
        let denied = self
            .meals
            .list(
                &MealQuery::with_status(MealStatus::Denied),
                SortOrder::NewestFirst,
                Some(Page::new(DENIED_ALERT_LIMIT, 0)),
            )
            .await?;

        let today = self
            .meals
            .list(
                &MealQuery {
                    requested_in: Some(day_window(Utc::now(), self.offset)),
                    ..Default::default()
                },
                SortOrder::OldestFirst,
                None,
            )
            .await?;

        let mut alerts: Vec<Alert> = denied.into_iter().map(Alert::DeniedMeal).collect();
        alerts.extend(group_repeats(today));
        Ok(alerts)
    }
}

/// Groups records by student, keeping groups with more than one record.
/// Group order follows each student's first record.
fn group_repeats(records: Vec<MealRecordView>) -> Vec<Alert> {
    let mut groups: Vec<(StudentSummary, Vec<MealRecordView>)> = Vec::new();
    for view in records {
        match groups.iter_mut().find(|(s, _)| s.id == view.student.id) {
            Some((_, list)) => list.push(view),
            None => groups.push((view.student.clone(), vec![view])),
        }
    }
    groups
        .into_iter()
        .filter(|(_, list)| list.len() > 1)
        .map(|(student, records)| Alert::DoubleServing { student, records })
        .collect()
}
