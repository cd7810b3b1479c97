use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeDelta, Utc};
use uuid::Uuid;

use canteen_domain::calendar::{Window, day_window, day_window_of, month_window};
use canteen_domain::meal::MealStatus;
use canteen_domain::role::Role;

use crate::domain::repository::{
    EntitlementRepository, MealPlanRepository, MealRecordRepository, PrincipalRepository,
};
use crate::domain::types::MealQuery;
use crate::error::DiningError;

/// Fraud alert lookback for the admin dashboard.
pub const FRAUD_LOOKBACK_DAYS: i64 = 7;

/// `[start, now + 1 day)`; nothing is recorded in the future.
fn since(start: DateTime<Utc>, now: DateTime<Utc>) -> Window {
    Window {
        start,
        end: now + TimeDelta::days(1),
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Daily,
    Monthly,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStats {
    pub total_meals: u64,
    pub approved_meals: u64,
    pub denied_meals: u64,
    pub pending_meals: u64,
    pub active_students: u64,
    pub fraud_attempts: u64,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub kind: ReportKind,
    pub date: String,
    pub period: Window,
    pub stats: ReportStats,
}

/// Resolve `type` and `date` query values into a report window.
/// `date` defaults to the current local day or month.
pub fn report_period(
    kind: Option<&str>,
    date: Option<&str>,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> Result<(ReportKind, String, Window), DiningError> {
    let kind = match kind.unwrap_or("daily") {
        "daily" => ReportKind::Daily,
        "monthly" => ReportKind::Monthly,
        _ => return Err(DiningError::invalid("type", "must be daily or monthly")),
    };
    let local_today = now.with_timezone(&offset).date_naive();
    match kind {
        ReportKind::Daily => {
            let day = match date {
                None => local_today,
                Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|_| DiningError::invalid("date", "expected YYYY-MM-DD"))?,
            };
            let window = day_window_of(day, offset)
                .ok_or_else(|| DiningError::invalid("date", "date out of range"))?;
            Ok((kind, day.format("%Y-%m-%d").to_string(), window))
        }
        ReportKind::Monthly => {
            let (year, month) = match date {
                None => (local_today.year(), local_today.month()),
                Some(raw) => parse_year_month(raw)
                    .ok_or_else(|| DiningError::invalid("date", "expected YYYY-MM"))?,
            };
            let window = month_window(year, month, offset)
                .ok_or_else(|| DiningError::invalid("date", "expected YYYY-MM"))?;
            Ok((kind, format!("{year:04}-{month:02}"), window))
        }
    }
}

fn parse_year_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.split_once('-')?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return None;
    }
    let year = year.parse().ok()?;
    let month = month.parse().ok()?;
    (1..=12).contains(&month).then_some((year, month))
}

pub struct ReportUseCase<E, M>
where
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub entitlements: E,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<E, M> ReportUseCase<E, M>
where
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub async fn execute(&self, kind: Option<&str>, date: Option<&str>) -> Result<Report, DiningError> {
        let (kind, date, period) = report_period(kind, date, Utc::now(), self.offset)?;
        let in_period = |statuses: Vec<MealStatus>| MealQuery {
            statuses,
            requested_in: Some(period),
            ..Default::default()
        };

        let total_meals = self.meals.count(&in_period(vec![])).await?;
        let approved_meals = self
            .meals
            .count(&in_period(MealStatus::SERVED.to_vec()))
            .await?;
        let denied_meals = self.meals.count(&in_period(vec![MealStatus::Denied])).await?;
        let pending_meals = self.meals.count(&in_period(vec![MealStatus::Pending])).await?;
        let active_students = self.entitlements.count_students_with_active_enrollment().await?;

        Ok(Report {
            kind,
            date,
            period,
            stats: ReportStats {
                total_meals,
                approved_meals,
                denied_meals,
                pending_meals,
                active_students,
                fraud_attempts: denied_meals,
            },
        })
    }
}

// ── Admin dashboard ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminStats {
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

pub struct AdminStatsUseCase<P, E, MP, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    MP: MealPlanRepository,
    M: MealRecordRepository,
{
    pub principals: P,
    pub entitlements: E,
    pub plans: MP,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<P, E, MP, M> AdminStatsUseCase<P, E, MP, M>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    MP: MealPlanRepository,
    M: MealRecordRepository,
{
    pub async fn execute(&self) -> Result<AdminStats, DiningError> {
        let now = Utc::now();
        let today = day_window(now, self.offset);

        let total_students = self.principals.count_by_role(Role::Student).await?;
        let total_managers = self.principals.count_by_role(Role::Manager).await?;
        let total_admins = self.principals.count_by_role(Role::Admin).await?;
        let total_tokens = self.entitlements.count_active_tokens(None).await?;
        let today_meals = self
            .meals
            .count(&MealQuery {
                completed_in: Some(today),
                ..MealQuery::served()
            })
            .await?;
        let pending_approvals = self
            .meals
            .count(&MealQuery::with_status(MealStatus::Pending))
            .await?;
        let active_meal_plans = self.plans.count_active().await?;
        let fraud_alerts = self
            .meals
            .count(&MealQuery {
                requested_in: Some(since(now - TimeDelta::days(FRAUD_LOOKBACK_DAYS), now)),
                ..MealQuery::with_status(MealStatus::Denied)
            })
            .await?;

        Ok(AdminStats {
            total_users: total_students + total_managers + total_admins,
            total_students,
            total_managers,
            total_admins,
            total_tokens,
            today_meals,
            pending_approvals,
            // Managers have no presence tracking; every manager counts as active.
            active_managers: total_managers,
            active_meal_plans,
            fraud_alerts,
        })
    }
}

// ── Manager dashboard ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub pending: u64,
    pub today_approved: u64,
    pub today_denied: u64,
}

pub struct ManagerStatsUseCase<M: MealRecordRepository> {
    pub meals: M,
    pub offset: FixedOffset,
}

impl<M: MealRecordRepository> ManagerStatsUseCase<M> {
    pub async fn execute(&self) -> Result<ManagerStats, DiningError> {
        let today = day_window(Utc::now(), self.offset);
        let pending = self
            .meals
            .count(&MealQuery::with_status(MealStatus::Pending))
            .await?;
        let today_approved = self
            .meals
            .count(&MealQuery {
                approved_in: Some(today),
                ..MealQuery::served()
            })
            .await?;
        let today_denied = self
            .meals
            .count(&MealQuery {
                approved_in: Some(today),
                ..MealQuery::with_status(MealStatus::Denied)
            })
            .await?;
        Ok(ManagerStats {
            pending,
            today_approved,
            today_denied,
        })
    }
}

// ── Student dashboard ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentStats {
    pub active_tokens: u64,
    pub active_enrollments: u64,
    pub today_meals: u64,
}

pub struct StudentStatsUseCase<E, M>
where
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub entitlements: E,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<E, M> StudentStatsUseCase<E, M>
where
    E: EntitlementRepository,
    M: MealRecordRepository,
{
    pub async fn execute(&self, student_id: Uuid) -> Result<StudentStats, DiningError> {
        let today = day_window(Utc::now(), self.offset);
        Ok(StudentStats {
            active_tokens: self.entitlements.count_active_tokens(Some(student_id)).await?,
            active_enrollments: self.entitlements.count_usable_enrollments(student_id).await?,
            today_meals: self
                .meals
                .count(&MealQuery {
                    student_id: Some(student_id),
                    completed_in: Some(today),
                    ..MealQuery::served()
                })
                .await?,
        })
    }
}

// ── Public counters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicStats {
    pub online_users: u64,
    pub active_meals: u64,
    pub pending_requests: u64,
    pub total_meals: u64,
}

pub struct PublicStatsUseCase<P, M>
where
    P: PrincipalRepository,
    M: MealRecordRepository,
{
    pub principals: P,
    pub meals: M,
    pub offset: FixedOffset,
}

impl<P, M> PublicStatsUseCase<P, M>
where
    P: PrincipalRepository,
    M: MealRecordRepository,
{
    pub async fn execute(&self) -> Result<PublicStats, DiningError> {
        let today = day_window(Utc::now(), self.offset);
        Ok(PublicStats {
            online_users: self.principals.count_by_role(Role::Student).await?,
            active_meals: self
                .meals
                .count(&MealQuery {
                    completed_in: Some(today),
                    ..MealQuery::served()
                })
                .await?,
            pending_requests: self
                .meals
                .count(&MealQuery::with_status(MealStatus::Pending))
                .await?,
            total_meals: self.meals.count(&MealQuery::served()).await?,
        })
    }
}
