use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use canteen_dining::domain::types::{EntitlementRef, MealRecord};
use canteen_dining::usecase::alert::{Alert, FraudAlertsUseCase};
use canteen_dining::usecase::meal::{ListMealsUseCase, PendingMealsUseCase};
use canteen_dining::usecase::report::{
    AdminStatsUseCase, ManagerStatsUseCase, PublicStatsUseCase, ReportKind, ReportUseCase,
    StudentStatsUseCase,
};
use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::pagination::Page;
use canteen_domain::role::Role;
use canteen_domain::token::TokenStatus;

use crate::helpers::{MemoryDb, enrollment, plan, served_meal, staff, student, token, utc};

fn pending(student_id: Uuid, minutes_ago: i64) -> MealRecord {
    MealRecord::pending(
        student_id,
        EntitlementRef::Token(Uuid::now_v7()),
        VerificationMethod::Face,
        Utc::now() - TimeDelta::minutes(minutes_ago),
    )
}

fn denied(student_id: Uuid) -> MealRecord {
    let now = Utc::now();
    MealRecord {
        status: MealStatus::Denied,
        approved_at: Some(now),
        denied_reason: Some("face mismatch".into()),
        ..MealRecord::pending(
            student_id,
            EntitlementRef::Token(Uuid::now_v7()),
            VerificationMethod::Face,
            now,
        )
    }
}

/// Two students, one served today, one denied, one pending, one served
/// last week.
fn campus() -> (MemoryDb, Uuid, Uuid) {
    let ana = student("S-100");
    let ben = student("S-200");
    let monthly = plan("Monthly", 20, 30);
    let mut used = token(ben.id, "TKN-0002");
    used.status = TokenStatus::Used;
    let db = MemoryDb::new()
        .with_principal(staff(Role::Admin, "admin@campus.test"))
        .with_principal(staff(Role::Manager, "chef@campus.test"))
        .with_token(token(ana.id, "TKN-0001"))
        .with_token(used)
        .with_enrollment(enrollment(ben.id, &monthly, 10))
        .with_plan(monthly)
        .with_plan(plan("Weekly", 7, 7))
        .with_meal(served_meal(ana.id, Utc::now()))
        .with_meal(served_meal(ana.id, Utc::now() - TimeDelta::days(8)))
        .with_meal(denied(ben.id))
        .with_meal(pending(ben.id, 5))
        .with_principal(ana.clone())
        .with_principal(ben.clone());
    (db, ana.id, ben.id)
}

// ── Dashboards ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_compute_admin_stats() {
    let (db, _, _) = campus();
    let stats = AdminStatsUseCase {
        principals: db.clone(),
        entitlements: db.clone(),
        plans: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
    .execute()
    .await
    .unwrap();

    assert_eq!(stats.total_users, 4);
    assert_eq!(stats.total_students, 2);
    assert_eq!(stats.total_managers, 1);
    assert_eq!(stats.total_admins, 1);
    assert_eq!(stats.total_tokens, 1);
    assert_eq!(stats.today_meals, 1);
    assert_eq!(stats.pending_approvals, 1);
    assert_eq!(stats.active_managers, 1);
    assert_eq!(stats.active_meal_plans, 2);
    assert_eq!(stats.fraud_alerts, 1);
}

#[tokio::test]
async fn should_compute_manager_stats() {
    let (db, _, _) = campus();
    let stats = ManagerStatsUseCase {
        meals: db.clone(),
        offset: utc(),
    }
    .execute()
    .await
    .unwrap();

    assert_eq!(stats.pending, 1);
    assert_eq!(stats.today_approved, 1);
    assert_eq!(stats.today_denied, 1);
}

#[tokio::test]
async fn should_compute_student_stats() {
    let (db, ana, ben) = campus();
    let usecase = StudentStatsUseCase {
        entitlements: db.clone(),
        meals: db.clone(),
        offset: utc(),
    };

    let stats = usecase.execute(ana).await.unwrap();
    assert_eq!(stats.active_tokens, 1);
    assert_eq!(stats.active_enrollments, 0);
    assert_eq!(stats.today_meals, 1);

    let stats = usecase.execute(ben).await.unwrap();
    assert_eq!(stats.active_tokens, 0);
    assert_eq!(stats.active_enrollments, 1);
    assert_eq!(stats.today_meals, 0);
}

#[tokio::test]
async fn should_compute_public_stats() {
    let (db, _, _) = campus();
    let stats = PublicStatsUseCase {
        principals: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
    .execute()
    .await
    .unwrap();

    assert_eq!(stats.online_users, 2);
    assert_eq!(stats.active_meals, 1);
    assert_eq!(stats.pending_requests, 1);
    assert_eq!(stats.total_meals, 2);
}

// ── Reports ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_build_daily_report_for_today() {
    let (db, _, _) = campus();
    let report = ReportUseCase {
        entitlements: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
    .execute(None, None)
    .await
    .unwrap();

    assert_eq!(report.kind, ReportKind::Daily);
    assert_eq!(report.date, Utc::now().format("%Y-%m-%d").to_string());
    assert_eq!(report.stats.total_meals, 3);
    assert_eq!(report.stats.approved_meals, 1);
    assert_eq!(report.stats.denied_meals, 1);
    assert_eq!(report.stats.pending_meals, 1);
    assert_eq!(report.stats.active_students, 1);
    assert_eq!(report.stats.fraud_attempts, report.stats.denied_meals);
}

#[tokio::test]
async fn should_build_empty_report_for_quiet_day() {
    let (db, _, _) = campus();
    let report = ReportUseCase {
        entitlements: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
    .execute(Some("daily"), Some("2001-01-01"))
    .await
    .unwrap();

    assert_eq!(report.date, "2001-01-01");
    assert_eq!(report.stats.total_meals, 0);
    assert_eq!(report.stats.approved_meals, 0);
}

// ── Alerts ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_flag_denied_meals_and_repeat_requests() {
    let (db, _, ben) = campus();
    let alerts = FraudAlertsUseCase {
        meals: db.clone(),
        offset: utc(),
    }
    .execute()
    .await
    .unwrap();

    assert_eq!(alerts.len(), 2);
    assert!(matches!(&alerts[0], Alert::DeniedMeal(view) if view.student.id == ben));
    match &alerts[1] {
        Alert::DoubleServing { student, records } => {
            assert_eq!(student.id, ben);
            assert_eq!(records.len(), 2);
        }
        other => panic!("expected DoubleServing, got {other:?}"),
    }
}

// ── Listings ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_serve_pending_queue_oldest_first() {
    let ana = student("S-100");
    let older = pending(ana.id, 30);
    let newer = pending(ana.id, 2);
    let db = MemoryDb::new()
        .with_meal(newer.clone())
        .with_meal(older.clone())
        .with_principal(ana);

    let queue = PendingMealsUseCase { meals: db }.execute().await.unwrap();

    let ids: Vec<Uuid> = queue.iter().map(|v| v.record.id).collect();
    assert_eq!(ids, [older.id, newer.id]);
    assert_eq!(queue[0].student.student_id.as_deref(), Some("S-100"));
}

#[tokio::test]
async fn should_page_history_with_unpaged_total() {
    let ana = student("S-100");
    let mut db = MemoryDb::new();
    for minutes in 1..=5 {
        db = db.with_meal(pending(ana.id, minutes));
    }
    let db = db.with_principal(ana.clone());

    let page = ListMealsUseCase { meals: db }
        .execute(None, Some(ana.id), Page::new(2, 1))
        .await
        .unwrap();

    assert_eq!(page.total, 5);
    assert_eq!(page.meals.len(), 2);
    assert!(page.meals[0].record.requested_at > page.meals[1].record.requested_at);
}

#[tokio::test]
async fn should_clamp_oversized_page() {
    let page = ListMealsUseCase {
        meals: MemoryDb::new(),
    }
    .execute(Some(MealStatus::Denied), None, Page::new(5000, 0))
    .await
    .unwrap();
    assert_eq!(page.page.limit, 100);
    assert_eq!(page.total, 0);
}
