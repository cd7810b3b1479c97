use chrono::Utc;
use uuid::Uuid;

use canteen_dining::domain::types::{EntitlementRef, MealRecord};
use canteen_dining::error::DiningError;
use canteen_dining::usecase::approval::{CompleteMealUseCase, DecideMealInput, DecideMealUseCase};
use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::token::TokenStatus;

use crate::helpers::{MemoryDb, enrollment, plan, served_meal, student, token, utc};

fn decide(db: &MemoryDb) -> DecideMealUseCase<MemoryDb> {
    DecideMealUseCase {
        meals: db.clone(),
        offset: utc(),
    }
}

fn approve(meal_id: Uuid) -> DecideMealInput {
    DecideMealInput {
        meal_id,
        approved: true,
        reason: None,
    }
}

fn deny(meal_id: Uuid, reason: &str) -> DecideMealInput {
    DecideMealInput {
        meal_id,
        approved: false,
        reason: Some(reason.into()),
    }
}

fn pending(student_id: Uuid, entitlement: EntitlementRef) -> MealRecord {
    MealRecord::pending(student_id, entitlement, VerificationMethod::Pin, Utc::now())
}

// ── Approve ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_consume_only_referenced_token_on_approval() {
    let ana = student("S-100");
    let used = token(ana.id, "TKN-0001");
    let spare = token(ana.id, "TKN-0002");
    let meal = pending(ana.id, EntitlementRef::Token(used.id));
    let manager = Uuid::now_v7();
    let db = MemoryDb::new()
        .with_token(used.clone())
        .with_token(spare.clone())
        .with_meal(meal.clone())
        .with_principal(ana);

    let record = decide(&db).execute(manager, approve(meal.id)).await.unwrap();

    assert_eq!(record.status, MealStatus::Approved);
    assert_eq!(record.approved_by, Some(manager));
    assert!(record.approved_at.is_some());
    assert_eq!(record.completed_at, record.approved_at);
    assert_eq!(db.token(used.id).status, TokenStatus::Used);
    assert_eq!(db.token(spare.id).status, TokenStatus::Active);
}

#[tokio::test]
async fn should_decrement_enrollment_on_approval() {
    let ana = student("S-100");
    let monthly = plan("Monthly", 30, 30);
    let enr = enrollment(ana.id, &monthly, 12);
    let meal = pending(ana.id, EntitlementRef::Enrollment(enr.id));
    let db = MemoryDb::new()
        .with_enrollment(enr.clone())
        .with_plan(monthly)
        .with_meal(meal.clone())
        .with_principal(ana);

    decide(&db)
        .execute(Uuid::now_v7(), approve(meal.id))
        .await
        .unwrap();

    assert_eq!(db.enrollment(enr.id).meals_remaining, 11);
}

#[tokio::test]
async fn should_fail_approval_when_entitlement_already_consumed() {
    let ana = student("S-100");
    let mut tkn = token(ana.id, "TKN-0001");
    tkn.status = TokenStatus::Used;
    let meal = pending(ana.id, EntitlementRef::Token(tkn.id));
    let db = MemoryDb::new()
        .with_token(tkn)
        .with_meal(meal.clone())
        .with_principal(ana);

    let result = decide(&db).execute(Uuid::now_v7(), approve(meal.id)).await;

    assert!(
        matches!(result, Err(DiningError::EntitlementExhausted)),
        "expected EntitlementExhausted, got {result:?}"
    );
    assert_eq!(db.meal(meal.id).status, MealStatus::Pending);
}

#[tokio::test]
async fn should_refuse_second_approval_on_same_day() {
    let ana = student("S-100");
    let first_token = token(ana.id, "TKN-0001");
    let second_token = token(ana.id, "TKN-0002");
    let first = pending(ana.id, EntitlementRef::Token(first_token.id));
    let second = pending(ana.id, EntitlementRef::Token(second_token.id));
    let db = MemoryDb::new()
        .with_token(first_token.clone())
        .with_token(second_token.clone())
        .with_meal(first.clone())
        .with_meal(second.clone())
        .with_principal(ana);
    let manager = Uuid::now_v7();

    decide(&db).execute(manager, approve(first.id)).await.unwrap();
    let result = decide(&db).execute(manager, approve(second.id)).await;

    assert!(
        matches!(result, Err(DiningError::AlreadyServedToday)),
        "expected AlreadyServedToday, got {result:?}"
    );
    assert_eq!(db.meal(second.id).status, MealStatus::Pending);
    assert_eq!(db.token(second_token.id).status, TokenStatus::Active);
}

#[tokio::test]
async fn should_debit_once_under_concurrent_approvals() {
    let ana = student("S-100");
    let monthly = plan("Monthly", 30, 30);
    let enr = enrollment(ana.id, &monthly, 5);
    let meal = pending(ana.id, EntitlementRef::Enrollment(enr.id));
    let db = MemoryDb::new()
        .with_enrollment(enr.clone())
        .with_plan(monthly)
        .with_meal(meal.clone())
        .with_principal(ana);
    let usecase = decide(&db);

    let (a, b) = tokio::join!(
        usecase.execute(Uuid::now_v7(), approve(meal.id)),
        usecase.execute(Uuid::now_v7(), approve(meal.id)),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(db.enrollment(enr.id).meals_remaining, 4);
}

// ── Deny ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_deny_without_touching_entitlement() {
    let ana = student("S-100");
    let tkn = token(ana.id, "TKN-0001");
    let meal = pending(ana.id, EntitlementRef::Token(tkn.id));
    let db = MemoryDb::new()
        .with_token(tkn.clone())
        .with_meal(meal.clone())
        .with_principal(ana);

    let record = decide(&db)
        .execute(Uuid::now_v7(), deny(meal.id, "face mismatch"))
        .await
        .unwrap();

    assert_eq!(record.status, MealStatus::Denied);
    assert_eq!(record.denied_reason.as_deref(), Some("face mismatch"));
    assert_eq!(record.completed_at, None);
    assert_eq!(db.token(tkn.id).status, TokenStatus::Active);
}

#[tokio::test]
async fn should_reject_decision_on_processed_record() {
    let ana = student("S-100");
    let served = served_meal(ana.id, Utc::now());
    let db = MemoryDb::new().with_meal(served.clone()).with_principal(ana);

    for input in [approve(served.id), deny(served.id, "late")] {
        let result = decide(&db).execute(Uuid::now_v7(), input).await;
        assert!(
            matches!(result, Err(DiningError::AlreadyProcessed)),
            "expected AlreadyProcessed, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_return_not_found_for_unknown_record() {
    let db = MemoryDb::new();
    let result = decide(&db)
        .execute(Uuid::now_v7(), approve(Uuid::now_v7()))
        .await;
    assert!(
        matches!(result, Err(DiningError::MealRecordNotFound)),
        "expected MealRecordNotFound, got {result:?}"
    );
}

// ── Complete ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_complete_approved_record() {
    let ana = student("S-100");
    let served = served_meal(ana.id, Utc::now());
    let db = MemoryDb::new().with_meal(served.clone()).with_principal(ana);

    let record = CompleteMealUseCase { meals: db.clone() }
        .execute(served.id)
        .await
        .unwrap();

    assert_eq!(record.status, MealStatus::Completed);
    assert_eq!(record.completed_at, served.completed_at);
}

#[tokio::test]
async fn should_refuse_to_complete_pending_record() {
    let ana = student("S-100");
    let meal = pending(ana.id, EntitlementRef::Token(Uuid::now_v7()));
    let db = MemoryDb::new().with_meal(meal.clone()).with_principal(ana);

    let result = CompleteMealUseCase { meals: db.clone() }
        .execute(meal.id)
        .await;
    assert!(
        matches!(result, Err(DiningError::AlreadyProcessed)),
        "expected AlreadyProcessed, got {result:?}"
    );
}
