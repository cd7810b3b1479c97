use chrono::{TimeDelta, Utc};

use canteen_dining::domain::types::EntitlementRef;
use canteen_dining::error::DiningError;
use canteen_dining::usecase::verification::{
    REASON_ALREADY_SERVED, REASON_NO_ENTITLEMENT, RequestMealUseCase, VerifyInput, VerifyUseCase,
};
use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::token::TokenStatus;

use crate::helpers::{MemoryDb, enrollment, plan, profile, served_meal, student, token, utc};

fn verify(db: &MemoryDb) -> VerifyUseCase<MemoryDb, MemoryDb, MemoryDb> {
    VerifyUseCase {
        principals: db.clone(),
        entitlements: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
}

fn by_pin(pin: &str) -> VerifyInput {
    VerifyInput {
        method: Some(VerificationMethod::Pin),
        pin: Some(pin.into()),
        ..Default::default()
    }
}

// ── VerifyUseCase ────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_open_pending_record_for_student_with_token() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let tkn = token(ana.id, "TKN-0001");
    let db = MemoryDb::new().with_principal(ana.clone()).with_token(tkn.clone());

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert!(outcome.eligible);
    assert_eq!(outcome.reason, None);
    assert_eq!(outcome.student.id, ana.id);
    assert_eq!(outcome.student.student_id.as_deref(), Some("S-100"));
    assert_eq!(outcome.token_number.as_deref(), Some("TKN-0001"));
    assert_eq!(outcome.meal_plan, None);

    let record = db.meal(outcome.meal_record_id.unwrap());
    assert_eq!(record.status, MealStatus::Pending);
    assert_eq!(record.verification_method, VerificationMethod::Pin);
    assert_eq!(record.entitlement, Some(EntitlementRef::Token(tkn.id)));
    // Nothing is consumed until a manager approves.
    assert_eq!(db.token(tkn.id).status, TokenStatus::Active);
}

#[tokio::test]
async fn should_report_already_served_without_creating_record() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_meal(served_meal(ana.id, Utc::now()))
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert!(!outcome.eligible);
    assert_eq!(outcome.reason, Some(REASON_ALREADY_SERVED));
    assert_eq!(outcome.meal_record_id, None);
    assert_eq!(db.store().meals.len(), 1);
}

#[tokio::test]
async fn should_ignore_meals_served_on_previous_days() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_meal(served_meal(ana.id, Utc::now() - TimeDelta::days(2)))
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();
    assert!(outcome.eligible);
}

#[tokio::test]
async fn should_report_no_entitlement() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let db = MemoryDb::new().with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert!(!outcome.eligible);
    assert_eq!(outcome.reason, Some(REASON_NO_ENTITLEMENT));
    assert!(db.store().meals.is_empty());
}

#[tokio::test]
async fn should_treat_expired_token_as_no_entitlement() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let mut expired = token(ana.id, "TKN-0001");
    expired.expires_at = Some(Utc::now() - TimeDelta::hours(1));
    let db = MemoryDb::new().with_token(expired).with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();
    assert_eq!(outcome.reason, Some(REASON_NO_ENTITLEMENT));
}

#[tokio::test]
async fn should_prefer_token_over_enrollment() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let monthly = plan("Monthly", 30, 30);
    let db = MemoryDb::new()
        .with_enrollment(enrollment(ana.id, &monthly, 30))
        .with_plan(monthly)
        .with_token(token(ana.id, "TKN-0001"))
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert_eq!(outcome.token_number.as_deref(), Some("TKN-0001"));
    assert_eq!(outcome.meal_plan, None);
}

#[tokio::test]
async fn should_use_oldest_token_first() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let mut older = token(ana.id, "TKN-OLD");
    older.purchased_at = Utc::now() - TimeDelta::days(3);
    let newer = token(ana.id, "TKN-NEW");
    let db = MemoryDb::new()
        .with_token(newer)
        .with_token(older)
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();
    assert_eq!(outcome.token_number.as_deref(), Some("TKN-OLD"));
}

#[tokio::test]
async fn should_fall_back_to_enrollment() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let monthly = plan("Monthly", 30, 30);
    let enr = enrollment(ana.id, &monthly, 12);
    let mut used = token(ana.id, "TKN-0001");
    used.status = TokenStatus::Used;
    let db = MemoryDb::new()
        .with_enrollment(enr.clone())
        .with_plan(monthly)
        .with_token(used)
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert!(outcome.eligible);
    assert_eq!(outcome.token_number, None);
    assert_eq!(outcome.meal_plan.as_deref(), Some("Monthly"));
    let record = db.meal(outcome.meal_record_id.unwrap());
    assert_eq!(record.entitlement, Some(EntitlementRef::Enrollment(enr.id)));
}

#[tokio::test]
async fn should_skip_exhausted_or_inactive_enrollments() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let monthly = plan("Monthly", 30, 30);
    let mut inactive = enrollment(ana.id, &monthly, 5);
    inactive.is_active = false;
    let db = MemoryDb::new()
        .with_enrollment(enrollment(ana.id, &monthly, 0))
        .with_enrollment(inactive)
        .with_plan(monthly)
        .with_principal(ana);

    let outcome = verify(&db).execute(by_pin("4821")).await.unwrap();
    assert_eq!(outcome.reason, Some(REASON_NO_ENTITLEMENT));
}

#[tokio::test]
async fn should_resolve_shared_pin_to_oldest_student() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("1111".into());
    profile(&mut ana).enrolled_at = Utc::now() - TimeDelta::days(10);
    let mut ben = student("S-200");
    profile(&mut ben).pin = Some("1111".into());
    let db = MemoryDb::new()
        .with_principal(ben.clone())
        .with_principal(ana.clone())
        .with_token(token(ana.id, "TKN-A"))
        .with_token(token(ben.id, "TKN-B"));

    let outcome = verify(&db).execute(by_pin("1111")).await.unwrap();
    assert_eq!(outcome.student.id, ana.id);
}

#[tokio::test]
async fn should_match_normalized_card_number() {
    let mut ana = student("S-100");
    profile(&mut ana).id_card_number = Some("04A3FF".into());
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_principal(ana.clone());

    let input = VerifyInput {
        method: Some(VerificationMethod::IdCard),
        id_card_number: Some("04 a3 ff".into()),
        ..Default::default()
    };
    let outcome = verify(&db).execute(input).await.unwrap();

    assert_eq!(outcome.student.id, ana.id);
    let record = db.meal(outcome.meal_record_id.unwrap());
    assert_eq!(record.verification_method, VerificationMethod::IdCard);
}

#[tokio::test]
async fn should_return_student_not_found_for_unknown_face() {
    let db = MemoryDb::new().with_principal(student("S-100"));

    let result = verify(&db).execute(VerifyInput::face("nobody")).await;
    assert!(
        matches!(result, Err(DiningError::StudentNotFound)),
        "expected StudentNotFound, got {result:?}"
    );
}

#[tokio::test]
async fn should_reject_request_without_method() {
    let db = MemoryDb::new();
    let input = VerifyInput {
        pin: Some("4821".into()),
        ..Default::default()
    };

    let result = verify(&db).execute(input).await;
    assert!(
        matches!(result, Err(DiningError::Validation(_))),
        "expected Validation, got {result:?}"
    );
}

#[tokio::test]
async fn should_allow_second_pending_request_before_approval() {
    let mut ana = student("S-100");
    profile(&mut ana).pin = Some("4821".into());
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_principal(ana);

    let first = verify(&db).execute(by_pin("4821")).await.unwrap();
    let second = verify(&db).execute(by_pin("4821")).await.unwrap();

    assert!(first.eligible && second.eligible);
    assert_ne!(first.meal_record_id, second.meal_record_id);
}

// ── RequestMealUseCase ───────────────────────────────────────────────────────

fn request(db: &MemoryDb) -> RequestMealUseCase<MemoryDb, MemoryDb, MemoryDb> {
    RequestMealUseCase {
        principals: db.clone(),
        entitlements: db.clone(),
        meals: db.clone(),
        offset: utc(),
    }
}

#[tokio::test]
async fn should_create_pending_record_for_self_request() {
    let ana = student("S-100");
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_principal(ana.clone());

    let record = request(&db)
        .execute(ana.id, VerificationMethod::Manual)
        .await
        .unwrap();

    assert_eq!(record.status, MealStatus::Pending);
    assert_eq!(record.verification_method, VerificationMethod::Manual);
    assert_eq!(db.meal(record.id), record);
}

#[tokio::test]
async fn should_fail_self_request_when_already_served() {
    let ana = student("S-100");
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_meal(served_meal(ana.id, Utc::now()))
        .with_principal(ana.clone());

    let result = request(&db).execute(ana.id, VerificationMethod::Manual).await;
    assert!(
        matches!(result, Err(DiningError::AlreadyServedToday)),
        "expected AlreadyServedToday, got {result:?}"
    );
}

#[tokio::test]
async fn should_fail_self_request_without_entitlement() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    let result = request(&db).execute(ana.id, VerificationMethod::Manual).await;
    assert!(
        matches!(result, Err(DiningError::NoEntitlement)),
        "expected NoEntitlement, got {result:?}"
    );
}
