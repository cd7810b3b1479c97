use uuid::Uuid;

use canteen_auth_types::token::validate_session_token;
use canteen_dining::domain::types::PrincipalKind;
use canteen_dining::error::DiningError;
use canteen_dining::usecase::auth::{
    CurrentPrincipalUseCase, LoginInput, LoginUseCase, RegisterInput, RegisterUseCase,
};
use canteen_domain::role::Role;

use crate::helpers::{MemoryDb, TEST_JWT_SECRET, TEST_PASSWORD, profile, staff, student};

fn register(db: &MemoryDb) -> RegisterUseCase<MemoryDb> {
    RegisterUseCase {
        principals: db.clone(),
        jwt_secret: TEST_JWT_SECRET.into(),
    }
}

fn login(db: &MemoryDb) -> LoginUseCase<MemoryDb> {
    LoginUseCase {
        principals: db.clone(),
        jwt_secret: TEST_JWT_SECRET.into(),
    }
}

fn registration(email: &str, student_id: &str) -> RegisterInput {
    RegisterInput {
        email: email.into(),
        password: "secret1".into(),
        name: "Ana Lima".into(),
        student_id: Some(student_id.into()),
        ..Default::default()
    }
}

// ── RegisterUseCase ──────────────────────────────────────────────────────────

#[tokio::test]
async fn should_register_student_and_issue_session() {
    let db = MemoryDb::new();
    let input = RegisterInput {
        department: Some("Physics".into()),
        id_card_number: Some("04 a3 ff".into()),
        photo: Some("data:image/png;base64,AAAA".into()),
        ..registration(" ana@campus.test ", "S-100")
    };

    let signed_in = register(&db).execute(input).await.unwrap();

    let principal = &signed_in.principal;
    assert_eq!(principal.email, "ana@campus.test");
    assert_eq!(principal.role(), Role::Student);
    assert_ne!(principal.password_hash, "secret1");
    let student = principal.student().unwrap();
    assert_eq!(student.student_id, "S-100");
    assert_eq!(student.id_card_number.as_deref(), Some("04A3FF"));
    assert_eq!(student.pin, None);
    assert!(db.principal(principal.id).is_some());

    let info = validate_session_token(&signed_in.session_token, TEST_JWT_SECRET).unwrap();
    assert_eq!(info.principal_id, principal.id);
    assert_eq!(info.role, Role::Student);
}

/// A rejected registration leaves exactly the pre-existing students behind.
fn assert_no_new_accounts(db: &MemoryDb, student_ids: &[&str]) {
    let store = db.store();
    let mut stored: Vec<&str> = store
        .principals
        .iter()
        .filter_map(|p| p.student().map(|s| s.student_id.as_str()))
        .collect();
    stored.sort_unstable();
    assert_eq!(store.principals.len(), student_ids.len());
    assert_eq!(stored, student_ids);
}

#[tokio::test]
async fn should_reject_duplicate_email_and_student_id() {
    let db = MemoryDb::new().with_principal(student("S-100"));

    let result = register(&db)
        .execute(registration("s-100@campus.test", "S-999"))
        .await;
    assert!(
        matches!(result, Err(DiningError::EmailTaken)),
        "expected EmailTaken, got {result:?}"
    );
    assert_no_new_accounts(&db, &["S-100"]);

    let result = register(&db)
        .execute(registration("new@campus.test", "S-100"))
        .await;
    assert!(
        matches!(result, Err(DiningError::StudentIdTaken)),
        "expected StudentIdTaken, got {result:?}"
    );
    assert_no_new_accounts(&db, &["S-100"]);
}

#[tokio::test]
async fn should_reject_card_number_held_by_another_student() {
    let mut ben = student("S-200");
    profile(&mut ben).id_card_number = Some("04A3FF".into());
    let db = MemoryDb::new().with_principal(ben);

    let input = RegisterInput {
        id_card_number: Some("04a3ff".into()),
        ..registration("ana@campus.test", "S-100")
    };
    let result = register(&db).execute(input).await;
    assert!(
        matches!(result, Err(DiningError::IdCardTaken)),
        "expected IdCardTaken, got {result:?}"
    );
    assert_no_new_accounts(&db, &["S-200"]);
}

#[tokio::test]
async fn should_collect_every_invalid_field() {
    let input = RegisterInput {
        email: "not-an-email".into(),
        password: "123".into(),
        name: "A".into(),
        student_id: None,
        ..Default::default()
    };

    let result = register(&MemoryDb::new()).execute(input).await;
    match result {
        Err(DiningError::Validation(details)) => {
            let fields: Vec<_> = details.iter().map(|d| d.field).collect();
            assert_eq!(fields, ["email", "password", "name", "studentId"]);
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

// ── LoginUseCase ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_login_with_matching_role() {
    let manager = staff(Role::Manager, "chef@campus.test");
    let db = MemoryDb::new().with_principal(manager.clone());

    let signed_in = login(&db)
        .execute(LoginInput {
            email: "chef@campus.test".into(),
            password: TEST_PASSWORD.into(),
            role: Some(Role::Manager),
        })
        .await
        .unwrap();

    assert_eq!(signed_in.principal.id, manager.id);
    assert!(matches!(signed_in.principal.kind, PrincipalKind::Manager));
    let info = validate_session_token(&signed_in.session_token, TEST_JWT_SECRET).unwrap();
    assert_eq!(info.role, Role::Manager);
}

#[tokio::test]
async fn should_login_without_role_hint() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    let signed_in = login(&db)
        .execute(LoginInput {
            email: ana.email.clone(),
            password: TEST_PASSWORD.into(),
            role: None,
        })
        .await
        .unwrap();
    assert_eq!(signed_in.principal.id, ana.id);
}

#[tokio::test]
async fn should_reject_wrong_password_and_unknown_email_alike() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    for (email, password) in [
        (ana.email.as_str(), "wrong-password"),
        ("ghost@campus.test", TEST_PASSWORD),
    ] {
        let result = login(&db)
            .execute(LoginInput {
                email: email.into(),
                password: password.into(),
                role: None,
            })
            .await;
        assert!(
            matches!(result, Err(DiningError::InvalidCredentials)),
            "expected InvalidCredentials, got {result:?}"
        );
    }
}

#[tokio::test]
async fn should_reject_role_mismatch_after_password_check() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    let result = login(&db)
        .execute(LoginInput {
            email: ana.email.clone(),
            password: TEST_PASSWORD.into(),
            role: Some(Role::Admin),
        })
        .await;
    assert!(
        matches!(result, Err(DiningError::RoleMismatch)),
        "expected RoleMismatch, got {result:?}"
    );

    let result = login(&db)
        .execute(LoginInput {
            email: ana.email.clone(),
            password: "wrong-password".into(),
            role: Some(Role::Admin),
        })
        .await;
    assert!(
        matches!(result, Err(DiningError::InvalidCredentials)),
        "expected InvalidCredentials, got {result:?}"
    );
}

// ── CurrentPrincipalUseCase ──────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_session_of_deleted_principal() {
    let result = CurrentPrincipalUseCase {
        principals: MemoryDb::new(),
    }
    .execute(Uuid::now_v7())
    .await;
    assert!(
        matches!(result, Err(DiningError::Unauthorized)),
        "expected Unauthorized, got {result:?}"
    );
}
