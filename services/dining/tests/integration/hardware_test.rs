use bytes::Bytes;
use uuid::Uuid;

use canteen_dining::error::DiningError;
use canteen_dining::usecase::hardware::{
    EnrollFaceOutcome, EnrollFaceUseCase, EnrolledFacesUseCase, ProcessFrameUseCase,
    UpdateFaceIdUseCase,
};
use canteen_dining::usecase::verification::VerifyUseCase;
use canteen_domain::meal::{MealStatus, VerificationMethod};
use canteen_domain::role::Role;

use crate::helpers::{MemoryDb, MockFace, profile, staff, student, token, utc};

fn frames(db: &MemoryDb, face: MockFace) -> ProcessFrameUseCase<MemoryDb, MemoryDb, MemoryDb, MockFace> {
    ProcessFrameUseCase {
        verify: VerifyUseCase {
            principals: db.clone(),
            entitlements: db.clone(),
            meals: db.clone(),
            offset: utc(),
        },
        face,
    }
}

// ── ProcessFrameUseCase ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_open_pending_records_for_recognized_faces() {
    let mut ana = student("S-100");
    profile(&mut ana).face_id = Some("face-ana".into());
    let mut ben = student("S-200");
    profile(&mut ben).face_id = Some("face-ben".into());
    let db = MemoryDb::new()
        .with_token(token(ana.id, "TKN-0001"))
        .with_principal(ana.clone())
        .with_principal(ben);
    let face = MockFace {
        detected: vec!["face-ana".into(), "face-ben".into(), "face-stranger".into()],
        ..Default::default()
    };

    let opened = frames(&db, face)
        .execute(Bytes::from_static(b"\xff\xd8jpeg"))
        .await;

    // Ben has no entitlement and the stranger matches nobody.
    assert_eq!(opened, 1);
    let store = db.store();
    assert_eq!(store.meals.len(), 1);
    assert_eq!(store.meals[0].student_id, ana.id);
    assert_eq!(store.meals[0].status, MealStatus::Pending);
    assert_eq!(store.meals[0].verification_method, VerificationMethod::Face);
}

#[tokio::test]
async fn should_do_nothing_when_no_face_is_detected() {
    let db = MemoryDb::new();
    let opened = frames(&db, MockFace::default())
        .execute(Bytes::from_static(b"\xff\xd8jpeg"))
        .await;
    assert_eq!(opened, 0);
    assert!(db.store().meals.is_empty());
}

// ── EnrollFaceUseCase ────────────────────────────────────────────────────────

#[tokio::test]
async fn should_store_signature_returned_by_recognition_service() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());
    let face = MockFace {
        enrolled: Some("face-ana".into()),
        ..Default::default()
    };
    let calls = face.enroll_calls.clone();

    let outcome = EnrollFaceUseCase {
        principals: db.clone(),
        face,
    }
    .execute(ana.id, " aGVsbG8= ")
    .await
    .unwrap();

    assert_eq!(
        outcome,
        EnrollFaceOutcome::Enrolled {
            face_id: "face-ana".into()
        }
    );
    let stored = db.principal(ana.id).unwrap();
    assert_eq!(stored.student().unwrap().face_id.as_deref(), Some("face-ana"));
    assert_eq!(*calls.lock().unwrap(), [(ana.id, "aGVsbG8=".to_owned())]);
}

#[tokio::test]
async fn should_report_unrecognized_when_service_finds_nothing() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    let outcome = EnrollFaceUseCase {
        principals: db.clone(),
        face: MockFace::default(),
    }
    .execute(ana.id, "aGVsbG8=")
    .await
    .unwrap();

    assert_eq!(outcome, EnrollFaceOutcome::Unrecognized);
    assert_eq!(db.principal(ana.id).unwrap().student().unwrap().face_id, None);
}

#[tokio::test]
async fn should_reject_empty_image_before_calling_service() {
    let ana = student("S-100");
    let face = MockFace::default();
    let calls = face.enroll_calls.clone();

    let result = EnrollFaceUseCase {
        principals: MemoryDb::new().with_principal(ana.clone()),
        face,
    }
    .execute(ana.id, "   ")
    .await;

    assert!(
        matches!(result, Err(DiningError::Validation(_))),
        "expected Validation, got {result:?}"
    );
    assert!(calls.lock().unwrap().is_empty());
}

// ── UpdateFaceIdUseCase ──────────────────────────────────────────────────────

#[tokio::test]
async fn should_assign_face_id_to_student() {
    let ana = student("S-100");
    let db = MemoryDb::new().with_principal(ana.clone());

    let updated = UpdateFaceIdUseCase {
        principals: db.clone(),
    }
    .execute(ana.id, "face-ana".into())
    .await
    .unwrap();
    assert_eq!(updated.student().unwrap().face_id.as_deref(), Some("face-ana"));
}

#[tokio::test]
async fn should_refuse_face_id_of_another_student() {
    let ana = student("S-100");
    let mut ben = student("S-200");
    profile(&mut ben).face_id = Some("face-ben".into());
    let db = MemoryDb::new()
        .with_principal(ana.clone())
        .with_principal(ben);

    let result = UpdateFaceIdUseCase { principals: db }
        .execute(ana.id, "face-ben".into())
        .await;
    assert!(
        matches!(result, Err(DiningError::FaceIdTaken)),
        "expected FaceIdTaken, got {result:?}"
    );
}

#[tokio::test]
async fn should_refuse_face_id_for_staff_or_unknown_principal() {
    let manager = staff(Role::Manager, "chef@campus.test");
    let db = MemoryDb::new().with_principal(manager.clone());
    let usecase = UpdateFaceIdUseCase { principals: db };

    for id in [manager.id, Uuid::now_v7()] {
        let result = usecase.execute(id, "face-x".into()).await;
        assert!(
            matches!(result, Err(DiningError::StudentNotFound)),
            "expected StudentNotFound, got {result:?}"
        );
    }
}

// ── EnrolledFacesUseCase ─────────────────────────────────────────────────────

#[tokio::test]
async fn should_list_only_students_with_photo() {
    let mut ana = student("S-100");
    profile(&mut ana).photo = Some("data:image/png;base64,AAAA".into());
    let db = MemoryDb::new()
        .with_principal(ana.clone())
        .with_principal(student("S-200"))
        .with_principal(staff(Role::Admin, "admin@campus.test"));

    let faces = EnrolledFacesUseCase { principals: db }
        .execute()
        .await
        .unwrap();
    assert_eq!(faces.len(), 1);
    assert_eq!(faces[0].id, ana.id);
}
