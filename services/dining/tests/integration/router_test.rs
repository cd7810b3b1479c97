use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use bytes::Bytes;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use canteen_auth_types::cookie::CookieSettings;
use canteen_auth_types::session::SessionKey;
use canteen_core::middleware::X_REQUEST_ID;
use canteen_dining::handlers::hardware::X_HARDWARE_KEY;
use canteen_dining::infra::face::HttpFaceRecognizer;
use canteen_dining::router::build_router;
use canteen_dining::state::{AppState, MAX_FRAMES_IN_FLIGHT};
use canteen_domain::role::Role;
use canteen_testing::auth::MockSession;

use crate::helpers::{TEST_JWT_SECRET, utc};

/// Router over a disconnected database: only paths rejected before any
/// query are exercised here.
fn server(hardware_key: Option<&str>) -> TestServer {
    server_with_permits(hardware_key, MAX_FRAMES_IN_FLIGHT)
}

fn server_with_permits(hardware_key: Option<&str>, permits: usize) -> TestServer {
    let state = AppState {
        db: DatabaseConnection::Disconnected,
        session_key: SessionKey::new(TEST_JWT_SECRET),
        cookie: CookieSettings {
            secure: false,
            domain: None,
        },
        offset: utc(),
        hardware_key: hardware_key.map(str::to_owned),
        face: HttpFaceRecognizer::new("http://127.0.0.1:9"),
        frames: Arc::new(AtomicU64::new(0)),
        recognition: Arc::new(Semaphore::new(permits)),
    };
    TestServer::new(build_router(state)).unwrap()
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_answer_health_with_request_id() {
    let response = server(None).get("/healthz").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "ok");
    assert!(response.headers().contains_key(X_REQUEST_ID));
}

#[tokio::test]
async fn should_echo_caller_request_id() {
    let response = server(None)
        .get("/healthz")
        .add_header(X_REQUEST_ID, HeaderValue::from_static("req-42"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
}

#[tokio::test]
async fn should_report_unready_without_database() {
    let response = server(None).get("/readyz").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response.json::<Value>();
    assert_eq!(body["status"], "unavailable");
    assert_eq!(body["dependency"], "database");
}

// ── Sessions and roles ───────────────────────────────────────────────────────

#[tokio::test]
async fn should_reject_protected_routes_without_session() {
    let server = server(None);
    for path in [
        "/api/auth/session",
        "/api/student/tokens",
        "/api/manager/pending-meals",
        "/api/admin/stats",
    ] {
        let response = server.get(path).await;
        assert_eq!(
            response.status_code(),
            StatusCode::UNAUTHORIZED,
            "{path} should require a session"
        );
    }
}

#[tokio::test]
async fn should_reject_session_signed_with_other_secret() {
    let (name, value) = MockSession::new(Role::Admin).cookie_header("another-secret");
    let response = server(None)
        .get("/api/admin/stats")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn should_forbid_wrong_role() {
    let server = server(None);
    let cases = [
        (Role::Student, "/api/admin/stats"),
        (Role::Manager, "/api/admin/users"),
        (Role::Student, "/api/manager/pending-meals"),
        (Role::Admin, "/api/student/tokens"),
        (Role::Manager, "/api/student/stats"),
    ];
    for (role, path) in cases {
        let (name, value) = MockSession::new(role).cookie_header(TEST_JWT_SECRET);
        let response = server.get(path).add_header(name, value).await;
        assert_eq!(
            response.status_code(),
            StatusCode::FORBIDDEN,
            "{role:?} should be forbidden from {path}"
        );
        let body = response.json::<Value>();
        assert_eq!(body["kind"], "FORBIDDEN");
    }
}

#[tokio::test]
async fn should_reject_unknown_status_filter() {
    let (name, value) = MockSession::new(Role::Manager).cookie_header(TEST_JWT_SECRET);
    let response = server(None)
        .get("/api/manager/meals?status=EATEN")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn should_logout_without_session() {
    let response = server(None).delete("/api/auth/session").await;

    assert_eq!(response.status_code(), StatusCode::NO_CONTENT);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("token="), "unexpected cookie {cookie}");
}

#[tokio::test]
async fn should_answer_undecodable_body_with_validation_error() {
    let (name, value) = MockSession::new(Role::Manager).cookie_header(TEST_JWT_SECRET);
    let response = server(None)
        .post("/api/manager/approve-meal")
        .add_header(name, value)
        .json(&json!({ "mealId": "not-a-uuid", "approved": true }))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["kind"], "VALIDATION");
    assert_eq!(body["details"][0]["field"], "body");
}

#[tokio::test]
async fn should_answer_non_json_body_with_validation_error() {
    let (name, value) = MockSession::new(Role::Admin).cookie_header(TEST_JWT_SECRET);
    let response = server(None)
        .post("/api/admin/meal-plans")
        .add_header(name, value)
        .text("mealCount=20")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["kind"], "VALIDATION");
}

#[tokio::test]
async fn should_answer_undecodable_query_with_validation_error() {
    let (name, value) = MockSession::new(Role::Admin).cookie_header(TEST_JWT_SECRET);
    let response = server(None)
        .get("/api/admin/meals?limit=many")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["kind"], "VALIDATION");
    assert_eq!(body["details"][0]["field"], "query");
}

#[tokio::test]
async fn should_reject_report_date_past_end_of_calendar() {
    let (name, value) = MockSession::new(Role::Admin).cookie_header(TEST_JWT_SECRET);
    let response = server(None)
        .get("/api/admin/reports?type=daily&date=%2B262142-12-31")
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["kind"], "VALIDATION");
    assert_eq!(body["details"][0]["field"], "date");
}

// ── Hardware ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn should_require_hardware_key_when_configured() {
    let server = server(Some("k-1"));

    let response = server.get("/api/hardware/video-stream").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/hardware/video-stream")
        .add_header(X_HARDWARE_KEY, HeaderValue::from_static("k-2"))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);

    let response = server
        .get("/api/hardware/video-stream")
        .add_header(X_HARDWARE_KEY, HeaderValue::from_static("k-1"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn should_acknowledge_person_detection() {
    let server = server(None);

    let response = server
        .post("/api/hardware/person-detected")
        .json(&json!({ "count": 2, "timestamp": "2025-03-14T12:00:00Z" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "System active - 2 person(s) detected");

    for count in [0, 4] {
        let response = server
            .post("/api/hardware/person-detected")
            .json(&json!({ "count": count }))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::BAD_REQUEST,
            "count {count} should be rejected"
        );
    }
}

#[tokio::test]
async fn should_count_received_frames() {
    let server = server(None);

    let response = server
        .post("/api/hardware/video-stream")
        .bytes(Bytes::from_static(b"\xff\xd8jpeg"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["message"], "Frame received");

    let response = server.post("/api/hardware/video-stream").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let status = server.get("/api/hardware/video-stream").await.json::<Value>();
    assert_eq!(status["framesReceived"], 1);
}

#[tokio::test]
async fn should_acknowledge_frames_while_recognition_is_saturated() {
    let server = server_with_permits(None, 0);

    for _ in 0..3 {
        let response = server
            .post("/api/hardware/video-stream")
            .bytes(Bytes::from_static(b"\xff\xd8jpeg"))
            .await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["message"], "Frame received");
    }

    let status = server.get("/api/hardware/video-stream").await.json::<Value>();
    assert_eq!(status["framesReceived"], 3);
}

#[tokio::test]
async fn should_validate_verify_request_before_lookup() {
    let server = server(None);

    let response = server
        .post("/api/hardware/verify")
        .json(&json!({ "pin": "4821" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/hardware/verify")
        .json(&json!({ "method": "PIN", "pin": "4821", "faceId": "face-1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body = response.json::<Value>();
    assert_eq!(body["kind"], "VALIDATION");
}
