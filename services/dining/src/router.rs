use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use canteen_core::health::healthz;
use canteen_core::middleware::{propagate_request_id_layer, request_id_layer};

use crate::handlers::{admin, auth, hardware, health, manager, public, student, users};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/healthz", get(healthz))
        .route("/readyz", get(health::readyz))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route(
            "/api/auth/session",
            get(auth::get_session).delete(auth::logout),
        )
        // Public
        .route("/api/public/stats", get(public::public_stats))
        // Self-service
        .route("/api/users/me", put(users::update_me))
        // Student
        .route("/api/student/tokens", get(student::list_tokens))
        .route("/api/student/enrollments", get(student::list_enrollments))
        .route("/api/student/meal-history", get(student::meal_history))
        .route("/api/student/recent-meals", get(student::recent_meals))
        .route("/api/student/stats", get(student::stats))
        .route("/api/student/request-meal", post(student::request_meal))
        // Manager
        .route("/api/manager/pending-meals", get(manager::pending_meals))
        .route("/api/manager/meals", get(manager::list_meals))
        .route("/api/manager/stats", get(manager::stats))
        .route("/api/manager/approve-meal", post(manager::approve_meal))
        .route(
            "/api/manager/meals/{id}/complete",
            post(manager::complete_meal),
        )
        // Admin
        .route(
            "/api/admin/users",
            get(admin::list_users).post(admin::create_user),
        )
        .route(
            "/api/admin/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        .route(
            "/api/admin/meal-plans",
            get(admin::list_meal_plans).post(admin::create_meal_plan),
        )
        .route(
            "/api/admin/meal-plans/{id}",
            put(admin::update_meal_plan).delete(admin::delete_meal_plan),
        )
        .route(
            "/api/admin/enrollments",
            get(admin::list_enrollments).post(admin::create_enrollment),
        )
        .route(
            "/api/admin/enrollments/{id}/deactivate",
            post(admin::deactivate_enrollment),
        )
        .route("/api/admin/meals", get(admin::list_meals))
        .route("/api/admin/stats", get(admin::stats))
        .route("/api/admin/reports", get(admin::report))
        .route("/api/admin/fraud-alerts", get(admin::fraud_alerts))
        // Hardware
        .route("/api/hardware/verify", post(hardware::verify))
        .route("/api/hardware/enrolled-faces", get(hardware::enrolled_faces))
        .route("/api/hardware/update-face-id", put(hardware::update_face_id))
        .route("/api/hardware/enroll-face", post(hardware::enroll_face))
        .route(
            "/api/hardware/person-detected",
            post(hardware::person_detected),
        )
        .route(
            "/api/hardware/video-stream",
            get(hardware::stream_status).post(hardware::receive_frame),
        )
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id_layer())
        .layer(request_id_layer())
        .with_state(state)
}
