use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use chrono::FixedOffset;
use sea_orm::Database;
use tokio::sync::Semaphore;
use tracing::info;

use canteen_auth_types::cookie::CookieSettings;
use canteen_auth_types::session::SessionKey;
use canteen_core::config::Config;
use canteen_core::tracing::init_tracing;
use canteen_dining::config::{DEFAULT_LOG_FILTER, DiningConfig};
use canteen_dining::infra::db::ensure_tables;
use canteen_dining::infra::face::HttpFaceRecognizer;
use canteen_dining::router::build_router;
use canteen_dining::state::{AppState, MAX_FRAMES_IN_FLIGHT};

#[tokio::main]
async fn main() {
    init_tracing(DEFAULT_LOG_FILTER);

    let config = DiningConfig::from_env();

    let offset = FixedOffset::east_opt(config.dining_utc_offset_minutes * 60)
        .expect("DINING_UTC_OFFSET_MINUTES out of range");

    let db = Database::connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    ensure_tables(&db)
        .await
        .expect("failed to create tables");

    let state = AppState {
        db,
        session_key: SessionKey::new(config.jwt_secret),
        cookie: CookieSettings {
            secure: config.cookie_secure,
            domain: config.cookie_domain,
        },
        offset,
        hardware_key: config.hardware_api_key,
        face: HttpFaceRecognizer::new(config.face_recognition_service_url),
        frames: Arc::new(AtomicU64::new(0)),
        recognition: Arc::new(Semaphore::new(MAX_FRAMES_IN_FLIGHT)),
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.dining_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind");

    info!("dining service listening on {addr}");
    axum::serve(listener, router).await.expect("server error");
}
