use serde::Deserialize;

use canteen_core::config::Config;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

/// Dining service configuration loaded from environment variables.
#[derive(Debug, Deserialize)]
pub struct DiningConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// HMAC secret for signing session tokens.
    pub jwt_secret: String,
    /// TCP port to listen on. Env var: `DINING_PORT`.
    #[serde(default = "default_port")]
    pub dining_port: u16,
    /// Whether the session cookie carries the `Secure` attribute.
    #[serde(default = "default_cookie_secure")]
    pub cookie_secure: bool,
    /// Optional cookie `Domain` attribute.
    pub cookie_domain: Option<String>,
    /// Base URL of the face recognition service.
    #[serde(default = "default_face_url")]
    pub face_recognition_service_url: String,
    /// Offset of the local calendar day from UTC, in minutes.
    #[serde(default)]
    pub dining_utc_offset_minutes: i32,
    /// Shared key required on hardware routes when set.
    pub hardware_api_key: Option<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_cookie_secure() -> bool {
    true
}

fn default_face_url() -> String {
    "http://localhost:5000".to_owned()
}

impl Config for DiningConfig {}
