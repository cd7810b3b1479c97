use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use axum::extract::FromRef;
use chrono::FixedOffset;
use sea_orm::DatabaseConnection;
use tokio::sync::Semaphore;

use canteen_auth_types::cookie::CookieSettings;
use canteen_auth_types::session::SessionKey;

use crate::infra::db::{
    DbEntitlementRepository, DbMealPlanRepository, DbMealRecordRepository, DbPrincipalRepository,
};
use crate::infra::face::HttpFaceRecognizer;

/// Frames that may be in recognition at once.
pub const MAX_FRAMES_IN_FLIGHT: usize = 4;

/// Shared application state passed to every handler via axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub session_key: SessionKey,
    pub cookie: CookieSettings,
    /// Offset of the dining hall's local day.
    pub offset: FixedOffset,
    /// Shared secret for hardware endpoints. `None` leaves them open.
    pub hardware_key: Option<String>,
    pub face: HttpFaceRecognizer,
    /// Frames received on the video stream since startup.
    pub frames: Arc<AtomicU64>,
    /// Permits for background frame recognition. Frames arriving with no
    /// permit left are not recognized.
    pub recognition: Arc<Semaphore>,
}

impl FromRef<AppState> for SessionKey {
    fn from_ref(state: &AppState) -> Self {
        state.session_key.clone()
    }
}

impl AppState {
    pub fn jwt_secret(&self) -> String {
        self.session_key.as_str().to_owned()
    }

    pub fn principal_repo(&self) -> DbPrincipalRepository {
        DbPrincipalRepository {
            db: self.db.clone(),
        }
    }

    pub fn entitlement_repo(&self) -> DbEntitlementRepository {
        DbEntitlementRepository {
            db: self.db.clone(),
        }
    }

    pub fn meal_plan_repo(&self) -> DbMealPlanRepository {
        DbMealPlanRepository {
            db: self.db.clone(),
        }
    }

    pub fn meal_record_repo(&self) -> DbMealRecordRepository {
        DbMealRecordRepository {
            db: self.db.clone(),
        }
    }

    pub fn face_client(&self) -> HttpFaceRecognizer {
        self.face.clone()
    }
}
