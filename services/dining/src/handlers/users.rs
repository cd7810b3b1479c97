use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canteen_auth_types::session::Session;
use canteen_domain::role::Role;

use crate::domain::types::{CredentialChanges, Principal};
use crate::error::DiningError;
use crate::handlers::extract::JsonBody;
use crate::handlers::require;
use crate::state::AppState;
use crate::usecase::user::UpdateOwnCredentialsUseCase;

// ── PUT /api/users/me ────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    pub id_card_number: Option<String>,
    pub pin: Option<String>,
    pub face_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsView {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub id_card_number: Option<String>,
    pub face_id: Option<String>,
}

impl From<Principal> for CredentialsView {
    fn from(p: Principal) -> Self {
        let profile = p.student().cloned();
        Self {
            id: p.id,
            email: p.email,
            name: p.name,
            id_card_number: profile.as_ref().and_then(|s| s.id_card_number.clone()),
            face_id: profile.and_then(|s| s.face_id),
        }
    }
}

#[derive(Serialize)]
pub struct UpdateMeResponse {
    pub user: CredentialsView,
}

pub async fn update_me(
    session: Session,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<UpdateMeRequest>,
) -> Result<Json<UpdateMeResponse>, DiningError> {
    require(&session, Role::Student)?;
    let usecase = UpdateOwnCredentialsUseCase {
        principals: state.principal_repo(),
    };
    let principal = usecase
        .execute(
            session.principal_id,
            CredentialChanges {
                id_card_number: body.id_card_number,
                pin: body.pin,
                face_id: body.face_id,
            },
        )
        .await?;
    Ok(Json(UpdateMeResponse {
        user: principal.into(),
    }))
}
