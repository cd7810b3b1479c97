use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use canteen_auth_types::cookie::{clear_session_cookie, set_session_cookie};
use canteen_auth_types::session::Session;
use canteen_domain::role::Role;

use crate::error::DiningError;
use crate::handlers::extract::JsonBody;
use crate::handlers::dto::SessionUser;
use crate::state::AppState;
use crate::usecase::auth::{
    CurrentPrincipalUseCase, LoginInput, LoginUseCase, RegisterInput, RegisterUseCase,
};

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
}

// ── POST /api/auth/register ──────────────────────────────────────────────────

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    pub student_id: Option<String>,
    pub department: Option<String>,
    pub id_card_number: Option<String>,
    /// Data URL.
    pub photo: Option<String>,
    /// Data URL.
    pub id_card: Option<String>,
}

fn data_url(mime: Option<&str>, bytes: &[u8]) -> String {
    let mime = mime.filter(|m| !m.is_empty()).unwrap_or("image/jpeg");
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn bad_form(e: impl std::fmt::Display) -> DiningError {
    DiningError::invalid("body", e.to_string())
}

/// Text fields plus `photo` and `idCard` file parts.
async fn read_register_form(mut form: Multipart) -> Result<RegisterRequest, DiningError> {
    let mut req = RegisterRequest::default();
    while let Some(field) = form.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "photo" | "idCard" => {
                let mime = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(bad_form)?;
                if bytes.is_empty() {
                    continue;
                }
                let url = Some(data_url(mime.as_deref(), &bytes));
                if name == "photo" {
                    req.photo = url;
                } else {
                    req.id_card = url;
                }
            }
            _ => {
                let value = field.text().await.map_err(bad_form)?;
                match name.as_str() {
                    "email" => req.email = value,
                    "password" => req.password = value,
                    "name" => req.name = value,
                    "studentId" => req.student_id = Some(value),
                    "department" => req.department = Some(value),
                    "idCardNumber" => req.id_card_number = Some(value),
                    _ => {}
                }
            }
        }
    }
    Ok(req)
}

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
) -> Result<impl IntoResponse, DiningError> {
    let is_form = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    let body = if is_form {
        let form = Multipart::from_request(request, &state)
            .await
            .map_err(bad_form)?;
        read_register_form(form).await?
    } else {
        let Json(body) = Json::<RegisterRequest>::from_request(request, &state)
            .await
            .map_err(bad_form)?;
        body
    };

    let usecase = RegisterUseCase {
        principals: state.principal_repo(),
        jwt_secret: state.jwt_secret(),
    };
    let out = usecase
        .execute(RegisterInput {
            email: body.email,
            password: body.password,
            name: body.name,
            student_id: body.student_id,
            department: body.department,
            id_card_number: body.id_card_number,
            photo: body.photo,
            id_card: body.id_card,
        })
        .await?;

    let jar = set_session_cookie(jar, out.session_token, &state.cookie);
    Ok((
        StatusCode::CREATED,
        jar,
        Json(SessionResponse {
            user: SessionUser::from(&out.principal),
        }),
    ))
}

// ── POST /api/auth/login ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub role: Option<Role>,
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, DiningError> {
    let usecase = LoginUseCase {
        principals: state.principal_repo(),
        jwt_secret: state.jwt_secret(),
    };
    let out = usecase
        .execute(LoginInput {
            email: body.email,
            password: body.password,
            role: body.role,
        })
        .await?;
    tracing::info!(principal_id = %out.principal.id, role = %out.principal.role(), "login");

    let jar = set_session_cookie(jar, out.session_token, &state.cookie);
    Ok((
        jar,
        Json(SessionResponse {
            user: SessionUser::from(&out.principal),
        }),
    ))
}

// ── GET /api/auth/session ────────────────────────────────────────────────────

pub async fn get_session(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, DiningError> {
    let usecase = CurrentPrincipalUseCase {
        principals: state.principal_repo(),
    };
    let principal = usecase.execute(session.principal_id).await?;
    Ok(Json(SessionResponse {
        user: SessionUser::from(&principal),
    }))
}

// ── DELETE /api/auth/session ─────────────────────────────────────────────────

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    (StatusCode::NO_CONTENT, clear_session_cookie(jar, &state.cookie))
}
