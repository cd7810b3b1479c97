use std::sync::atomic::Ordering;

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{HeaderName, HeaderValue, request::Parts},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use canteen_domain::meal::VerificationMethod;

use crate::error::DiningError;
use crate::handlers::extract::JsonBody;
use crate::handlers::dto::StudentRef;
use crate::state::AppState;
use crate::usecase::hardware::{
    EnrollFaceOutcome, EnrollFaceUseCase, EnrolledFacesUseCase, MAX_PEOPLE_PER_DETECTION,
    ProcessFrameUseCase, UpdateFaceIdUseCase,
};
use crate::usecase::verification::{VerifyInput, VerifyUseCase};

pub const X_HARDWARE_KEY: HeaderName = HeaderName::from_static("x-hardware-key");

/// Passes when no key is configured or the `x-hardware-key` header matches it.
pub fn check_hardware_key(
    expected: Option<&str>,
    presented: Option<&HeaderValue>,
) -> Result<(), DiningError> {
    match expected {
        None => Ok(()),
        Some(key) if presented.is_some_and(|v| v.as_bytes() == key.as_bytes()) => Ok(()),
        Some(_) => Err(DiningError::Unauthorized),
    }
}

/// Extractor guarding the hardware routes.
pub struct HardwareCaller;

impl FromRequestParts<AppState> for HardwareCaller {
    type Rejection = DiningError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        check_hardware_key(
            state.hardware_key.as_deref(),
            parts.headers.get(&X_HARDWARE_KEY),
        )?;
        Ok(Self)
    }
}

// ── POST /api/hardware/verify ────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub method: Option<VerificationMethod>,
    pub face_id: Option<String>,
    pub id_card_number: Option<String>,
    pub pin: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    pub user: StudentRef,
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub meal_record_id: Option<Uuid>,
    pub token_number: Option<String>,
    pub meal_plan: Option<String>,
}

pub async fn verify(
    _caller: HardwareCaller,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<VerifyRequest>,
) -> Result<Json<VerifyResponse>, DiningError> {
    let usecase = VerifyUseCase {
        principals: state.principal_repo(),
        entitlements: state.entitlement_repo(),
        meals: state.meal_record_repo(),
        offset: state.offset,
    };
    let out = usecase
        .execute(VerifyInput {
            method: body.method,
            face_id: body.face_id,
            id_card_number: body.id_card_number,
            pin: body.pin,
        })
        .await?;
    Ok(Json(VerifyResponse {
        verified: true,
        user: out.student.into(),
        eligible: out.eligible,
        reason: out.reason,
        meal_record_id: out.meal_record_id,
        token_number: out.token_number,
        meal_plan: out.meal_plan,
    }))
}

// ── GET /api/hardware/enrolled-faces ─────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledFace {
    pub id: Uuid,
    pub name: String,
    pub student_id: String,
    pub email: String,
    pub face_id: Option<String>,
    pub photo: Option<String>,
}

pub async fn enrolled_faces(
    _caller: HardwareCaller,
    State(state): State<AppState>,
) -> Result<Json<Vec<EnrolledFace>>, DiningError> {
    let usecase = EnrolledFacesUseCase {
        principals: state.principal_repo(),
    };
    let students = usecase.execute().await?;
    Ok(Json(
        students
            .into_iter()
            .filter_map(|p| {
                let profile = p.student().cloned()?;
                Some(EnrolledFace {
                    id: p.id,
                    name: p.name,
                    student_id: profile.student_id,
                    email: p.email,
                    face_id: profile.face_id,
                    photo: profile.photo,
                })
            })
            .collect(),
    ))
}

// ── PUT /api/hardware/update-face-id ─────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFaceIdRequest {
    /// Principal id of the student.
    pub student_id: Uuid,
    pub face_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceOwner {
    pub id: Uuid,
    pub name: String,
    pub face_id: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateFaceIdResponse {
    pub success: bool,
    pub student: FaceOwner,
}

pub async fn update_face_id(
    _caller: HardwareCaller,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<UpdateFaceIdRequest>,
) -> Result<Json<UpdateFaceIdResponse>, DiningError> {
    let usecase = UpdateFaceIdUseCase {
        principals: state.principal_repo(),
    };
    let principal = usecase.execute(body.student_id, body.face_id).await?;
    Ok(Json(UpdateFaceIdResponse {
        success: true,
        student: FaceOwner {
            face_id: principal.student().and_then(|s| s.face_id.clone()),
            id: principal.id,
            name: principal.name,
        },
    }))
}

// ── POST /api/hardware/enroll-face ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollFaceRequest {
    pub student_id: Uuid,
    /// Base64 image, with or without a data URL prefix.
    pub image: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollFaceResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
}

pub async fn enroll_face(
    _caller: HardwareCaller,
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EnrollFaceRequest>,
) -> Result<Json<EnrollFaceResponse>, DiningError> {
    let usecase = EnrollFaceUseCase {
        principals: state.principal_repo(),
        face: state.face_client(),
    };
    let response = match usecase.execute(body.student_id, &body.image).await? {
        EnrollFaceOutcome::Enrolled { face_id } => EnrollFaceResponse {
            success: true,
            face_id: Some(face_id),
            message: None,
        },
        EnrollFaceOutcome::Unrecognized => EnrollFaceResponse {
            success: false,
            face_id: None,
            message: Some("Face could not be enrolled"),
        },
    };
    Ok(Json(response))
}

// ── POST /api/hardware/person-detected ───────────────────────────────────────

#[derive(Deserialize)]
pub struct PersonDetectedRequest {
    pub count: u8,
    /// Device clock, logged as-is.
    pub timestamp: Option<String>,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub timestamp: DateTime<Utc>,
}

pub async fn person_detected(
    _caller: HardwareCaller,
    JsonBody(body): JsonBody<PersonDetectedRequest>,
) -> Result<Json<AckResponse>, DiningError> {
    if !(1..=MAX_PEOPLE_PER_DETECTION).contains(&body.count) {
        return Err(DiningError::invalid("count", "must be between 1 and 3"));
    }
    tracing::info!(count = body.count, device_time = ?body.timestamp, "person detected");
    Ok(Json(AckResponse {
        success: true,
        message: format!("System active - {} person(s) detected", body.count),
        timestamp: Utc::now(),
    }))
}

// ── POST /api/hardware/video-stream ──────────────────────────────────────────

pub async fn receive_frame(
    _caller: HardwareCaller,
    State(state): State<AppState>,
    frame: Bytes,
) -> Result<Json<AckResponse>, DiningError> {
    if frame.is_empty() {
        return Err(DiningError::invalid("body", "empty frame"));
    }
    let received = state.frames.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(bytes = frame.len(), received, "frame received");

    let Ok(permit) = state.recognition.clone().try_acquire_owned() else {
        tracing::debug!(received, "recognition saturated, frame skipped");
        return Ok(frame_ack());
    };
    let usecase = ProcessFrameUseCase {
        verify: VerifyUseCase {
            principals: state.principal_repo(),
            entitlements: state.entitlement_repo(),
            meals: state.meal_record_repo(),
            offset: state.offset,
        },
        face: state.face_client(),
    };
    tokio::spawn(async move {
        let opened = usecase.execute(frame).await;
        drop(permit);
        if opened > 0 {
            tracing::info!(opened, "frame opened meal requests");
        }
    });

    Ok(frame_ack())
}

fn frame_ack() -> Json<AckResponse> {
    Json(AckResponse {
        success: true,
        message: "Frame received".to_owned(),
        timestamp: Utc::now(),
    })
}

// ── GET /api/hardware/video-stream ───────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatusResponse {
    pub frames_received: u64,
    #[serde(serialize_with = "canteen_core::serde::to_rfc3339_ms")]
    pub timestamp: DateTime<Utc>,
}

pub async fn stream_status(
    _caller: HardwareCaller,
    State(state): State<AppState>,
) -> Json<StreamStatusResponse> {
    Json(StreamStatusResponse {
        frames_received: state.frames.load(Ordering::Relaxed),
        timestamp: Utc::now(),
    })
}
