use bytes::Bytes;
use uuid::Uuid;

use crate::domain::repository::{
    EntitlementRepository, FaceRecognitionPort, MealRecordRepository, PrincipalRepository,
};
use crate::domain::types::{CredentialChanges, Principal};
use crate::domain::validate::non_blank;
use crate::error::DiningError;
use crate::usecase::verification::{VerifyInput, VerifyUseCase};

pub const MAX_PEOPLE_PER_DETECTION: u8 = 3;

// ── Enrolled faces ───────────────────────────────────────────────────────────

pub struct EnrolledFacesUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> EnrolledFacesUseCase<P> {
    pub async fn execute(&self) -> Result<Vec<Principal>, DiningError> {
        self.principals.list_students_with_photo().await
    }
}

// ── Face id assignment ───────────────────────────────────────────────────────

async fn assign_face_id<P: PrincipalRepository>(
    principals: &P,
    principal_id: Uuid,
    face_id: String,
) -> Result<Principal, DiningError> {
    if let Some(owner) = principals.find_student_by_face_id(&face_id).await? {
        if owner.id != principal_id {
            return Err(DiningError::FaceIdTaken);
        }
    }
    principals
        .update_credentials(
            principal_id,
            &CredentialChanges {
                face_id: Some(face_id),
                ..Default::default()
            },
        )
        .await?
        .ok_or(DiningError::StudentNotFound)
}

async fn require_student<P: PrincipalRepository>(
    principals: &P,
    principal_id: Uuid,
) -> Result<Principal, DiningError> {
    principals
        .find_by_id(principal_id)
        .await?
        .filter(|p| p.student().is_some())
        .ok_or(DiningError::StudentNotFound)
}

/// Store a face signature computed by the recognition service.
pub struct UpdateFaceIdUseCase<P: PrincipalRepository> {
    pub principals: P,
}

impl<P: PrincipalRepository> UpdateFaceIdUseCase<P> {
    pub async fn execute(&self, principal_id: Uuid, face_id: String) -> Result<Principal, DiningError> {
        let face_id = non_blank(Some(face_id))
            .ok_or_else(|| DiningError::invalid("faceId", "must not be empty"))?;
        require_student(&self.principals, principal_id).await?;
        assign_face_id(&self.principals, principal_id, face_id).await
    }
}

// ── Face enrollment ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollFaceOutcome {
    Enrolled { face_id: String },
    /// The recognition service was unreachable or found no face.
    Unrecognized,
}

pub struct EnrollFaceUseCase<P, F>
where
    P: PrincipalRepository,
    F: FaceRecognitionPort,
{
    pub principals: P,
    pub face: F,
}

impl<P, F> EnrollFaceUseCase<P, F>
where
    P: PrincipalRepository,
    F: FaceRecognitionPort,
{
    pub async fn execute(
        &self,
        principal_id: Uuid,
        image_base64: &str,
    ) -> Result<EnrollFaceOutcome, DiningError> {
        let image = image_base64.trim();
        if image.is_empty() {
            return Err(DiningError::invalid("image", "must not be empty"));
        }
        require_student(&self.principals, principal_id).await?;

        let Some(face_id) = self.face.enroll(principal_id, image).await else {
            return Ok(EnrollFaceOutcome::Unrecognized);
        };
        assign_face_id(&self.principals, principal_id, face_id.clone()).await?;
        tracing::info!(student = %principal_id, "face enrolled");
        Ok(EnrollFaceOutcome::Enrolled { face_id })
    }
}

// ── Video frames ─────────────────────────────────────────────────────────────

/// Detect faces in a camera frame and run the verification gateway for each.
pub struct ProcessFrameUseCase<P, E, M, F>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
    F: FaceRecognitionPort,
{
    pub verify: VerifyUseCase<P, E, M>,
    pub face: F,
}

impl<P, E, M, F> ProcessFrameUseCase<P, E, M, F>
where
    P: PrincipalRepository,
    E: EntitlementRepository,
    M: MealRecordRepository,
    F: FaceRecognitionPort,
{
    /// Returns the number of PENDING records opened.
    pub async fn execute(&self, frame: Bytes) -> usize {
        let mut opened = 0;
        for face_id in self.face.detect(frame).await {
            match self.verify.execute(VerifyInput::face(face_id)).await {
                Ok(outcome) if outcome.eligible => opened += 1,
                Ok(outcome) => {
                    tracing::info!(student = %outcome.student.id, reason = ?outcome.reason, "recognized student not eligible");
                }
                Err(DiningError::StudentNotFound) => {
                    tracing::debug!("recognized face has no student");
                }
                Err(e) => tracing::warn!(error = %e, kind = e.kind(), "frame verification failed"),
            }
        }
        opened
    }
}
