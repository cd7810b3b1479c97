use std::time::Duration;

use anyhow::Context as _;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::repository::FaceRecognitionPort;

const DETECT_TIMEOUT: Duration = Duration::from_secs(5);
const ENROLL_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the face recognition service.
///
/// `POST {base}/detect` takes a raw JPEG and answers `{faces: [{faceId, confidence}]}`.
/// `POST {base}/enroll` takes `{userId, image}` and answers `{success, faceId}`.
#[derive(Clone)]
pub struct HttpFaceRecognizer {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct DetectResponse {
    #[serde(default)]
    faces: Vec<DetectedFace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedFace {
    face_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnrollRequest<'a> {
    user_id: Uuid,
    image: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrollResponse {
    #[serde(default)]
    success: bool,
    face_id: Option<String>,
}

impl HttpFaceRecognizer {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    async fn try_detect(&self, frame: Bytes) -> anyhow::Result<Vec<String>> {
        let body: DetectResponse = self
            .client
            .post(format!("{}/detect", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .timeout(DETECT_TIMEOUT)
            .body(frame)
            .send()
            .await
            .context("send detect request")?
            .error_for_status()
            .context("detect status")?
            .json()
            .await
            .context("decode detect response")?;
        Ok(body.faces.into_iter().filter_map(|f| f.face_id).collect())
    }

    async fn try_enroll(&self, principal_id: Uuid, image: &str) -> anyhow::Result<Option<String>> {
        let body: EnrollResponse = self
            .client
            .post(format!("{}/enroll", self.base_url))
            .timeout(ENROLL_TIMEOUT)
            .json(&EnrollRequest {
                user_id: principal_id,
                image,
            })
            .send()
            .await
            .context("send enroll request")?
            .error_for_status()
            .context("enroll status")?
            .json()
            .await
            .context("decode enroll response")?;
        Ok(body.face_id.filter(|id| body.success && !id.is_empty()))
    }
}

impl FaceRecognitionPort for HttpFaceRecognizer {
    async fn detect(&self, frame: Bytes) -> Vec<String> {
        match self.try_detect(frame).await {
            Ok(faces) => faces,
            Err(e) => {
                tracing::warn!(error = ?e, "face detection unavailable");
                Vec::new()
            }
        }
    }

    async fn enroll(&self, principal_id: Uuid, image_base64: &str) -> Option<String> {
        match self.try_enroll(principal_id, image_base64).await {
            Ok(face_id) => face_id,
            Err(e) => {
                tracing::warn!(%principal_id, error = ?e, "face enrollment unavailable");
                None
            }
        }
    }
}
