//! HTTP surface: one verify operation plus a health probe.
//!
//! `POST /api/verify` takes multipart form data with `document`, `video`,
//! and `full_name`; all three are required. Uploaded assets live in a
//! per-request temp directory that is removed on every exit path.

use crate::engine::{EngineError, EngineHandle};
use attest_core::PipelineError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tower_http::cors::CorsLayer;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing required fields")]
    MissingFields,
    #[error("{0}")]
    BadAsset(String),
    #[error("Face matching error: {0}")]
    FaceMatch(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingFields | ApiError::BadAsset(_) => StatusCode::BAD_REQUEST,
            ApiError::FaceMatch(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Serialize)]
struct VerifyResponse {
    name_match: bool,
    similarity: f32,
    face_match: bool,
}

pub fn router(engine: EngineHandle, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/verify", post(verify))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(engine)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn verify(
    State(engine): State<EngineHandle>,
    mut multipart: Multipart,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut document: Option<Vec<u8>> = None;
    let mut video: Option<Vec<u8>> = None;
    let mut full_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadAsset(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("document") => {
                let bytes = field.bytes().await.map_err(|e| ApiError::BadAsset(e.to_string()))?;
                document = Some(bytes.to_vec());
            }
            Some("video") => {
                let bytes = field.bytes().await.map_err(|e| ApiError::BadAsset(e.to_string()))?;
                video = Some(bytes.to_vec());
            }
            Some("full_name") => {
                let text = field.text().await.map_err(|e| ApiError::BadAsset(e.to_string()))?;
                full_name = Some(text);
            }
            _ => {}
        }
    }

    let (Some(document), Some(video), Some(full_name)) = (document, video, full_name) else {
        return Err(ApiError::MissingFields);
    };

    // Per-request workspace; dropping it removes every artifact, whether
    // the request succeeds, fails, or the engine errors.
    let workspace = tempfile::tempdir().map_err(|e| ApiError::Internal(e.to_string()))?;
    let video_path = workspace.path().join("video-asset");
    tokio::fs::write(&video_path, &video)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let outcome = engine
        .verify(document, video_path, full_name)
        .await
        .map_err(map_engine_error)?;

    Ok(Json(VerifyResponse {
        name_match: outcome.name_match,
        similarity: outcome.similarity,
        face_match: outcome.face_match,
    }))
}

fn map_engine_error(err: EngineError) -> ApiError {
    match err {
        EngineError::Pipeline(PipelineError::FaceMatch(e)) => ApiError::FaceMatch(e.to_string()),
        EngineError::Media(e) => ApiError::BadAsset(e.to_string()),
        other => ApiError::Internal(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_core::CompareError;

    #[test]
    fn test_face_match_failure_maps_to_server_error() {
        let err = EngineError::Pipeline(PipelineError::FaceMatch(CompareError(
            "embedding model failed".into(),
        )));
        match map_engine_error(err) {
            ApiError::FaceMatch(msg) => assert!(msg.contains("embedding model failed")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_asset_maps_to_client_error() {
        let err = EngineError::Media(attest_media::MediaError::Probe("no video stream".into()));
        assert!(matches!(map_engine_error(err), ApiError::BadAsset(_)));
    }

    #[test]
    fn test_error_body_shape() {
        // Response body mirrors the public contract: {"error": "..."}.
        assert_eq!(ApiError::MissingFields.to_string(), "Missing required fields");
        assert!(ApiError::FaceMatch("x".into()).to_string().starts_with("Face matching error:"));
    }

    #[test]
    fn test_request_workspace_removed_on_drop() {
        let workspace = tempfile::tempdir().unwrap();
        let asset = workspace.path().join("video-asset");
        std::fs::write(&asset, b"frames").unwrap();
        let dir = workspace.path().to_path_buf();
        assert!(asset.exists());
        drop(workspace);
        assert!(!asset.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_verify_response_serialization() {
        let response = VerifyResponse {
            name_match: true,
            similarity: 42.5,
            face_match: false,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["name_match"], true);
        assert_eq!(value["similarity"], 42.5);
        assert_eq!(value["face_match"], false);
    }
}
