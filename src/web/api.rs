//! REST API endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::capture;
use crate::error::{CaptureError, LoaderError};
use crate::overlay::{LoadState, Variant};
use crate::session::SessionEvent;
use crate::web::sse;
use crate::{AppState, CameraCommand};

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Json<Self> {
        Json(Self {
            success: false,
            data: None,
            error: Some(message.to_string()),
        })
    }

    pub fn ok() -> Json<Self> {
        Json(Self {
            success: true,
            data: None,
            error: None,
        })
    }
}

/// Status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub camera_active: bool,
    pub face_detected: bool,
    pub mirrored: bool,
    pub facing: String,
    pub current_variant: Option<String>,
    pub last_error: Option<String>,
    pub version: String,
}

/// Get current status
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.get_session().await;

    ApiResponse::success(StatusResponse {
        camera_active: session.camera_active,
        face_detected: session.face_detected,
        mirrored: session.mirrored,
        facing: session.facing.as_str().to_string(),
        current_variant: session.current_variant,
        last_error: session.last_error,
        version: crate::VERSION.to_string(),
    })
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config.read().await;
    Json(config.clone())
}

/// Get the current overlay transform
pub async fn get_overlay(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ApiResponse::success(state.get_overlay().await)
}

/// Variant with its load state
#[derive(Debug, Serialize)]
pub struct VariantEntry {
    #[serde(flatten)]
    pub variant: Variant,
    pub load_state: LoadState,
}

/// List the variant catalog
pub async fn list_variants(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let load_states = state.load_states.read().await;
    let variants: Vec<VariantEntry> = state
        .catalog
        .iter()
        .map(|v| VariantEntry {
            variant: v.clone(),
            load_state: load_states.get(&v.id).copied().unwrap_or_default(),
        })
        .collect();

    ApiResponse::success(variants)
}

/// Load result for the selected variant
#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub id: String,
    pub load_state: LoadState,
    pub attempts: usize,
    pub cached: bool,
    pub placeholder: bool,
}

/// Select a variant and load its model
pub async fn select_variant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.select_variant(&id).await {
        Ok(outcome) => ApiResponse::success(SelectResponse {
            id,
            load_state: outcome.state,
            attempts: outcome.attempts,
            cached: outcome.cached,
            placeholder: outcome.asset.is_placeholder(),
        })
        .into_response(),
        Err(e @ LoaderError::UnknownVariant(_)) => {
            (StatusCode::NOT_FOUND, ApiResponse::error(&e.to_string())).into_response()
        }
        Err(e) => {
            (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::error(&e.to_string())).into_response()
        }
    }
}

/// Start the camera
pub async fn start_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.send_camera_command(CameraCommand::Start);
    ApiResponse::<()>::ok()
}

/// Stop the camera
pub async fn stop_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.send_camera_command(CameraCommand::Stop);
    ApiResponse::<()>::ok()
}

/// Mirror toggle response
#[derive(Debug, Serialize)]
pub struct MirrorResponse {
    pub mirrored: bool,
}

/// Toggle mirrored ("selfie") view
pub async fn toggle_mirror(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.apply_event(SessionEvent::ToggleMirror).await;
    let mirrored = state.session.read().await.mirrored;
    ApiResponse::success(MirrorResponse { mirrored })
}

/// Facing switch response
#[derive(Debug, Serialize)]
pub struct FacingResponse {
    pub facing: String,
}

/// Switch between front and back camera; restarts a running camera
pub async fn switch_facing(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.apply_event(SessionEvent::SwitchFacing).await;
    let session = state.get_session().await;
    if session.camera_active {
        state.send_camera_command(CameraCommand::Restart);
    }
    ApiResponse::success(FacingResponse {
        facing: session.facing.as_str().to_string(),
    })
}

/// Capture request fields (multipart):
/// - `video`: encoded camera frame (PNG), required
/// - `overlay`: encoded overlay layer (PNG with alpha), optional
pub async fn capture_screenshot(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Response {
    let mut video = None;
    let mut overlay = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, ApiResponse::error(&e.to_string())).into_response()
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, ApiResponse::error(&e.to_string())).into_response()
            }
        };

        match name.as_str() {
            "video" => video = Some(bytes),
            "overlay" => overlay = Some(bytes),
            other => tracing::debug!("Ignoring capture field '{}'", other),
        }
    }

    let Some(video) = video else {
        return (StatusCode::BAD_REQUEST, ApiResponse::error("Missing 'video' field")).into_response();
    };

    let decoded = capture::decode(&video).and_then(|video| {
        let overlay = overlay.as_deref().map(capture::decode).transpose()?;
        Ok((video, overlay))
    });

    let (video, overlay) = match decoded {
        Ok(images) => images,
        Err(e) => return (StatusCode::BAD_REQUEST, ApiResponse::error(&e.to_string())).into_response(),
    };

    match state.capture(&video, overlay.as_ref()).await {
        Ok(shot) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", shot.filename),
                ),
            ],
            shot.png,
        )
            .into_response(),
        Err(CaptureError::NoFace) => (
            StatusCode::CONFLICT,
            ApiResponse::error("Please position your face first"),
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, ApiResponse::error(&e.to_string())).into_response(),
    }
}

/// SSE stream endpoint
pub async fn overlay_stream(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    sse::create_overlay_stream(state)
}
