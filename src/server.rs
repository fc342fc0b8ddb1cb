//! HTTP surface (axum).
//!
//! | Route                                   | Body                 | Answer                 |
//! |-----------------------------------------|----------------------|------------------------|
//! | `POST /api/process-menu`                | multipart `menuImage`| menu JSON              |
//! | `POST /api/export`                      | menu JSON            | `menu.png` attachment  |
//! | `GET  /api/placeholder/{width}/{height}`| (none)               | flat grey PNG          |
//!
//! Errors are JSON objects with an `error` message and, except for a
//! missing upload, a `details` string.
//!
//! `/api/export` takes a document as the editor saved it: every field
//! present and no defaults applied. A document whose surface would exceed
//! the render budget is answered with `413`.

use crate::config::ExtractionConfig;
use crate::error::{DecodeError, MenuError};
use crate::export::{encode_png, encode_rgba, EXPORT_FILE_NAME};
use crate::extract::extract_menu;
use crate::pipeline::llm::VisionModel;
use crate::pipeline::normalize::decode_saved_document;
use crate::pipeline::render::{placeholder_image, render_menu_async, RenderOptions};
use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Multipart field carrying the menu photo.
pub const MENU_IMAGE_FIELD: &str = "menuImage";

/// Largest placeholder edge served, in pixels.
pub const MAX_PLACEHOLDER_EDGE: u32 = 2000;

/// Allowance for multipart boundaries and headers on top of the image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn VisionModel>,
    pub config: Arc<ExtractionConfig>,
    pub render_options: RenderOptions,
}

impl AppState {
    pub fn new(model: Arc<dyn VisionModel>, config: ExtractionConfig) -> Self {
        Self {
            model,
            config: Arc::new(config),
            render_options: RenderOptions::default(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.config.max_image_bytes + MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/process-menu", post(process_menu))
        .route("/api/export", post(export_menu))
        .route("/api/placeholder/{width}/{height}", get(placeholder))
        .layer(body_limit)
        .with_state(state)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn process_menu(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|e| {
        warn!("Not a multipart request: {}", e);
        ApiError::processing(MenuError::NoFileProvided)
    })?;
    let (bytes, mime) = read_menu_image(multipart)
        .await
        .map_err(ApiError::processing)?;

    let doc = extract_menu(state.model.as_ref(), bytes, mime.as_deref(), &state.config)
        .await
        .map_err(ApiError::processing)?;
    Ok(Json(doc).into_response())
}

async fn export_menu(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let doc = serde_json::from_slice::<serde_json::Value>(&body)
        .map_err(DecodeError::from)
        .and_then(|value| decode_saved_document(&value))
        .map_err(ApiError::invalid_document)?;

    let surface = render_menu_async(Arc::new(doc), state.render_options)
        .await
        .map_err(ApiError::render)?;
    let png = encode_png(&surface).map_err(ApiError::internal)?;

    let disposition = format!("attachment; filename=\"{EXPORT_FILE_NAME}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "image/png".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        png,
    )
        .into_response())
}

async fn placeholder(Path((width, height)): Path<(u32, u32)>) -> Result<Response, ApiError> {
    let width = width.clamp(1, MAX_PLACEHOLDER_EDGE);
    let height = height.clamp(1, MAX_PLACEHOLDER_EDGE);
    let png = encode_rgba(&placeholder_image(width, height)).map_err(ApiError::internal)?;
    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}

/// Pull the `menuImage` field out of the form; other fields are skipped.
async fn read_menu_image(mut multipart: Multipart) -> Result<(Vec<u8>, Option<String>), MenuError> {
    let invalid = |e: axum::extract::multipart::MultipartError| MenuError::InvalidImage {
        reason: format!("failed to read upload: {}", e),
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some(MENU_IMAGE_FIELD) {
            continue;
        }
        let mime = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(invalid)?;
        return Ok((data.to_vec(), mime));
    }
    Err(MenuError::NoFileProvided)
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    details: Option<String>,
}

impl ApiError {
    /// Map a failure of `/api/process-menu`.
    pub fn processing(err: MenuError) -> Self {
        match err {
            MenuError::NoFileProvided => Self {
                status: StatusCode::BAD_REQUEST,
                error: err.user_message(),
                details: None,
            },
            MenuError::InvalidImage { .. } => Self {
                status: StatusCode::BAD_REQUEST,
                error: err.user_message(),
                details: Some(err.to_string()),
            },
            _ => {
                warn!("Menu processing failed: {}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: "Error processing menu",
                    details: Some(err.to_string()),
                }
            }
        }
    }

    fn invalid_document(err: DecodeError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid menu document",
            details: Some(err.to_string()),
        }
    }

    /// Map a failure of `/api/export`'s render step.
    fn render(err: MenuError) -> Self {
        match err {
            MenuError::SurfaceTooLarge { .. } => Self {
                status: StatusCode::PAYLOAD_TOO_LARGE,
                error: "Menu too large to render",
                details: Some(err.to_string()),
            },
            _ => Self::internal(err),
        }
    }

    fn internal(err: MenuError) -> Self {
        warn!("Request failed: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal server error",
            details: Some(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => serde_json::json!({ "error": self.error, "details": details }),
            None => serde_json::json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}
