use std::sync::Arc;

use axum::{
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use invex_core::{reconcile, ExtractionResult};
use invex_extract::ExtractorEngine;
use invex_ocr::{PipelineError, ScanPipeline};

/// Upload cap, matching the transport-layer body limit.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub engine: ExtractorEngine,
    /// Absent when the build carries no OCR backend; image inputs are then
    /// rejected with 503.
    pub ocr: Option<Arc<ScanPipeline>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/extract", post(extract))
        .route("/extract_structured", post(extract_structured))
        .with_state(state)
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Full envelope: raw text, annotated record, and which extractor ran.
async fn extract(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<Value>, ApiError> {
    let text = input_text(&state, req).await?;
    let parsed = reconcile(state.engine.extract(&text).await);
    Ok(Json(json!({
        "text": text,
        "parsed": parsed,
        "parser": state.engine.name(),
    })))
}

/// Same inputs as `/extract`, returns only the annotated record.
async fn extract_structured(
    State(state): State<Arc<AppState>>,
    req: Request,
) -> Result<Json<ExtractionResult>, ApiError> {
    let text = input_text(&state, req).await?;
    Ok(Json(reconcile(state.engine.extract(&text).await)))
}

// ── Input decoding ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ExtractBody {
    text: Option<String>,
    image_b64: Option<String>,
}

/// Resolve the request to raw invoice text: JSON `text` passes through,
/// JSON `image_b64` and multipart `file` go through OCR.
async fn input_text(state: &AppState, req: Request) -> Result<String, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"));

    if is_multipart {
        let mut multipart = Multipart::from_request(req, &())
            .await
            .map_err(|_| ApiError::bad_request("file missing or not a valid image"))?;
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::bad_request("malformed multipart body"))?
        {
            if field.name() == Some("file") {
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("could not read uploaded file"))?;
                return run_ocr(state, data.to_vec()).await;
            }
        }
        return Err(ApiError::bad_request("file missing or not a valid image"));
    }

    let bytes = axum::body::to_bytes(req.into_body(), MAX_UPLOAD_BYTES)
        .await
        .map_err(|_| ApiError::bad_request("could not read request body"))?;
    let body: ExtractBody = serde_json::from_slice(&bytes).unwrap_or_default();

    if let Some(text) = body.text {
        return Ok(text);
    }
    if let Some(b64) = body.image_b64 {
        let data = BASE64
            .decode(b64.as_bytes())
            .map_err(|_| ApiError::bad_request("invalid image_b64"))?;
        return run_ocr(state, data).await;
    }
    Err(ApiError::bad_request(
        "provide 'file' (multipart) or 'image_b64' or 'text'",
    ))
}

async fn run_ocr(state: &AppState, data: Vec<u8>) -> Result<String, ApiError> {
    let Some(pipeline) = state.ocr.clone() else {
        return Err(ApiError::unavailable(
            "no OCR backend built in; supply 'text' instead",
        ));
    };
    // OCR is CPU-bound; keep it off the async workers.
    let result = tokio::task::spawn_blocking(move || pipeline.read_text(&data))
        .await
        .map_err(|_| ApiError::internal("OCR task panicked"))?;
    result.map_err(|e| match e {
        PipelineError::Prepare(_) => ApiError::bad_request("file missing or not a valid image"),
        PipelineError::Ocr(e) => ApiError::internal(format!("OCR failed: {e}")),
    })
}

// ── Error responses ──────────────────────────────────────────────────────────

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn unavailable(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::SERVICE_UNAVAILABLE, message: message.into() }
    }

    fn internal(message: impl Into<String>) -> Self {
        ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({"error": self.message}))).into_response()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
