//! Handlers for hook detection.

use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use leaf_core::error::CoreError;
use leaf_core::hook::AnalysisResult;
use leaf_core::sampler::{SamplingParams, DEFAULT_INTERVAL_SECS, DEFAULT_MAX_FRAMES};
use leaf_pipeline::VideoUpload;
use leaf_vision::provider::ProviderStatus;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Multipart field names accepted for the video file.
const VIDEO_FIELDS: &[&str] = &["video", "file"];

#[derive(Debug, Deserialize)]
pub struct AnalyzeQuery {
    #[serde(alias = "interval")]
    pub interval_seconds: Option<f64>,
    pub max_frames: Option<usize>,
}

impl AnalyzeQuery {
    fn sampling_params(&self) -> SamplingParams {
        SamplingParams {
            interval_seconds: self.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECS),
            max_frames: self.max_frames.unwrap_or(DEFAULT_MAX_FRAMES),
            ..SamplingParams::default()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HooksHealthResponse {
    pub status: &'static str,
    pub gemini_configured: bool,
    pub openrouter_configured: bool,
    pub providers: Vec<ProviderStatus>,
}

/// POST /api/v1/hooks/analyze
///
/// Accepts a multipart form with a `video` (or `file`) field. Query
/// parameters `interval_seconds` (alias `interval`) and `max_frames` tune
/// sampling. Returns the best hook frame with its score and reasoning.
pub async fn analyze_video(
    State(state): State<AppState>,
    query: Result<Query<AnalyzeQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<AnalysisResult>> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let params = query.sampling_params();
    params.validate()?;

    let max_bytes = state.config.max_upload_bytes;
    let mut upload: Option<VideoUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if !VIDEO_FIELDS.contains(&name.as_str()) || upload.is_some() {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let bytes = read_limited(field, max_bytes).await?;
        upload = Some(VideoUpload { filename, bytes });
    }

    let upload = upload
        .ok_or_else(|| AppError::BadRequest("Missing required 'video' field".into()))?;

    tracing::info!(
        filename = %upload.filename,
        size = upload.bytes.len(),
        interval_seconds = params.interval_seconds,
        max_frames = params.max_frames,
        "Analyzing video for hooks"
    );

    let result = state.pipeline.analyze(upload, params).await?;
    Ok(Json(result))
}

/// GET /api/v1/hooks/health
///
/// Reports which vision providers are configured.
pub async fn hooks_health(State(state): State<AppState>) -> Json<HooksHealthResponse> {
    let engine = state.pipeline.engine();
    Json(HooksHealthResponse {
        status: "ok",
        gemini_configured: engine.gemini_configured(),
        openrouter_configured: engine.openrouter_configured(),
        providers: engine.provider_status(),
    })
}

/// Buffer one field, failing as soon as it grows past `limit`.
async fn read_limited(mut field: Field<'_>, limit: usize) -> AppResult<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        let size = bytes.len() + chunk.len();
        if size > limit {
            return Err(CoreError::PayloadTooLarge { size, limit }.into());
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}
