#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use leaf_core::error::CoreError;
use leaf_core::sampler::{Frame, SamplingParams};
use leaf_pipeline::frames::FrameSampler;
use leaf_pipeline::{HookPipeline, PipelineConfig};
use leaf_vision::config::{ProviderConfig, VisionConfig};
use leaf_vision::engine::HookScoringEngine;
use tower::ServiceExt;

use leaf_api::config::ServerConfig;
use leaf_api::router::build_app_router;
use leaf_api::state::AppState;

/// Upload limit used by test apps (64 KiB).
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;

pub const BOUNDARY: &str = "leaf-test-boundary";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(temp_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:8080".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        max_upload_bytes: TEST_MAX_UPLOAD_BYTES,
        temp_dir: temp_dir.to_path_buf(),
        cache_ttl_secs: 0,
    }
}

/// Provider chain with no credentials: every analysis hits the fallback.
pub fn unconfigured_vision() -> VisionConfig {
    let provider = |base_url: &str, model: &str| ProviderConfig {
        api_key: None,
        base_url: base_url.to_string(),
        models: vec![model.to_string()],
    };
    VisionConfig {
        gemini: provider("http://127.0.0.1:9", "gemini-flash-latest"),
        openrouter: provider("http://127.0.0.1:9", "qwen/qwen-2-vl-7b-instruct"),
        openrouter_referer: "http://localhost:8080".into(),
        openrouter_title: "Social Leaf".into(),
        provider_timeout: Duration::from_secs(1),
    }
}

/// Sampler that never touches ffmpeg: yields `frames` solid fake JPEGs.
pub struct FakeSampler {
    pub frames: usize,
}

impl FrameSampler for FakeSampler {
    fn sample(&self, path: &Path, params: &SamplingParams) -> Result<Vec<Frame>, CoreError> {
        if !path.exists() {
            return Err(CoreError::Internal("temp file missing".into()));
        }
        Ok((0..self.frames.min(params.max_frames))
            .map(|i| Frame {
                timestamp_secs: i as f64 * params.interval_seconds,
                image: vec![0xFF, 0xD8, 0xFF, i as u8],
            })
            .collect())
    }
}

/// Build the full application router with all middleware layers.
///
/// Uses the production router builder so integration tests exercise the
/// same middleware stack (CORS, request ID, timeout, tracing, panic
/// recovery) that production uses.
pub fn build_test_app(temp_dir: &Path, frames: usize) -> Router {
    let config = test_config(temp_dir);
    let pipeline = HookPipeline::new(
        PipelineConfig {
            temp_dir: config.temp_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
        fallback_engine(),
    )
    .with_sampler(Arc::new(FakeSampler { frames }));

    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::new(pipeline),
    };
    build_app_router(state, &config)
}

/// Real provider chain with no credentials configured.
pub fn fallback_engine() -> Arc<HookScoringEngine> {
    Arc::new(HookScoringEngine::from_config(
        Default::default(),
        &unconfigured_vision(),
    ))
}

/// Send a GET request through the app.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a POST with a prepared multipart body.
pub async fn post_multipart(app: Router, uri: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Encode a single file part as a multipart/form-data body.
pub fn multipart_file(field: &str, filename: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
