//! Route definitions for hook detection.
//!
//! Mounted at `/hooks`.
//!
//! ```text
//! POST /analyze      analyze_video
//! GET  /health       hooks_health
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::hooks;
use crate::state::AppState;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/analyze",
            post(hooks::analyze_video).layer(DefaultBodyLimit::max(
                max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES),
            )),
        )
        .route("/health", get(hooks::hooks_health))
}
