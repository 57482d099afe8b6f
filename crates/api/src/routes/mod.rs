pub mod health;
pub mod hooks;

use axum::Router;

use crate::config::ServerConfig;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /hooks/analyze          analyze an uploaded video (POST, multipart)
/// /hooks/health           provider configuration (GET)
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new().nest("/hooks", hooks::router(config.max_upload_bytes))
}
