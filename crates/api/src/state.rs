use std::sync::Arc;

use leaf_pipeline::HookPipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Hook analysis pipeline (sampler, scoring engine, verdict cache).
    pub pipeline: Arc<HookPipeline>,
}
