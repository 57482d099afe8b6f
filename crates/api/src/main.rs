use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use leaf_core::cache::MemoryTtlCache;
use leaf_core::ffmpeg::ffmpeg_available;
use leaf_pipeline::{CachedVerdict, HookPipeline, PipelineConfig, VerdictCache};
use leaf_vision::config::VisionConfig;
use leaf_vision::engine::HookScoringEngine;
use leaf_vision::provider::build_http_client;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leaf_api::config::ServerConfig;
use leaf_api::router::build_app_router;
use leaf_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "leaf_api=debug,leaf_pipeline=debug,leaf_vision=debug,leaf_core=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let vision = VisionConfig::from_env();
    tracing::info!(
        gemini_configured = vision.gemini.api_key.is_some(),
        openrouter_configured = vision.openrouter.api_key.is_some(),
        provider_timeout_secs = vision.provider_timeout.as_secs(),
        "Loaded vision provider configuration"
    );
    if vision.gemini.api_key.is_none() && vision.openrouter.api_key.is_none() {
        tracing::warn!("No vision provider configured, every analysis will use the fallback verdict");
    }

    // --- Media tooling ---
    if !ffmpeg_available() {
        tracing::warn!("ffmpeg not found on PATH, video analysis requests will fail");
    }
    std::fs::create_dir_all(&config.temp_dir).expect("Failed to create HOOK_TEMP_DIR");

    // --- Scoring engine ---
    let client = build_http_client().expect("Failed to build HTTP client");
    let engine = Arc::new(HookScoringEngine::from_config(client, &vision));

    // --- Pipeline ---
    let mut pipeline = HookPipeline::new(
        PipelineConfig {
            temp_dir: config.temp_dir.clone(),
            max_upload_bytes: config.max_upload_bytes,
        },
        engine,
    );
    if config.cache_ttl_secs > 0 {
        let cache: VerdictCache = Arc::new(MemoryTtlCache::<String, CachedVerdict>::new(
            Duration::from_secs(config.cache_ttl_secs),
        ));
        pipeline = pipeline.with_cache(cache);
        tracing::info!(ttl_secs = config.cache_ttl_secs, "Verdict cache enabled");
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        pipeline: Arc::new(pipeline),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let (drain_tx, drain_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = drain_tx.send(());
        })
        .into_future();
    tokio::pin!(server);

    let drain_timeout = Duration::from_secs(config.shutdown_timeout_secs);
    let drain_deadline = async move {
        match drain_rx.await {
            Ok(()) => tokio::time::sleep(drain_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = &mut server => result.expect("Server error"),
        () = drain_deadline => {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout_secs,
                "In-flight requests did not drain in time, exiting"
            );
        }
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
