use std::path::PathBuf;

use leaf_core::media::DEFAULT_MAX_UPLOAD_BYTES;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// Provider credentials live in [`leaf_vision::config::VisionConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `180`).
    ///
    /// Covers upload, decode, and the whole provider chain.
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    /// Largest accepted video upload in bytes.
    pub max_upload_bytes: usize,
    /// Directory for temporary copies of uploads.
    pub temp_dir: PathBuf,
    /// Verdict cache TTL in seconds; `0` disables the cache.
    pub cache_ttl_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `8000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:8080`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `180`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                       |
    /// | `HOOK_MAX_UPLOAD_BYTES` | `104857600` (100 MiB)      |
    /// | `HOOK_TEMP_DIR`         | system temp directory      |
    /// | `HOOK_CACHE_TTL_SECS`   | `3600`                     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "180".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("HOOK_MAX_UPLOAD_BYTES")
            .map(|v| v.parse().expect("HOOK_MAX_UPLOAD_BYTES must be a valid usize"))
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let temp_dir = std::env::var("HOOK_TEMP_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let cache_ttl_secs: u64 = std::env::var("HOOK_CACHE_TTL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("HOOK_CACHE_TTL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            temp_dir,
            cache_ttl_secs,
        }
    }
}
