//! The `VisionProvider` seam and its shared HTTP plumbing.
//!
//! A provider turns a prompt plus a set of JPEG frames into raw model text.
//! Everything that can go wrong inside a provider is a [`ProviderError`];
//! the scoring engine logs those and moves on to the next candidate, so
//! they never reach HTTP callers.

use std::time::Duration;

use async_trait::async_trait;
use leaf_core::sampler::Frame;
use serde::Serialize;

/// Sampling temperature for verdict requests.
pub const TEMPERATURE: f64 = 0.2;

/// Output token budget for verdict requests.
pub const MAX_OUTPUT_TOKENS: u32 = 400;

/// Idle connections kept per provider host.
const POOL_MAX_IDLE_PER_HOST: usize = 8;

/// TCP/TLS connect timeout for provider hosts.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum error-body length carried in [`ProviderError::Api`].
const MAX_ERROR_BODY_CHARS: usize = 500;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Failures of a single provider/model attempt.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No credential is configured for this provider.
    #[error("{0} has no API key configured")]
    Unavailable(String),

    /// The HTTP request itself failed (network, DNS, TLS, body decode).
    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    /// The call exceeded its time budget.
    #[error("request timed out")]
    Timeout,

    /// The provider returned a non-2xx status code.
    #[error("provider API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A 2xx response with no usable text.
    #[error("provider returned no text")]
    EmptyResponse,

    /// Text came back but held no parseable verdict.
    #[error("unparsable response: {0}")]
    Unparsable(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A vision-capable model service.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Short stable identifier, e.g. `"gemini"`.
    fn name(&self) -> &str;

    /// Whether a credential is present. Unconfigured providers are skipped.
    fn is_configured(&self) -> bool;

    /// Most frames this provider should receive in one request.
    fn max_frames(&self) -> usize;

    /// Candidate model identifiers, tried in order.
    fn models(&self) -> &[String];

    /// Send one request to `model` and return its raw text answer.
    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        frames: &[Frame],
    ) -> Result<String, ProviderError>;
}

/// Health view of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub configured: bool,
    pub models: Vec<String>,
    pub max_frames: usize,
}

impl ProviderStatus {
    pub fn of(provider: &dyn VisionProvider) -> Self {
        Self {
            name: provider.name().to_string(),
            configured: provider.is_configured(),
            models: provider.models().to_vec(),
            max_frames: provider.max_frames(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

/// Build the HTTP client shared by all providers.
///
/// One pooled client bounds the number of idle connections held open to
/// each provider host across concurrent requests.
pub fn build_http_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
}

/// Return the response unchanged on a 2xx status, otherwise an
/// [`ProviderError::Api`] carrying the (truncated) body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }
    Ok(response)
}

/// Reject blank answers so an empty completion counts as a failed attempt.
pub(crate) fn non_empty(text: String) -> Result<String, ProviderError> {
    if text.trim().is_empty() {
        Err(ProviderError::EmptyResponse)
    } else {
        Ok(text)
    }
}
