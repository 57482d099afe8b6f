//! Hook Scoring Engine: ordered provider fallback chain.
//!
//! Providers are tried strictly in sequence, and within a provider its
//! models are tried in roster order. The first attempt whose answer parses
//! into a verdict wins. Every provider failure is logged and swallowed; when
//! the chain is exhausted the deterministic fallback verdict is returned, so
//! scoring a non-empty frame set never fails.

use std::sync::Arc;
use std::time::Duration;

use leaf_core::error::CoreError;
use leaf_core::hook::{fallback_verdict, parse_verdict, HookVerdict};
use leaf_core::sampler::{Frame, HOOK_WINDOW_FRAMES};

use crate::config::VisionConfig;
use crate::gemini::{GeminiProvider, GEMINI_PROVIDER};
use crate::openrouter::{OpenRouterProvider, OPENROUTER_PROVIDER};
use crate::prompt::hook_prompt;
use crate::provider::{ProviderError, ProviderStatus, VisionProvider};

/// Frames considered for scoring; the opening hook window.
pub const MAX_SCORED_FRAMES: usize = HOOK_WINDOW_FRAMES;

pub struct HookScoringEngine {
    providers: Vec<Arc<dyn VisionProvider>>,
    call_timeout: Duration,
}

impl HookScoringEngine {
    /// `providers` are attempted in the given order; `call_timeout` bounds
    /// each individual provider/model call.
    pub fn new(providers: Vec<Arc<dyn VisionProvider>>, call_timeout: Duration) -> Self {
        Self {
            providers,
            call_timeout,
        }
    }

    /// Standard chain: Gemini first, then OpenRouter, sharing one client.
    pub fn from_config(client: reqwest::Client, config: &VisionConfig) -> Self {
        let gemini = GeminiProvider::with_client(client.clone(), &config.gemini);
        let openrouter = OpenRouterProvider::with_client(
            client,
            &config.openrouter,
            config.openrouter_referer.clone(),
            config.openrouter_title.clone(),
        );
        Self::new(
            vec![Arc::new(gemini), Arc::new(openrouter)],
            config.provider_timeout,
        )
    }

    /// Pick the most scroll-stopping frame of `frames`.
    ///
    /// Only the first [`MAX_SCORED_FRAMES`] frames are considered, and each
    /// provider receives at most its own `max_frames()` of those. The
    /// returned `frame_index` is always valid for the frames that provider
    /// was sent, and therefore for `frames`.
    pub async fn score(&self, frames: &[Frame]) -> Result<HookVerdict, CoreError> {
        if frames.is_empty() {
            return Err(CoreError::NoFramesProvided);
        }
        let window = &frames[..frames.len().min(MAX_SCORED_FRAMES)];

        for provider in &self.providers {
            let name = provider.name();
            if !provider.is_configured() {
                tracing::debug!(provider = name, "Provider not configured, skipping");
                continue;
            }

            let sent = &window[..window.len().min(provider.max_frames().max(1))];
            let prompt = hook_prompt(sent);

            for model in provider.models() {
                match self.attempt(provider.as_ref(), model, &prompt, sent).await {
                    Ok(verdict) => {
                        tracing::info!(
                            provider = name,
                            model = %model,
                            frame_index = verdict.frame_index,
                            hook_score = verdict.hook_score,
                            "Hook verdict received"
                        );
                        return Ok(verdict);
                    }
                    Err(e) => {
                        tracing::warn!(
                            provider = name,
                            model = %model,
                            error = %e,
                            "Hook scoring attempt failed, trying next candidate"
                        );
                    }
                }
            }
        }

        tracing::warn!(
            frame_count = window.len(),
            "No provider produced a verdict, using fallback"
        );
        Ok(fallback_verdict(window))
    }

    /// One bounded call to one model, parsed into a verdict.
    async fn attempt(
        &self,
        provider: &dyn VisionProvider,
        model: &str,
        prompt: &str,
        frames: &[Frame],
    ) -> Result<HookVerdict, ProviderError> {
        let text = tokio::time::timeout(self.call_timeout, provider.complete(model, prompt, frames))
            .await
            .map_err(|_| ProviderError::Timeout)??;

        parse_verdict(&text, frames, provider.name(), Some(model))
            .map_err(|e| ProviderError::Unparsable(e.to_string()))
    }

    /// Health view of every provider in chain order.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        self.providers
            .iter()
            .map(|p| ProviderStatus::of(p.as_ref()))
            .collect()
    }

    /// Whether the provider called `name` exists and has a credential.
    pub fn is_configured(&self, name: &str) -> bool {
        self.providers
            .iter()
            .any(|p| p.name() == name && p.is_configured())
    }

    pub fn gemini_configured(&self) -> bool {
        self.is_configured(GEMINI_PROVIDER)
    }

    pub fn openrouter_configured(&self) -> bool {
        self.is_configured(OPENROUTER_PROVIDER)
    }
}
