//! OpenRouter provider (OpenAI-compatible chat completions).

use async_trait::async_trait;
use base64::prelude::*;
use leaf_core::sampler::Frame;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::ProviderConfig;
use crate::provider::{
    ensure_success, non_empty, ProviderError, VisionProvider, MAX_OUTPUT_TOKENS, TEMPERATURE,
};

pub const OPENROUTER_PROVIDER: &str = "openrouter";

/// Frames sent to OpenRouter per request.
pub const OPENROUTER_MAX_FRAMES: usize = 3;

/// HTTP client for the OpenRouter chat completions API.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    models: Vec<String>,
    referer: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Value,
}

impl OpenRouterProvider {
    /// Create a provider reusing an existing [`reqwest::Client`].
    ///
    /// `referer` and `title` become the `HTTP-Referer` and `X-Title`
    /// attribution headers.
    pub fn with_client(
        client: reqwest::Client,
        config: &ProviderConfig,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
            referer: referer.into(),
            title: title.into(),
        }
    }
}

/// Flatten `message.content`, which is either a string or an array of
/// typed parts.
fn content_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

#[async_trait]
impl VisionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        OPENROUTER_PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn max_frames(&self) -> usize {
        OPENROUTER_MAX_FRAMES
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn complete(
        &self,
        model: &str,
        prompt: &str,
        frames: &[Frame],
    ) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::Unavailable(OPENROUTER_PROVIDER.into()))?;

        let mut content = vec![json!({ "type": "text", "text": prompt })];
        content.extend(frames.iter().map(|frame| {
            json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(&frame.image)),
                }
            })
        }));

        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": content }],
            "max_tokens": MAX_OUTPUT_TOKENS,
            "temperature": TEMPERATURE,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed: ChatCompletion = response.json().await?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| content_text(&m.content))
            .unwrap_or_default();

        non_empty(text)
    }
}
