//! Google Gemini provider (`generateContent` REST endpoint).
//!
//! Quota-sensitive: receives at most [`GEMINI_MAX_FRAMES`] frames per call.

use async_trait::async_trait;
use base64::prelude::*;
use leaf_core::sampler::Frame;
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::provider::{
    ensure_success, non_empty, ProviderError, VisionProvider, MAX_OUTPUT_TOKENS, TEMPERATURE,
};

pub const GEMINI_PROVIDER: &str = "gemini";

/// Frames sent to Gemini per request.
pub const GEMINI_MAX_FRAMES: usize = 2;

/// HTTP client for the Gemini API.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    models: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiProvider {
    /// Create a provider reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
        }
    }

    fn endpoint(&self, model: &str) -> String {
        // Accept both `gemini-x` and `models/gemini-x` in the roster.
        let model = model.trim_start_matches("models/");
        format!("{}/models/{model}:generateContent", self.base_url)
    }
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    fn name(&self) -> &str {
        GEMINI_PROVIDER
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn max_frames(&self) -> usize {
        GEMINI_MAX_FRAMES
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
            .ok_or_else(|| ProviderError::Unavailable(GEMINI_PROVIDER.into()))?;

        let mut parts = vec![json!({ "text": prompt })];
        parts.extend(frames.iter().map(|frame| {
            json!({
                "inline_data": {
                    "mime_type": "image/jpeg",
                    "data": BASE64_STANDARD.encode(&frame.image),
                }
            })
        }));

        let body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            },
        });

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let parsed: GenerateContentResponse = response.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        non_empty(text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    use super::*;

    fn config(api_key: Option<&str>, base_url: String) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.map(Into::into),
            base_url,
            models: vec!["models/gemini-flash-latest".into()],
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame {
                timestamp_secs: i as f64,
                image: vec![0xFF, 0xD8, i as u8],
            })
            .collect()
    }

    /// Serve `reply` for every generateContent call and record request
    /// bodies and API keys.
    async fn fake_gemini(
        reply: Value,
    ) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let app = Router::new().route(
            "/models/{call}",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                let reply = reply.clone();
                async move {
                    let key = headers
                        .get("x-goog-api-key")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    recorder.lock().unwrap().push((key, body));
                    Json(reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn sends_prompt_and_inline_images() {
        let reply = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "```json\n{\"frame_index\": 1," },
                { "text": " \"hook_score\": 80}\n```" }
            ] } }]
        });
        let (base_url, seen) = fake_gemini(reply).await;
        let provider =
            GeminiProvider::with_client(reqwest::Client::new(), &config(Some("k-123"), base_url));

        let text = provider
            .complete("models/gemini-flash-latest", "PROMPT", &frames(2))
            .await
            .expect("complete");
        assert_eq!(text, "```json\n{\"frame_index\": 1, \"hook_score\": 80}\n```");

        let seen = seen.lock().unwrap();
        let (key, body) = &seen[0];
        assert_eq!(key.as_deref(), Some("k-123"));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "PROMPT");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "/9gA");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 400);
    }

    #[tokio::test]
    async fn no_candidates_is_empty_response() {
        let (base_url, _) = fake_gemini(json!({ "candidates": [] })).await;
        let provider =
            GeminiProvider::with_client(reqwest::Client::new(), &config(Some("k"), base_url));
        let err = provider
            .complete("gemini-flash-latest", "p", &frames(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let provider = GeminiProvider::with_client(
            reqwest::Client::new(),
            &config(None, "http://127.0.0.1:9".into()),
        );
        assert!(!provider.is_configured());
        let err = provider.complete("m", "p", &frames(1)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
    }

    #[test]
    fn endpoint_normalises_model_prefix() {
        let provider = GeminiProvider::with_client(
            reqwest::Client::new(),
            &config(Some("k"), "https://example.test/v1beta/".into()),
        );
        assert_eq!(
            provider.endpoint("models/gemini-flash-latest"),
            "https://example.test/v1beta/models/gemini-flash-latest:generateContent"
        );
        assert_eq!(provider.max_frames(), GEMINI_MAX_FRAMES);
    }
}
