use std::time::Duration;

/// Default Gemini REST base URL.
pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default OpenRouter REST base URL.
pub const OPENROUTER_DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default Gemini model roster.
pub const GEMINI_DEFAULT_MODELS: &[&str] = &["gemini-flash-latest"];

/// Default OpenRouter model roster (vision-capable models).
pub const OPENROUTER_DEFAULT_MODELS: &[&str] =
    &["qwen/qwen-2-vl-7b-instruct", "llava/llava-1.5-7b-hf"];

/// Connection settings for one provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// `None` leaves the provider unconfigured; it is then skipped.
    pub api_key: Option<String>,
    pub base_url: String,
    pub models: Vec<String>,
}

/// Provider configuration for the hook scoring engine.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub gemini: ProviderConfig,
    pub openrouter: ProviderConfig,
    /// `HTTP-Referer` attribution header sent to OpenRouter.
    pub openrouter_referer: String,
    /// `X-Title` attribution header sent to OpenRouter.
    pub openrouter_title: String,
    /// Upper bound on a single provider call.
    pub provider_timeout: Duration,
}

impl VisionConfig {
    /// Load provider configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                                  |
    /// |-----------------------------|------------------------------------------|
    /// | `GEMINI_API_KEY_SECONDARY`  | falls back to `GEMINI_API_KEY`           |
    /// | `GEMINI_BASE_URL`           | [`GEMINI_DEFAULT_BASE_URL`]              |
    /// | `GEMINI_MODELS`             | `gemini-flash-latest`                    |
    /// | `OPENROUTER_API_KEY`        | unset                                    |
    /// | `OPENROUTER_BASE_URL`       | [`OPENROUTER_DEFAULT_BASE_URL`]          |
    /// | `OPENROUTER_MODELS`         | qwen-2-vl-7b-instruct, llava-1.5-7b-hf   |
    /// | `OPENROUTER_REFERER`        | `http://localhost:8080`                  |
    /// | `OPENROUTER_TITLE`          | `Social Leaf`                            |
    /// | `PROVIDER_TIMEOUT_SECS`     | `60`                                     |
    pub fn from_env() -> Self {
        let gemini = ProviderConfig {
            api_key: env_secret("GEMINI_API_KEY_SECONDARY").or_else(|| env_secret("GEMINI_API_KEY")),
            base_url: env_or("GEMINI_BASE_URL", GEMINI_DEFAULT_BASE_URL),
            models: env_list("GEMINI_MODELS", GEMINI_DEFAULT_MODELS),
        };

        let openrouter = ProviderConfig {
            api_key: env_secret("OPENROUTER_API_KEY"),
            base_url: env_or("OPENROUTER_BASE_URL", OPENROUTER_DEFAULT_BASE_URL),
            models: env_list("OPENROUTER_MODELS", OPENROUTER_DEFAULT_MODELS),
        };

        let provider_timeout_secs: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        Self {
            gemini,
            openrouter,
            openrouter_referer: env_or("OPENROUTER_REFERER", "http://localhost:8080"),
            openrouter_title: env_or("OPENROUTER_TITLE", "Social Leaf"),
            provider_timeout: Duration::from_secs(provider_timeout_secs),
        }
    }
}

/// Read a secret, treating empty or whitespace-only values as unset.
fn env_secret(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_secret(key).unwrap_or_else(|| default.to_string())
}

/// Parse a comma-separated list, falling back to `default` when unset or empty.
fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    let parsed = std::env::var(key)
        .map(|raw| split_list(&raw))
        .unwrap_or_default();
    if parsed.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
