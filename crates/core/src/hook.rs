//! Hook verdict contract and result assembly.
//!
//! Providers answer in free text that should contain one JSON object. This
//! module extracts that object, applies defaults for missing fields, and
//! bounds-checks the chosen frame against the frames that were actually
//! sent. It also owns the deterministic fallback verdict and the final
//! [`AnalysisResult`] returned to HTTP callers.

use base64::prelude::*;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::sampler::Frame;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Score assigned when the provider omits `hook_score`.
pub const DEFAULT_HOOK_SCORE: i64 = 50;

/// Score of the deterministic fallback verdict.
pub const FALLBACK_HOOK_SCORE: i64 = 65;

/// Reason used when the provider omits one.
pub const DEFAULT_REASON: &str = "Analysis completed";

/// Provider label recorded on fallback verdicts.
pub const FALLBACK_PROVIDER: &str = "fallback";

const FALLBACK_REASON: &str = "Opening frame selected as default hook. For accurate analysis, \
     configure a vision provider API key (GEMINI_API_KEY or OPENROUTER_API_KEY).";

const FALLBACK_TIP: &str = "Add text overlay or strong emotion in first 2 seconds";

const MIN_HOOK_SCORE: i64 = 1;
const MAX_HOOK_SCORE: i64 = 100;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The scoring decision for one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookVerdict {
    /// Index into the frames sent to the provider, always in bounds.
    pub frame_index: usize,
    pub timestamp_sec: f64,
    /// 1..=100.
    pub hook_score: i64,
    pub reason: String,
    pub visual_elements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub improvement_tip: Option<String>,
    /// Encoded bytes of the chosen frame, base64 in JSON.
    #[serde(serialize_with = "serialize_base64")]
    pub frame_image: Vec<u8>,
    /// Which tier produced this verdict (`gemini`, `openrouter`, `fallback`).
    pub provider: String,
    pub model: Option<String>,
}

/// Terminal artifact of one analysis, serialized with the verdict flattened
/// into the top-level object.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub verdict: HookVerdict,
    pub total_frames_analyzed: usize,
    pub video_filename: String,
    pub summary: String,
}

/// Why a provider response could not be turned into a verdict.
#[derive(Debug, thiserror::Error)]
pub enum VerdictParseError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("response JSON is invalid: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("no frames to resolve the verdict against")]
    NoFrames,
}

fn serialize_base64<T: AsRef<[u8]>, S: Serializer>(bytes: &T, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&BASE64_STANDARD.encode(bytes.as_ref()))
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Return the first balanced `{...}` substring of `text`.
///
/// Braces inside JSON string literals are ignored, so prose or markdown
/// fences around the object are tolerated.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&text[start..=i]);
                    }
                }
                _ => {}
            }
        }

        search_from = start + 1;
    }

    None
}

/// Parse a provider's raw text into a verdict for `frames`.
///
/// `frames` must be the exact set sent to the provider; an out-of-range
/// `frame_index` is clamped to the last frame.
pub fn parse_verdict(
    text: &str,
    frames: &[Frame],
    provider: &str,
    model: Option<&str>,
) -> Result<HookVerdict, VerdictParseError> {
    let last_index = frames.len().checked_sub(1).ok_or(VerdictParseError::NoFrames)?;
    let object = extract_json_object(text).ok_or(VerdictParseError::NoJsonObject)?;
    let value: Value = serde_json::from_str(object)?;

    let requested = value
        .get("frame_index")
        .and_then(number_of)
        .map(|n| if n.is_finite() && n > 0.0 { n as usize } else { 0 })
        .unwrap_or(0);
    let frame_index = if requested > last_index {
        tracing::warn!(
            provider,
            requested,
            frame_count = frames.len(),
            "Provider returned out-of-range frame_index, clamping"
        );
        last_index
    } else {
        requested
    };

    let hook_score = value
        .get("hook_score")
        .and_then(number_of)
        .filter(|n| n.is_finite())
        .map(|n| (n.round() as i64).clamp(MIN_HOOK_SCORE, MAX_HOOK_SCORE))
        .unwrap_or(DEFAULT_HOOK_SCORE);

    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();

    let visual_elements = match value.get("visual_elements") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
        _ => Vec::new(),
    };

    let improvement_tip = value
        .get("improvement_tip")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(HookVerdict {
        frame_index,
        timestamp_sec: value
            .get("timestamp_sec")
            .and_then(number_of)
            .filter(|n| n.is_finite())
            .unwrap_or(0.0),
        hook_score,
        reason,
        visual_elements,
        improvement_tip,
        frame_image: frames[frame_index].image.clone(),
        provider: provider.to_string(),
        model: model.map(str::to_string),
    })
}

/// Read a JSON number, accepting numeric strings as well.
fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// The verdict used when no provider produced a usable answer.
pub fn fallback_verdict(frames: &[Frame]) -> HookVerdict {
    let first = frames.first();
    HookVerdict {
        frame_index: 0,
        timestamp_sec: first.map(|f| f.timestamp_secs).unwrap_or(0.0),
        hook_score: FALLBACK_HOOK_SCORE,
        reason: FALLBACK_REASON.to_string(),
        visual_elements: vec!["opening shot".to_string()],
        improvement_tip: Some(FALLBACK_TIP.to_string()),
        frame_image: first.map(|f| f.image.clone()).unwrap_or_default(),
        provider: FALLBACK_PROVIDER.to_string(),
        model: None,
    }
}

// ---------------------------------------------------------------------------
// Result assembly
// ---------------------------------------------------------------------------

/// Human-readable digest of a verdict.
pub fn hook_summary(verdict: &HookVerdict) -> String {
    let mut summary = format!(
        "Best Hook at {:.1}s (Score: {}/100)\n{}",
        verdict.timestamp_sec, verdict.hook_score, verdict.reason
    );
    if !verdict.visual_elements.is_empty() {
        summary.push_str("\nKey Elements: ");
        summary.push_str(&verdict.visual_elements.join(", "));
    }
    summary
}

/// Combine a verdict with frame metadata into the response object.
pub fn assemble(verdict: HookVerdict, frame_count: usize, filename: &str) -> AnalysisResult {
    let summary = hook_summary(&verdict);
    AnalysisResult {
        verdict,
        total_frames_analyzed: frame_count,
        video_filename: filename.to_string(),
        summary,
    }
}
