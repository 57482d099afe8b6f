//! Vision-model providers and the hook scoring engine.
//!
//! [`engine::HookScoringEngine`] walks an ordered list of
//! [`provider::VisionProvider`]s and falls back to a deterministic verdict
//! when none of them answers usefully.

pub mod config;
pub mod engine;
pub mod gemini;
pub mod openrouter;
pub mod prompt;
pub mod provider;
