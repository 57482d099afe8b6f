/// Domain errors surfaced by the hook-detection pipeline.
///
/// Provider failures never appear here: the scoring engine recovers from
/// them locally and falls back to the deterministic verdict.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Payload too large: {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("Unreadable media: {0}")]
    UnreadableMedia(String),

    #[error("No frames could be extracted from the video")]
    NoFramesExtracted,

    #[error("No frames provided for analysis")]
    NoFramesProvided,

    #[error("Internal error: {0}")]
    Internal(String),
}
