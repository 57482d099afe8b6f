use std::path::Path;

use leaf_core::error::CoreError;
use leaf_core::sampler::{sample_video, Frame, SamplingParams};

/// Turns a video file on disk into sampled frames.
///
/// Implementations are blocking; the pipeline always calls them from
/// `tokio::task::spawn_blocking`.
pub trait FrameSampler: Send + Sync {
    fn sample(&self, path: &Path, params: &SamplingParams) -> Result<Vec<Frame>, CoreError>;
}

/// Samples through the system `ffprobe`/`ffmpeg` binaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegSampler;

impl FrameSampler for FfmpegSampler {
    fn sample(&self, path: &Path, params: &SamplingParams) -> Result<Vec<Frame>, CoreError> {
        sample_video(path, params)
    }
}
