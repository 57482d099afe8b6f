//! Frame sampler: fixed-interval frame capture from a decoded video.
//!
//! The sampler walks decoded frames in order and keeps every `stride`-th
//! one, where `stride = round(fps * interval_seconds)`. Kept frames are
//! downscaled to at most `max_width` pixels wide and re-encoded as JPEG.
//! Decoding stops as soon as `max_frames` frames are captured, which bounds
//! the cost independent of video length.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::RgbImage;

use crate::error::CoreError;
use crate::ffmpeg::{self, FfmpegError, RawFrameReader};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Frame rate assumed when the container reports none (or a non-positive one).
pub const DEFAULT_FPS: f64 = 30.0;

/// JPEG quality for sampled frames.
pub const JPEG_QUALITY: u8 = 70;

/// Default maximum frame width after downscaling.
pub const DEFAULT_MAX_WIDTH: u32 = 480;

/// Default seconds between captured frames.
pub const DEFAULT_INTERVAL_SECS: f64 = 1.0;

/// Default maximum number of captured frames.
pub const DEFAULT_MAX_FRAMES: usize = 30;

/// Frames captured for hook detection: the first three seconds.
pub const HOOK_WINDOW_FRAMES: usize = 3;

/// Upper bound accepted for `max_frames`.
pub const MAX_FRAMES_LIMIT: usize = 120;

/// Upper bound accepted for `interval_seconds` (one hour).
pub const MAX_INTERVAL_SECS: f64 = 3600.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One sampled still: capture time and encoded JPEG bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp_secs: f64,
    pub image: Vec<u8>,
}

/// Sampling parameters for one invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub interval_seconds: f64,
    pub max_frames: usize,
    pub max_width: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_INTERVAL_SECS,
            max_frames: DEFAULT_MAX_FRAMES,
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

impl SamplingParams {
    /// Recommended configuration for hook detection: 3 frames, 1 s apart.
    pub fn hook_window() -> Self {
        Self {
            max_frames: HOOK_WINDOW_FRAMES,
            ..Self::default()
        }
    }

    /// Reject parameters that would make sampling meaningless.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.interval_seconds.is_finite()
            || self.interval_seconds <= 0.0
            || self.interval_seconds > MAX_INTERVAL_SECS
        {
            return Err(CoreError::InvalidInput(format!(
                "interval_seconds must be greater than 0 and at most {MAX_INTERVAL_SECS}, got {}",
                self.interval_seconds
            )));
        }
        if self.max_frames == 0 || self.max_frames > MAX_FRAMES_LIMIT {
            return Err(CoreError::InvalidInput(format!(
                "max_frames must be between 1 and {MAX_FRAMES_LIMIT}, got {}",
                self.max_frames
            )));
        }
        if self.max_width == 0 {
            return Err(CoreError::InvalidInput("max_width must be positive".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

/// Substitute [`DEFAULT_FPS`] for an undetectable frame rate.
pub fn effective_fps(detected: f64) -> f64 {
    if detected.is_finite() && detected > 0.0 {
        detected
    } else {
        DEFAULT_FPS
    }
}

/// Number of decoded frames between captures (at least 1).
pub fn frame_stride(fps: f64, interval_seconds: f64) -> u64 {
    let stride = (fps * interval_seconds).round();
    if stride.is_finite() && stride >= 1.0 {
        stride as u64
    } else {
        1
    }
}

/// Decoded frames needed to capture `max_frames` frames at `stride`.
///
/// `None` when the count does not fit in a `u64`; the decoder then runs
/// unbounded and the walk stops on `max_frames` alone.
pub fn decode_limit(stride: u64, max_frames: usize) -> Option<u64> {
    let captures = u64::try_from(max_frames).ok()?.checked_sub(1)?;
    captures.checked_mul(stride)?.checked_add(1)
}

/// Walk `source` in decode order and capture every stride-th frame.
///
/// Stops pulling from `source` once `params.max_frames` frames are kept. A
/// decode error ends the walk; a frame that fails to encode is skipped.
/// The result may be empty.
pub fn sample_frames<I>(source: I, fps: f64, params: &SamplingParams) -> Vec<Frame>
where
    I: IntoIterator<Item = std::io::Result<RgbImage>>,
{
    let fps = effective_fps(fps);
    let stride = frame_stride(fps, params.interval_seconds);
    let mut source = source.into_iter();
    let mut frames = Vec::with_capacity(params.max_frames.min(MAX_FRAMES_LIMIT));
    let mut index: u64 = 0;

    while frames.len() < params.max_frames {
        let Some(decoded) = source.next() else {
            break;
        };
        let img = match decoded {
            Ok(img) => img,
            Err(e) => {
                tracing::warn!(frame = index, error = %e, "Decode failed, stopping frame walk");
                break;
            }
        };

        if index % stride == 0 {
            match compress_frame(&img, params.max_width) {
                Ok(image) => frames.push(Frame {
                    timestamp_secs: index as f64 / fps,
                    image,
                }),
                Err(e) => {
                    tracing::warn!(frame = index, error = %e, "Error compressing frame, skipping");
                }
            }
        }
        index += 1;
    }

    tracing::debug!(captured = frames.len(), decoded = index, stride, fps, "Frame walk finished");
    frames
}

/// Downscale `img` to at most `max_width` wide (never upscaling) and encode
/// it as JPEG at [`JPEG_QUALITY`].
pub fn compress_frame(img: &RgbImage, max_width: u32) -> Result<Vec<u8>, image::ImageError> {
    let resized;
    let img = if img.width() > max_width {
        let height = (u64::from(img.height()) * u64::from(max_width) / u64::from(img.width()))
            .max(1) as u32;
        resized = image::imageops::resize(img, max_width, height, FilterType::Triangle);
        &resized
    } else {
        img
    };

    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY).encode_image(img)?;
    Ok(buf)
}

/// Probe, decode, and sample a video file.
///
/// Blocking: spawns `ffprobe` and `ffmpeg` and encodes JPEGs on the calling
/// thread. Run it through `tokio::task::spawn_blocking`.
pub fn sample_video(path: &Path, params: &SamplingParams) -> Result<Vec<Frame>, CoreError> {
    params.validate()?;

    let probe = ffmpeg::probe_video(path).map_err(media_error)?;
    if ffmpeg::first_video_stream(&probe).is_none() {
        return Err(CoreError::UnreadableMedia(
            "Could not open video file: no video stream".into(),
        ));
    }
    let (width, height) = ffmpeg::parse_resolution(&probe);
    if width == 0 || height == 0 {
        return Err(CoreError::UnreadableMedia(
            "Could not open video file: unknown frame size".into(),
        ));
    }

    let detected_fps = ffmpeg::parse_framerate(&probe);
    let fps = effective_fps(detected_fps);
    if fps != detected_fps {
        tracing::debug!(detected_fps, fps, "FPS not detected, using default");
    }
    let stride = frame_stride(fps, params.interval_seconds);
    let frame_limit = decode_limit(stride, params.max_frames);

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        fps,
        duration = ffmpeg::parse_duration(&probe),
        "Sampling video"
    );

    let reader = RawFrameReader::spawn(path, width, height, frame_limit)
        .map_err(media_error)?;
    let frames = sample_frames(reader, fps, params);

    if frames.is_empty() {
        return Err(CoreError::NoFramesExtracted);
    }
    Ok(frames)
}

/// Client-facing message for a video that ffprobe/ffmpeg cannot read.
const UNREADABLE_MESSAGE: &str = "Could not open video file";

/// Map an ffmpeg failure onto the pipeline taxonomy.
///
/// Tool output names server-side paths, so it goes to the log and never
/// into the error message.
fn media_error(err: FfmpegError) -> CoreError {
    match err {
        FfmpegError::NotFound(e) => {
            CoreError::Internal(format!("ffmpeg/ffprobe is not available: {e}"))
        }
        FfmpegError::VideoNotFound(path) => {
            CoreError::Internal(format!("temp video vanished: {path}"))
        }
        other => {
            tracing::warn!(error = %other, "Could not decode uploaded video");
            CoreError::UnreadableMedia(UNREADABLE_MESSAGE.into())
        }
    }
}
