//! FFmpeg/FFprobe process wrappers.
//!
//! [`probe_video`] reads container metadata through `ffprobe`, and
//! [`RawFrameReader`] streams decoded RGB frames out of an `ffmpeg` child
//! process one at a time. Both are blocking and must run on a worker
//! thread, never on the async executor.

use std::io::{BufReader, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;
use serde::Deserialize;

/// Error type for FFmpeg/FFprobe operations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(std::io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("video file not found: {0}")]
    VideoNotFound(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    pub format: Option<FfprobeFormat>,
}

/// A single stream from ffprobe output.
#[derive(Debug, Deserialize)]
pub struct FfprobeStream {
    pub index: i32,
    pub codec_name: Option<String>,
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Probe
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub fn probe_video(path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    if !path.exists() {
        return Err(FfmpegError::VideoNotFound(
            path.to_string_lossy().to_string(),
        ));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .output()
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

// ---------------------------------------------------------------------------
// Decoder cursor
// ---------------------------------------------------------------------------

/// Lazily decoded RGB frames from an `ffmpeg` child process.
///
/// Each call to `next` reads exactly one `width * height * 3` frame from
/// the decoder's stdout. The iterator is finite and not restartable; the
/// child is killed when the reader is dropped, so a consumer that stops
/// early does not pay for decoding the rest of the file.
pub struct RawFrameReader {
    child: Child,
    stdout: BufReader<ChildStdout>,
    width: u32,
    height: u32,
    finished: bool,
}

impl RawFrameReader {
    /// Spawn `ffmpeg` decoding the first video stream of `path` to raw RGB24.
    ///
    /// `width` and `height` must match the stream's coded dimensions (as
    /// reported by [`probe_video`]); autorotation is disabled so they do.
    /// `frame_limit` caps how many frames the decoder emits.
    pub fn spawn(
        path: &Path,
        width: u32,
        height: u32,
        frame_limit: Option<u64>,
    ) -> Result<Self, FfmpegError> {
        if !path.exists() {
            return Err(FfmpegError::VideoNotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-hide_banner", "-loglevel", "error", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0"]);
        if let Some(limit) = frame_limit {
            cmd.args(["-frames:v", &limit.to_string()]);
        }
        // stderr stays unread, so it must not be a pipe.
        cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(FfmpegError::NotFound)?;
        let stdout = child.stdout.take().ok_or_else(|| {
            FfmpegError::IoError(std::io::Error::other("ffmpeg stdout not captured"))
        })?;

        Ok(Self {
            child,
            stdout: BufReader::new(stdout),
            width,
            height,
            finished: false,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl Iterator for RawFrameReader {
    type Item = std::io::Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut buf = vec![0u8; self.frame_len()];
        match self.stdout.read_exact(&mut buf) {
            Ok(()) => match RgbImage::from_raw(self.width, self.height, buf) {
                Some(img) => Some(Ok(img)),
                None => {
                    self.finished = true;
                    Some(Err(std::io::Error::other(
                        "decoded frame does not match probed dimensions",
                    )))
                }
            },
            // A truncated trailing frame is treated as end of stream.
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for RawFrameReader {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Find the first video stream in the ffprobe output.
pub fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Try format-level duration first.
    if let Some(secs) = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
    {
        return secs;
    }
    // Fall back to the first video stream's duration.
    first_video_stream(probe)
        .and_then(|s| s.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse the video framerate from ffprobe output.
///
/// Prefers `avg_frame_rate` and falls back to `r_frame_rate`. Returns `0.0`
/// when neither is usable; the sampler substitutes its default in that case.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    let Some(stream) = first_video_stream(probe) else {
        return 0.0;
    };
    [stream.avg_frame_rate.as_deref(), stream.r_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .map(parse_fraction)
        .find(|fps| fps.is_finite() && *fps > 0.0)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() == 2 {
        let num = parts[0].parse::<f64>().unwrap_or(0.0);
        let den = parts[1].parse::<f64>().unwrap_or(1.0);
        if den > 0.0 {
            return num / den;
        }
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Find the first video stream's resolution.
pub fn parse_resolution(probe: &FfprobeOutput) -> (u32, u32) {
    first_video_stream(probe)
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0))
}

/// Whether an `ffmpeg` binary can be executed on this host.
pub fn ffmpeg_available() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_stream(r_rate: Option<&str>, avg_rate: Option<&str>) -> FfprobeStream {
        FfprobeStream {
            index: 0,
            codec_name: Some("h264".into()),
            codec_type: Some("video".into()),
            width: Some(1920),
            height: Some(1080),
            r_frame_rate: r_rate.map(Into::into),
            avg_frame_rate: avg_rate.map(Into::into),
            duration: Some("60.0".into()),
        }
    }

    fn probe_with(streams: Vec<FfprobeStream>, duration: Option<&str>) -> FfprobeOutput {
        FfprobeOutput {
            streams,
            format: Some(FfprobeFormat {
                duration: duration.map(Into::into),
                format_name: Some("mov,mp4,m4a,3gp,3g2,mj2".into()),
            }),
        }
    }

    #[test]
    fn test_parse_fraction_standard() {
        assert!((parse_fraction("30/1") - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_fraction_ntsc() {
        let fps = parse_fraction("24000/1001");
        assert!((fps - 23.976).abs() < 0.01);
    }

    #[test]
    fn test_parse_fraction_zero_denominator() {
        assert!((parse_fraction("0/0") - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_framerate_prefers_average() {
        let probe = probe_with(vec![video_stream(Some("90000/1"), Some("30/1"))], None);
        assert!((parse_framerate(&probe) - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_framerate_falls_back_to_real_rate() {
        let probe = probe_with(vec![video_stream(Some("25/1"), Some("0/0"))], None);
        assert!((parse_framerate(&probe) - 25.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_framerate_without_video_stream_is_zero() {
        let probe = probe_with(vec![], Some("10.0"));
        assert_eq!(parse_framerate(&probe), 0.0);
    }

    #[test]
    fn test_parse_duration_from_format() {
        let probe = probe_with(vec![], Some("120.5"));
        assert!((parse_duration(&probe) - 120.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_duration_from_stream() {
        let probe = probe_with(vec![video_stream(Some("30/1"), None)], None);
        assert!((parse_duration(&probe) - 60.0).abs() < 0.001);
    }

    #[test]
    fn test_parse_resolution() {
        let probe = probe_with(vec![video_stream(Some("30/1"), None)], None);
        assert_eq!(parse_resolution(&probe), (1920, 1080));
    }

    #[test]
    fn test_probe_output_tolerates_missing_sections() {
        let probe: FfprobeOutput = serde_json::from_str("{}").expect("parse");
        assert!(probe.streams.is_empty());
        assert!(probe.format.is_none());
    }

    #[test]
    fn test_probe_missing_file() {
        let err = probe_video(Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert!(matches!(err, FfmpegError::VideoNotFound(_)));
    }
}
