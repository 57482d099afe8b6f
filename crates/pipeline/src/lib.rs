//! End-to-end hook analysis for one uploaded video.
//!
//! ```text
//! upload -> validate -> temp file -> sample frames -> score -> assemble
//!                                                         \-> cleanup (always)
//! ```

pub mod frames;

use std::path::PathBuf;
use std::sync::Arc;

use leaf_core::cache::TtlCache;
use leaf_core::error::CoreError;
use leaf_core::hook::{assemble, AnalysisResult, HookVerdict, FALLBACK_PROVIDER};
use leaf_core::media::{validate_upload, TempVideo, DEFAULT_MAX_UPLOAD_BYTES};
use leaf_core::sampler::SamplingParams;
use leaf_vision::engine::HookScoringEngine;
use sha2::{Digest, Sha256};

use crate::frames::{FfmpegSampler, FrameSampler};

/// Verdict plus the number of frames it was chosen from.
pub type CachedVerdict = (HookVerdict, usize);

/// Shared verdict cache, keyed by upload fingerprint and sampling params.
pub type VerdictCache = Arc<dyn TtlCache<String, CachedVerdict>>;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory that receives temporary copies of uploads.
    pub temp_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// An uploaded video held in memory.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

pub struct HookPipeline {
    config: PipelineConfig,
    sampler: Arc<dyn FrameSampler>,
    engine: Arc<HookScoringEngine>,
    cache: Option<VerdictCache>,
}

impl HookPipeline {
    /// Pipeline sampling through ffmpeg, without a verdict cache.
    pub fn new(config: PipelineConfig, engine: Arc<HookScoringEngine>) -> Self {
        Self {
            config,
            sampler: Arc::new(FfmpegSampler),
            engine,
            cache: None,
        }
    }

    pub fn with_sampler(mut self, sampler: Arc<dyn FrameSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_cache(mut self, cache: VerdictCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &HookScoringEngine {
        &self.engine
    }

    /// Analyze one upload.
    ///
    /// The temp file is removed before this returns on every path, and by
    /// the [`TempVideo`] guard if the future is dropped mid-flight.
    pub async fn analyze(
        &self,
        upload: VideoUpload,
        params: SamplingParams,
    ) -> Result<AnalysisResult, CoreError> {
        params.validate()?;
        let ext = validate_upload(&upload.filename, upload.bytes.len(), self.config.max_upload_bytes)?;
        if upload.bytes.is_empty() {
            return Err(CoreError::UnreadableMedia("Uploaded file is empty".into()));
        }

        let VideoUpload { filename, bytes } = upload;
        let key = cache_key(&bytes, &params);

        if let Some(cache) = &self.cache {
            if let Some((verdict, frame_count)) = cache.get(&key) {
                tracing::debug!(filename = %filename, "Verdict cache hit");
                return Ok(assemble(verdict, frame_count, &filename));
            }
        }

        let mut temp = TempVideo::persist(&self.config.temp_dir, &bytes, &ext).await?;
        drop(bytes);

        let outcome = self.sample_and_score(temp.path().to_path_buf(), params).await;
        temp.cleanup();
        let (verdict, frame_count) = outcome?;

        tracing::info!(
            filename = %filename,
            frame_count,
            provider = %verdict.provider,
            hook_score = verdict.hook_score,
            "Hook analysis complete"
        );

        // The fallback stands in for unavailable providers; it is never kept.
        if let Some(cache) = &self.cache {
            if verdict.provider != FALLBACK_PROVIDER {
                cache.insert(key, (verdict.clone(), frame_count));
            }
        }
        Ok(assemble(verdict, frame_count, &filename))
    }

    async fn sample_and_score(
        &self,
        path: PathBuf,
        params: SamplingParams,
    ) -> Result<CachedVerdict, CoreError> {
        let sampler = Arc::clone(&self.sampler);
        let frames = tokio::task::spawn_blocking(move || sampler.sample(&path, &params))
            .await
            .map_err(|e| CoreError::Internal(format!("Frame sampling task failed: {e}")))??;

        if frames.is_empty() {
            return Err(CoreError::NoFramesExtracted);
        }
        tracing::debug!(frame_count = frames.len(), "Frames sampled");

        let verdict = self.engine.score(&frames).await?;
        Ok((verdict, frames.len()))
    }
}

/// SHA-256 of the upload combined with the parameters that shape the frames.
fn cache_key(bytes: &[u8], params: &SamplingParams) -> String {
    let digest = Sha256::digest(bytes);
    format!(
        "{digest:x}:{}:{}:{}",
        params.interval_seconds, params.max_frames, params.max_width
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use leaf_core::cache::MemoryTtlCache;
    use leaf_core::hook::FALLBACK_HOOK_SCORE;
    use leaf_core::sampler::Frame;
    use leaf_vision::provider::{ProviderError, VisionProvider};

    use super::*;

    /// Returns canned frames and records whether the temp file existed.
    struct StubSampler {
        frames: usize,
        seen_paths: Mutex<Vec<(PathBuf, bool)>>,
    }

    impl StubSampler {
        fn new(frames: usize) -> Arc<Self> {
            Arc::new(Self {
                frames,
                seen_paths: Mutex::new(Vec::new()),
            })
        }
    }

    impl FrameSampler for StubSampler {
        fn sample(&self, path: &Path, params: &SamplingParams) -> Result<Vec<Frame>, CoreError> {
            self.seen_paths
                .lock()
                .unwrap()
                .push((path.to_path_buf(), path.exists()));
            Ok((0..self.frames.min(params.max_frames))
                .map(|i| Frame {
                    timestamp_secs: i as f64 * params.interval_seconds,
                    image: vec![i as u8; 4],
                })
                .collect())
        }
    }

    struct CountingProvider {
        calls: AtomicUsize,
        models: Vec<String>,
    }

    #[async_trait]
    impl VisionProvider for CountingProvider {
        fn name(&self) -> &str {
            "counting"
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn max_frames(&self) -> usize {
            3
        }

        fn models(&self) -> &[String] {
            &self.models
        }

        async fn complete(
            &self,
            _model: &str,
            _prompt: &str,
            _frames: &[Frame],
        ) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"frame_index": 1, "timestamp_sec": 1.0, "hook_score": 91, "reason": "bold text"}"#.into())
        }
    }

    /// Times out on its first call, answers on every later one.
    struct RecoveringProvider {
        calls: AtomicUsize,
        models: Vec<String>,
    }

    #[async_trait]
    impl VisionProvider for RecoveringProvider {
        fn name(&self) -> &str {
            "recovering"
        }

        fn is_configured(&self) -> bool {
            true
        }

        fn max_frames(&self) -> usize {
            3
        }

        fn models(&self) -> &[String] {
            &self.models
        }

        async fn complete(
            &self,
            _model: &str,
            _prompt: &str,
            _frames: &[Frame],
        ) -> Result<String, ProviderError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(ProviderError::Timeout);
            }
            Ok(r#"{"frame_index": 1, "hook_score": 90}"#.into())
        }
    }

    fn fallback_engine() -> Arc<HookScoringEngine> {
        Arc::new(HookScoringEngine::new(vec![], Duration::from_secs(1)))
    }

    fn pipeline(dir: &Path, sampler: Arc<dyn FrameSampler>, engine: Arc<HookScoringEngine>) -> HookPipeline {
        HookPipeline::new(
            PipelineConfig {
                temp_dir: dir.to_path_buf(),
                max_upload_bytes: 1024,
            },
            engine,
        )
        .with_sampler(sampler)
    }

    fn upload(name: &str, len: usize) -> VideoUpload {
        VideoUpload {
            filename: name.into(),
            bytes: vec![7; len],
        }
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn analyzes_and_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = StubSampler::new(3);
        let pipeline = pipeline(dir.path(), sampler.clone(), fallback_engine());

        let result = pipeline
            .analyze(upload("clip.MP4", 64), SamplingParams::hook_window())
            .await
            .unwrap();

        assert_eq!(result.verdict.provider, FALLBACK_PROVIDER);
        assert_eq!(result.verdict.hook_score, FALLBACK_HOOK_SCORE);
        assert_eq!(result.total_frames_analyzed, 3);
        assert_eq!(result.video_filename, "clip.MP4");

        let seen = sampler.seen_paths.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].1, "temp file must exist while sampling");
        assert_eq!(seen[0].0.extension().unwrap(), "mp4");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn rejects_bad_extension_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = StubSampler::new(3);
        let pipeline = pipeline(dir.path(), sampler.clone(), fallback_engine());

        let err = pipeline
            .analyze(upload("notes.txt", 10), SamplingParams::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::InvalidInput(_));
        assert!(sampler.seen_paths.lock().unwrap().is_empty());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn rejects_oversize_upload() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), StubSampler::new(3), fallback_engine());

        let err = pipeline
            .analyze(upload("big.mov", 2048), SamplingParams::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::PayloadTooLarge { size: 2048, limit: 1024 });
    }

    #[tokio::test]
    async fn empty_upload_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), StubSampler::new(3), fallback_engine());

        let err = pipeline
            .analyze(upload("empty.mp4", 0), SamplingParams::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::UnreadableMedia(_));
    }

    #[tokio::test]
    async fn zero_frames_is_no_frames_extracted_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), StubSampler::new(0), fallback_engine());

        let err = pipeline
            .analyze(upload("blank.webm", 16), SamplingParams::default())
            .await
            .unwrap_err();
        assert_matches!(err, CoreError::NoFramesExtracted);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn invalid_params_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), StubSampler::new(3), fallback_engine());
        let params = SamplingParams {
            interval_seconds: 0.0,
            ..SamplingParams::default()
        };

        let err = pipeline.analyze(upload("a.mp4", 8), params).await.unwrap_err();
        assert_matches!(err, CoreError::InvalidInput(_));
    }

    #[tokio::test]
    async fn cache_hit_skips_sampling_and_scoring() {
        let dir = tempfile::tempdir().unwrap();
        let sampler = StubSampler::new(3);
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            models: vec!["m".into()],
        });
        let engine = Arc::new(HookScoringEngine::new(
            vec![provider.clone() as Arc<dyn VisionProvider>],
            Duration::from_secs(1),
        ));
        let cache: VerdictCache =
            Arc::new(MemoryTtlCache::<String, CachedVerdict>::new(Duration::from_secs(60)));
        let pipeline = pipeline(dir.path(), sampler.clone(), engine).with_cache(cache);

        let first = pipeline
            .analyze(upload("a.mp4", 32), SamplingParams::hook_window())
            .await
            .unwrap();
        let second = pipeline
            .analyze(upload("renamed.mkv", 32), SamplingParams::hook_window())
            .await
            .unwrap();

        assert_eq!(first.verdict, second.verdict);
        assert_eq!(second.verdict.hook_score, 91);
        assert_eq!(second.video_filename, "renamed.mkv");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(sampler.seen_paths.lock().unwrap().len(), 1);

        // Different sampling params miss the cache.
        pipeline
            .analyze(upload("a.mp4", 32), SamplingParams::default())
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fallback_verdict_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(RecoveringProvider {
            calls: AtomicUsize::new(0),
            models: vec!["m".into()],
        });
        let engine = Arc::new(HookScoringEngine::new(
            vec![provider.clone() as Arc<dyn VisionProvider>],
            Duration::from_secs(1),
        ));
        let cache: VerdictCache =
            Arc::new(MemoryTtlCache::<String, CachedVerdict>::new(Duration::from_secs(3600)));
        let pipeline = pipeline(dir.path(), StubSampler::new(3), engine).with_cache(cache);

        let first = pipeline
            .analyze(upload("a.mp4", 32), SamplingParams::hook_window())
            .await
            .unwrap();
        assert_eq!(first.verdict.provider, FALLBACK_PROVIDER);

        let second = pipeline
            .analyze(upload("a.mp4", 32), SamplingParams::hook_window())
            .await
            .unwrap();
        assert_eq!(second.verdict.provider, "recovering");
        assert_eq!(second.verdict.hook_score, 90);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);

        // The recovered verdict is cached.
        let third = pipeline
            .analyze(upload("a.mp4", 32), SamplingParams::hook_window())
            .await
            .unwrap();
        assert_eq!(third.verdict.hook_score, 90);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_key_separates_params() {
        let a = cache_key(b"abc", &SamplingParams::default());
        let b = cache_key(b"abc", &SamplingParams::hook_window());
        assert_ne!(a, b);
        assert!(a.starts_with("ba7816bf"));
    }
}
