use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    error::{Result, RunError, RunPhase},
    pipeline::{
        cancel::CancellationToken,
        chain::{Pipeline, PipelineOutput},
        stage::FallbackEvent,
    },
    transforms::TransformRegistry,
    video::{
        FfmpegSink, FfmpegSource, FfmpegTools, FrameStore, ImageSequenceSink, ImageSequenceSource, VideoSink,
        VideoSource,
    },
};

/// Prefix of every run workspace directory
pub const WORKSPACE_PREFIX: &str = "frame_enhance_";

/// Scoped temporary directory owned by exactly one run
///
/// Removed when dropped unless it was created with `keep` set, in which case
/// the directory is left on disk for inspection. Only the uniquely named
/// workspace is ever removed, never the base directory it was created in.
pub struct RunWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl RunWorkspace {
    pub fn create(base: Option<&Path>, keep: bool) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);

        let dir = match base {
            Some(base) => {
                std::fs::create_dir_all(base)?;
                builder.tempdir_in(base)?
            }
            None => builder.tempdir()?,
        };

        let path = dir.path().to_path_buf();
        debug!("Created run workspace {:?}", path);
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Close the workspace, returning its path if it stays on disk
    pub fn close(mut self) -> Option<PathBuf> {
        self.release()
    }

    fn release(&mut self) -> Option<PathBuf> {
        let dir = self.dir.take()?;
        if self.keep {
            let path = dir.into_path();
            info!("Keeping run workspace at {:?}", path);
            Some(path)
        } else {
            if let Err(e) = dir.close() {
                warn!("Failed to remove run workspace {:?}: {}", self.path, e);
            }
            None
        }
    }
}

impl Drop for RunWorkspace {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

/// Run-level settings that do not affect stage semantics
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub keep_temp: bool,
    pub temp_dir: Option<PathBuf>,
    pub dump_intermediates: bool,
}

/// Which pair of collaborators a run decodes from and encodes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    /// Video container through ffmpeg
    #[default]
    Video,
    /// Directory of numbered images
    ImageSequence,
}

/// How a completed run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    RecoveredWithWarnings { fallback_events: usize },
}

impl RunOutcome {
    /// Process exit code; fatal runs exit with 1
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Success => 0,
            RunOutcome::RecoveredWithWarnings { .. } => 2,
        }
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub frames: usize,
    pub frame_rate: f64,
    pub input_resolution: Option<(u32, u32)>,
    pub output_resolution: Option<(u32, u32)>,
    pub stages: Vec<String>,
    pub fallback_events: Vec<FallbackEvent>,
    /// Workspace left on disk when `keep_temp` was set
    pub workspace: Option<PathBuf>,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
}

impl RunReport {
    pub fn outcome(&self) -> RunOutcome {
        if self.fallback_events.is_empty() {
            RunOutcome::Success
        } else {
            RunOutcome::RecoveredWithWarnings {
                fallback_events: self.fallback_events.len(),
            }
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Fallback counts per stage, in first-seen order
    pub fn fallbacks_by_stage(&self) -> Vec<(String, usize)> {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for event in &self.fallback_events {
            match counts.iter_mut().find(|(stage, _)| *stage == event.stage) {
                Some((_, count)) => *count += 1,
                None => counts.push((event.stage.clone(), 1)),
            }
        }
        counts
    }
}

/// Top-level orchestration: decode, run the pipeline, encode
///
/// The sink is only invoked once the whole pipeline has produced its final
/// store, so a fatal failure never leaves a partially written output.
pub struct PipelineRun {
    source: Box<dyn VideoSource>,
    sink: Box<dyn VideoSink>,
    pipeline: Pipeline,
    options: RunOptions,
}

impl PipelineRun {
    pub fn new(
        source: Box<dyn VideoSource>,
        sink: Box<dyn VideoSink>,
        pipeline: Pipeline,
        options: RunOptions,
    ) -> Self {
        Self {
            source,
            sink,
            pipeline,
            options,
        }
    }

    /// Build collaborators and stages from a validated configuration
    pub fn from_config(config: &Config, registry: &TransformRegistry, media: MediaKind) -> Result<Self> {
        config.validate_with(registry)?;

        let source: Box<dyn VideoSource>;
        let sink: Box<dyn VideoSink>;
        match media {
            MediaKind::Video => {
                let tools = FfmpegTools::locate(config.video.ffmpeg_path.as_deref());
                source = Box::new(FfmpegSource::new(tools.clone()));
                sink = Box::new(FfmpegSink::new(tools, config.video.codec.clone(), config.video.quality));
            }
            MediaKind::ImageSequence => {
                source = Box::new(ImageSequenceSource::new(config.video.image_sequence_fps));
                sink = Box::new(ImageSequenceSink);
            }
        }

        let pipeline = Pipeline::from_config(&config.pipeline, registry, CancellationToken::new())?;

        let options = RunOptions {
            keep_temp: config.pipeline.keep_temp,
            temp_dir: config.pipeline.temp_dir.clone(),
            dump_intermediates: config.pipeline.dump_intermediates,
        };

        Ok(Self::new(source, sink, pipeline, options))
    }

    /// Token that stops the run between frame positions when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.pipeline.cancellation_token().clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Enhance `input` into `output`
    pub fn run(&mut self, input: &Path, output: &Path) -> std::result::Result<RunReport, RunError> {
        let started_at = Local::now();
        info!("🎬 Enhancing {:?} -> {:?}", input, output);
        info!(
            "   Source: {}, sink: {}, stages: [{}]",
            self.source.name(),
            self.sink.name(),
            self.pipeline.stage_names().join(", ")
        );

        let workspace = RunWorkspace::create(self.options.temp_dir.as_deref(), self.options.keep_temp)
            .map_err(|e| RunError::new(RunPhase::Setup, e))?;

        // Step 1: load models
        if let Err(e) = self.pipeline.initialize() {
            if let Err(cleanup) = self.pipeline.finalize() {
                warn!("Transform cleanup after failed initialization reported an error: {}", cleanup);
            }
            return Err(RunError::new(RunPhase::Setup, e));
        }

        // Steps 2 and 3: decode and enhance; transforms are released on every path
        let processed = self.decode_and_process(input, &workspace);
        if let Err(e) = self.pipeline.finalize() {
            warn!("Transform cleanup reported an error: {}", e);
        }
        let (decoded, processed) = processed?;

        // Step 4: encode with the source's frame rate
        info!("💾 Encoding {} frames at {:.3} fps", processed.store.len(), decoded.frame_rate);
        self.sink
            .encode(&processed.store, decoded.frame_rate, output, workspace.path())
            .map_err(|e| RunError::new(RunPhase::Encode, e))?;

        let report = RunReport {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            frames: processed.store.len(),
            frame_rate: decoded.frame_rate,
            input_resolution: decoded.resolution,
            output_resolution: processed.store.resolution(),
            stages: self.pipeline.stage_names(),
            fallback_events: processed.fallback_events,
            workspace: workspace.close(),
            started_at,
            finished_at: Local::now(),
        };

        info!(
            "🎉 Enhanced {} frames in {:.1}s ({} fallbacks)",
            report.frames,
            report.duration().num_milliseconds() as f64 / 1000.0,
            report.fallback_events.len()
        );
        Ok(report)
    }

    fn decode_and_process(
        &self,
        input: &Path,
        workspace: &RunWorkspace,
    ) -> std::result::Result<(DecodedInfo, PipelineOutput), RunError> {
        info!("📼 Decoding {:?}", input);
        let store = self
            .source
            .decode(input, workspace.path())
            .map_err(|e| RunError::new(RunPhase::Decode, e))?;

        let decoded = DecodedInfo {
            frame_rate: store.frame_rate(),
            resolution: store.resolution(),
        };
        info!(
            "   {} frames, {:?}, {:.3} fps",
            store.len(),
            decoded.resolution,
            decoded.frame_rate
        );

        info!("✨ Running {} stages", self.pipeline.len());
        let processed = if self.options.dump_intermediates {
            self.pipeline
                .run_with(store, |index, stage, output| {
                    let directory = workspace.path().join(format!("{}_{}", index, stage.name()));
                    dump_store(output, &directory, workspace.path());
                })
        } else {
            self.pipeline.run(store)
        };

        let processed = processed.map_err(|e| RunError::new(RunPhase::Pipeline, e))?;
        Ok((decoded, processed))
    }
}

struct DecodedInfo {
    frame_rate: f64,
    resolution: Option<(u32, u32)>,
}

fn dump_store(store: &FrameStore, directory: &Path, scratch: &Path) {
    match ImageSequenceSink.encode(store, store.frame_rate(), directory, scratch) {
        Ok(()) => debug!("Dumped intermediate frames to {:?}", directory),
        Err(e) => warn!("Failed to dump intermediate frames to {:?}: {}", directory, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EnhanceError, PipelineError, SinkError, SourceError, TransformError};
    use crate::pipeline::chain::PipelineOptions;
    use crate::transforms::{Arity, SpatialUpscale, TemporalDenoise, Transform, TransformInput};
    use crate::video::Frame;
    use image::imageops::FilterType;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// In-memory source; `None` behaves like an unreadable input
    struct MemorySource {
        store: Option<FrameStore>,
    }

    impl VideoSource for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        fn decode(&self, path: &Path, _scratch: &Path) -> Result<FrameStore> {
            self.store.clone().ok_or_else(|| {
                SourceError::Unavailable {
                    path: path.display().to_string(),
                    reason: "no such video".to_string(),
                }
                .into()
            })
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Encoded {
        frames: usize,
        frame_rate: f64,
        resolution: Option<(u32, u32)>,
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        calls: Arc<Mutex<Vec<Encoded>>>,
        fail: bool,
    }

    impl VideoSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        fn encode(&self, store: &FrameStore, frame_rate: f64, path: &Path, _scratch: &Path) -> Result<()> {
            if self.fail {
                return Err(SinkError::WriteFailed {
                    path: path.display().to_string(),
                    reason: "disk full".to_string(),
                }
                .into());
            }
            self.calls.lock().unwrap().push(Encoded {
                frames: store.len(),
                frame_rate,
                resolution: store.resolution(),
            });
            Ok(())
        }
    }

    /// Compute fails everywhere, fallback fails at `broken_at`
    struct Failing {
        broken_at: Option<usize>,
        finalized: Arc<AtomicUsize>,
    }

    impl Transform for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "test double"
        }

        fn arity(&self) -> Arity {
            Arity::Windowed { radius: 1 }
        }

        fn compute(&self, _input: &TransformInput<'_>) -> Result<Frame> {
            Err(TransformError::InferenceFailed {
                name: "failing".to_string(),
                reason: "backend offline".to_string(),
            }
            .into())
        }

        fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
            if Some(input.position()) == self.broken_at {
                return Err(EnhanceError::generic("frame corrupted"));
            }
            Ok(input.primary().clone())
        }

        fn finalize(&mut self) -> Result<()> {
            self.finalized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn store_of(n: usize, size: u32) -> FrameStore {
        let frames = (0..n).map(|i| Frame::new_filled(i, size, size, [i as u8, 50, 90])).collect();
        FrameStore::new(frames, 23.976).unwrap()
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            workers: 2,
            progress_interval: 0,
            cancel: CancellationToken::new(),
        }
    }

    fn two_stage() -> Pipeline {
        let transforms: Vec<Box<dyn Transform>> = vec![
            Box::new(TemporalDenoise::new("denoise", 2, 12.0, 1.0)),
            Box::new(SpatialUpscale::new("upscale", 2, FilterType::Lanczos3)),
        ];
        Pipeline::new(transforms, options()).unwrap()
    }

    fn run_options(base: &Path, keep_temp: bool) -> RunOptions {
        RunOptions {
            keep_temp,
            temp_dir: Some(base.to_path_buf()),
            dump_intermediates: false,
        }
    }

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_two_stage_run_reaches_sink() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(4, 64)) }),
            Box::new(sink.clone()),
            two_stage(),
            run_options(base.path(), false),
        );

        let report = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap();

        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec![Encoded {
                frames: 4,
                frame_rate: 23.976,
                resolution: Some((128, 128)),
            }]
        );
        assert_eq!(report.frames, 4);
        assert_eq!(report.input_resolution, Some((64, 64)));
        assert_eq!(report.output_resolution, Some((128, 128)));
        assert_eq!(report.outcome(), RunOutcome::Success);
        assert_eq!(report.outcome().exit_code(), 0);
        assert!(report.workspace.is_none());
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_empty_input_invokes_sink_with_zero_frames() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(FrameStore::empty(30.0)) }),
            Box::new(sink.clone()),
            two_stage(),
            run_options(base.path(), false),
        );

        let report = run.run(Path::new("empty.mp4"), Path::new("out.mp4")).unwrap();

        let calls = sink.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].frames, 0);
        assert_eq!(calls[0].frame_rate, 30.0);
        assert_eq!(report.outcome(), RunOutcome::Success);
    }

    #[test]
    fn test_fatal_stage_failure_skips_sink_and_cleans_up() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let finalized = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            vec![Box::new(Failing {
                broken_at: Some(3),
                finalized: finalized.clone(),
            })],
            options(),
        )
        .unwrap();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(6, 8)) }),
            Box::new(sink.clone()),
            pipeline,
            run_options(base.path(), false),
        );

        let err = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap_err();

        assert_eq!(err.phase, RunPhase::Pipeline);
        assert_eq!(err.stage.as_deref(), Some("failing"));
        assert_eq!(err.frame_index, Some(3));
        assert!(sink.calls.lock().unwrap().is_empty());
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert_eq!(entries(base.path()), 0);
    }

    /// Model that never loads and also fails to release
    struct Unloadable {
        finalized: Arc<AtomicUsize>,
    }

    impl Transform for Unloadable {
        fn name(&self) -> &str {
            "unloadable"
        }

        fn description(&self) -> &str {
            "test double"
        }

        fn arity(&self) -> Arity {
            Arity::SingleFrame
        }

        fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
            Ok(input.primary().clone())
        }

        fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
            Ok(input.primary().clone())
        }

        fn initialize(&mut self) -> Result<()> {
            Err(EnhanceError::generic("weights missing"))
        }

        fn finalize(&mut self) -> Result<()> {
            self.finalized.fetch_add(1, Ordering::SeqCst);
            Err(EnhanceError::generic("device busy"))
        }
    }

    #[test]
    fn test_setup_failure_keeps_initialize_error_over_cleanup_error() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let finalized = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(
            vec![Box::new(Unloadable {
                finalized: finalized.clone(),
            })],
            options(),
        )
        .unwrap();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(3, 8)) }),
            Box::new(sink.clone()),
            pipeline,
            run_options(base.path(), false),
        );

        let err = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap_err();

        assert_eq!(err.phase, RunPhase::Setup);
        assert!(err.source.to_string().contains("weights missing"));
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
        assert!(sink.calls.lock().unwrap().is_empty());
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_recovered_run_reports_warnings() {
        let base = tempdir().unwrap();
        let pipeline = Pipeline::new(
            vec![Box::new(Failing {
                broken_at: None,
                finalized: Arc::new(AtomicUsize::new(0)),
            })],
            options(),
        )
        .unwrap();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(5, 8)) }),
            Box::new(RecordingSink::default()),
            pipeline,
            run_options(base.path(), false),
        );

        let report = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap();

        assert_eq!(report.outcome(), RunOutcome::RecoveredWithWarnings { fallback_events: 5 });
        assert_eq!(report.outcome().exit_code(), 2);
        assert_eq!(report.fallbacks_by_stage(), vec![("failing".to_string(), 5)]);
    }

    #[test]
    fn test_source_failure_is_decode_phase() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: None }),
            Box::new(sink.clone()),
            two_stage(),
            run_options(base.path(), false),
        );

        let err = run.run(Path::new("missing.mp4"), Path::new("out.mp4")).unwrap_err();

        assert_eq!(err.phase, RunPhase::Decode);
        assert!(matches!(err.source, EnhanceError::Source(SourceError::Unavailable { .. })));
        assert!(sink.calls.lock().unwrap().is_empty());
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_sink_failure_is_encode_phase() {
        let base = tempdir().unwrap();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(2, 8)) }),
            Box::new(RecordingSink {
                fail: true,
                ..RecordingSink::default()
            }),
            two_stage(),
            run_options(base.path(), false),
        );

        let err = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap_err();
        assert_eq!(err.phase, RunPhase::Encode);
        assert_eq!(err.frame_index, None);
    }

    #[test]
    fn test_keep_temp_retains_workspace_and_dumps() {
        let base = tempdir().unwrap();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(3, 8)) }),
            Box::new(RecordingSink::default()),
            two_stage(),
            RunOptions {
                keep_temp: true,
                temp_dir: Some(base.path().to_path_buf()),
                dump_intermediates: true,
            },
        );

        let report = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap();

        let workspace = report.workspace.unwrap();
        assert!(workspace.starts_with(base.path()));
        assert!(workspace.join("0_denoise").join("frame_00000001.png").exists());
        assert!(workspace.join("1_upscale").join("frame_00000003.png").exists());
        assert_eq!(entries(base.path()), 1);
    }

    #[test]
    fn test_workspaces_are_unique_per_run() {
        let base = tempdir().unwrap();
        let a = RunWorkspace::create(Some(base.path()), false).unwrap();
        let b = RunWorkspace::create(Some(base.path()), false).unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(WORKSPACE_PREFIX)));

        drop(a);
        drop(b);
        assert!(base.path().exists());
        assert_eq!(entries(base.path()), 0);
    }

    #[test]
    fn test_cancelled_run_never_encodes() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(4, 8)) }),
            Box::new(sink.clone()),
            two_stage(),
            run_options(base.path(), false),
        );
        run.cancellation_token().cancel();

        let err = run.run(Path::new("in.mp4"), Path::new("out.mp4")).unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.phase, RunPhase::Pipeline);
        assert!(matches!(err.source, EnhanceError::Pipeline(PipelineError::Cancelled { .. })));
        assert!(sink.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_image_sequence_run_from_config() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input");
        let output = dir.path().join("output");
        ImageSequenceSink.encode(&store_of(3, 8), 30.0, &input, dir.path()).unwrap();

        let mut config = Config::default();
        config.pipeline.workers = 2;
        config.pipeline.temp_dir = Some(dir.path().join("tmp"));
        config.video.image_sequence_fps = 12.0;

        let mut run = PipelineRun::from_config(&config, &TransformRegistry::new(), MediaKind::ImageSequence).unwrap();
        let report = run.run(&input, &output).unwrap();

        assert_eq!(report.frames, 3);
        assert_eq!(report.frame_rate, 12.0);
        assert!(output.join("frame_00000003.png").exists());
        assert_eq!(image::open(output.join("frame_00000001.png")).unwrap().width(), 16);
    }

    #[tokio::test]
    async fn test_run_on_blocking_thread() {
        let base = tempdir().unwrap();
        let sink = RecordingSink::default();
        let mut run = PipelineRun::new(
            Box::new(MemorySource { store: Some(store_of(2, 16)) }),
            Box::new(sink.clone()),
            two_stage(),
            run_options(base.path(), false),
        );

        let report = tokio::task::spawn_blocking(move || run.run(Path::new("in.mp4"), Path::new("out.mp4")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.output_resolution, Some((32, 32)));
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
    }
}
