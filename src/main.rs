use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use frame_enhancer::{
    config::Config,
    error::RunError,
    pipeline::{MediaKind, PipelineRun, RunOutcome},
    transforms::TransformRegistry,
};

#[derive(Parser)]
#[command(
    name = "frame-enhancer",
    version,
    about = "Denoise and upscale video through a chain of enhancement stages",
    long_about = "Frame-Enhancer decodes a video into frames, runs them through a temporal denoiser and a spatial upscaler (or any configured stage list), and encodes the result with the original frame rate. Frames whose model step fails fall back to a cheap substitute instead of aborting the run."
)]
struct Cli {
    /// Input video file (or image directory with --images)
    input: PathBuf,

    /// Output path; defaults to <stem>_enhanced.mp4 next to the input
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base directory for the run workspace
    #[arg(long)]
    temp_dir: Option<PathBuf>,

    /// Keep the run workspace for inspection
    #[arg(long)]
    keep_temp: bool,

    /// Default temporal window radius for windowed stages
    #[arg(long)]
    radius: Option<usize>,

    /// Worker threads per stage
    #[arg(long)]
    workers: Option<usize>,

    /// Read and write numbered image directories instead of video files
    #[arg(long)]
    images: bool,

    /// Write every stage's output frames into the workspace (implies --keep-temp)
    #[arg(long)]
    dump_intermediates: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let name = if self.images {
            format!("{}_enhanced", stem)
        } else {
            format!("{}_enhanced.mp4", stem)
        };

        self.input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(name)
    }

    /// Command-line flags take precedence over the configuration file
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(dir) = &self.temp_dir {
            config.pipeline.temp_dir = Some(dir.clone());
        }
        if let Some(radius) = self.radius {
            config.pipeline.window_radius = radius;
        }
        if let Some(workers) = self.workers {
            config.pipeline.workers = workers;
        }
        if self.dump_intermediates {
            config.pipeline.dump_intermediates = true;
            config.pipeline.keep_temp = true;
        }
        if self.keep_temp {
            config.pipeline.keep_temp = true;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match e.downcast_ref::<RunError>() {
                Some(run_err) if run_err.is_cancelled() => error!("Run cancelled: {}", run_err.source),
                Some(run_err) => error!("{} phase failed: {}", run_err.phase, run_err.source.user_message()),
                None => error!("{:#}", e),
            }
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    info!("Starting Frame-Enhancer v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };
    cli.apply_overrides(&mut config);

    let media = if cli.images { MediaKind::ImageSequence } else { MediaKind::Video };
    let input = cli.input.clone();
    let output = cli.output_path();
    info!("Input: {:?}", input);
    info!("Output: {:?}", output);

    let registry = TransformRegistry::new();
    let mut pipeline_run = PipelineRun::from_config(&config, &registry, media)
        .context("Failed to set up the pipeline")?;

    let cancel = pipeline_run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the frames in flight");
            cancel.cancel();
        }
    });

    let report = tokio::task::spawn_blocking(move || pipeline_run.run(&input, &output))
        .await
        .context("Pipeline worker panicked")??;

    if let Some(workspace) = &report.workspace {
        info!("Workspace kept at {:?}", workspace);
    }

    let outcome = report.outcome();
    match outcome {
        RunOutcome::Success => {
            info!("Enhancement complete! Output saved to: {:?}", report.output);
        }
        RunOutcome::RecoveredWithWarnings { fallback_events } => {
            warn!(
                "Enhancement complete with {} fallback frames. Output saved to: {:?}",
                fallback_events, report.output
            );
            for (stage, count) in report.fallbacks_by_stage() {
                warn!("   {}: {} frames used the fallback", stage, count);
            }
        }
    }

    Ok(outcome.exit_code())
}
