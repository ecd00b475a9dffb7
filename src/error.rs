use std::fmt;

use thiserror::Error;

/// Main error type for the frame-enhancer library
#[derive(Error, Debug)]
pub enum EnhanceError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Video source error: {0}")]
    Source(#[from] SourceError),

    #[error("Video sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Frame and frame-store errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame index {index} out of range for store of {len} frames")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Frame {index} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: usize,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Invalid frame buffer: {reason}")]
    InvalidBuffer { reason: String },
}

/// Errors raised by a transform's compute or fallback path
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Transform '{name}' does not accept {input} input")]
    WrongInput { name: String, input: &'static str },

    #[error("Inference failed in '{name}': {reason}")]
    InferenceFailed { name: String, reason: String },

    #[error("Transform '{name}' produced {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    ShapeMismatch {
        name: String,
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("Unknown transform kind: {kind}")]
    UnknownKind { kind: String },

    #[error("Transform '{name}' configuration invalid: {details}")]
    InvalidConfig { name: String, details: String },
}

/// Pipeline-level (fatal) errors
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage {stage_index} ('{stage}') failed at frame {frame_index}: {reason}")]
    StageFailed {
        stage_index: usize,
        stage: String,
        frame_index: usize,
        reason: String,
    },

    #[error("Run cancelled during stage '{stage}' after {completed} frames")]
    Cancelled { stage: String, completed: usize },

    #[error("Worker pool setup failed: {reason}")]
    WorkerPool { reason: String },
}

/// External video source errors
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source unavailable: {path} ({reason})")]
    Unavailable { path: String, reason: String },

    #[error("Invalid frame rate reported for {path}: {value}")]
    InvalidFrameRate { path: String, value: String },
}

/// External video sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write {path}: {reason}")]
    WriteFailed { path: String, reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using EnhanceError
pub type Result<T> = std::result::Result<T, EnhanceError>;

impl EnhanceError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Check if this error can be absorbed by a transform fallback
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transform(TransformError::InferenceFailed { .. }) => true,
            Self::Transform(TransformError::ShapeMismatch { .. }) => true,
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Source(SourceError::Unavailable { path, .. }) => {
                format!("Could not open video '{}'. Please check the file exists and ffmpeg can decode it.", path)
            }
            Self::Sink(SinkError::WriteFailed { path, .. }) => {
                format!("Could not write output '{}'. Check the destination is writable and ffmpeg is installed.", path)
            }
            Self::Transform(TransformError::UnknownKind { kind }) => {
                format!("Transform kind '{}' not found. Available kinds: temporal_denoise, upscale, external, passthrough", kind)
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }

    /// Frame index carried by this error, if any
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::Pipeline(PipelineError::StageFailed { frame_index, .. }) => Some(*frame_index),
            Self::Frame(FrameError::IndexOutOfRange { index, .. }) => Some(*index),
            Self::Frame(FrameError::DimensionMismatch { index, .. }) => Some(*index),
            _ => None,
        }
    }

    /// Stage name carried by this error, if any
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Pipeline(PipelineError::StageFailed { stage, .. }) => Some(stage),
            Self::Pipeline(PipelineError::Cancelled { stage, .. }) => Some(stage),
            _ => None,
        }
    }
}

/// Phase of a pipeline run in which a fatal error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Setup,
    Decode,
    Pipeline,
    Encode,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Setup => "setup",
            RunPhase::Decode => "decode",
            RunPhase::Pipeline => "pipeline",
            RunPhase::Encode => "encode",
        };
        f.write_str(name)
    }
}

/// The single typed error a failed run reports to its caller
#[derive(Error, Debug)]
#[error("{phase} phase failed: {source}")]
pub struct RunError {
    pub phase: RunPhase,
    pub stage: Option<String>,
    pub frame_index: Option<usize>,
    #[source]
    pub source: EnhanceError,
}

impl RunError {
    /// Wrap an error with the phase it occurred in, lifting stage/frame context out of it
    pub fn new(phase: RunPhase, source: EnhanceError) -> Self {
        Self {
            phase,
            stage: source.stage().map(str::to_string),
            frame_index: source.frame_index(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, EnhanceError::Pipeline(PipelineError::Cancelled { .. }))
    }
}
