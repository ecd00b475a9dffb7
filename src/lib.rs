//! # Frame Enhancer
//!
//! Enhance video by running every frame through a chain of pluggable stages,
//! typically a windowed temporal denoiser followed by a spatial upscaler.
//!
//! The library guarantees that every stage emits exactly one frame per input
//! position, in order, with the input frame rate, no matter which models are
//! plugged in or how many frames fell back to their cheap substitute.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frame_enhancer::{
//!     config::Config,
//!     pipeline::{MediaKind, PipelineRun},
//!     transforms::TransformRegistry,
//! };
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let registry = TransformRegistry::new();
//!
//! let mut run = PipelineRun::from_config(&config, &registry, MediaKind::Video)?;
//! let report = run.run(Path::new("input.mp4"), Path::new("input_enhanced.mp4"))?;
//! println!("{} frames, {} fallbacks", report.frames, report.fallback_events.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Frames, frame stores, reflection-padded windows, decode/encode
//! - [`transforms`] - The [`Transform`](transforms::Transform) trait and built-in kinds
//! - [`pipeline`] - Stages, pipelines, cancellation and whole-run orchestration
//! - [`config`] - Configuration management
//!
//! ## Custom Transforms
//!
//! Implement [`Transform`](transforms::Transform) and register a factory for
//! it under a new kind:
//!
//! ```rust,no_run
//! use frame_enhancer::transforms::{Arity, Transform, TransformInput, TransformRegistry};
//! use frame_enhancer::video::Frame;
//! use frame_enhancer::Result;
//!
//! struct Invert;
//!
//! impl Transform for Invert {
//!     fn name(&self) -> &str {
//!         "invert"
//!     }
//!
//!     fn description(&self) -> &str {
//!         "Colour inversion"
//!     }
//!
//!     fn arity(&self) -> Arity {
//!         Arity::SingleFrame
//!     }
//!
//!     fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
//!         let mut image = input.primary().as_image().clone();
//!         image::imageops::invert(&mut image);
//!         Ok(Frame::new(input.position(), image))
//!     }
//!
//!     fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
//!         Ok(input.primary().clone())
//!     }
//! }
//!
//! let mut registry = TransformRegistry::new();
//! registry.register("invert", |_config, _radius| Ok(Box::new(Invert)));
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod transforms;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{EnhanceError, Result, RunError, RunPhase},
    pipeline::{CancellationToken, Pipeline, PipelineRun, RunOutcome, RunReport},
    transforms::{Transform, TransformRegistry},
    video::{Frame, FrameStore},
};
