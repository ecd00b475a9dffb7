//! # Pipeline Module
//!
//! Runs transforms over whole frame stores. A [`Stage`] applies one transform
//! to every position and absorbs per-frame failures through the transform's
//! fallback; a [`Pipeline`] chains stages; a [`PipelineRun`] wraps a pipeline
//! with a video source, a sink and a scoped workspace.

pub mod cancel;
pub mod chain;
pub mod run;
pub mod stage;

pub use cancel::CancellationToken;
pub use chain::{Pipeline, PipelineOptions, PipelineOutput};
pub use run::{MediaKind, PipelineRun, RunOptions, RunOutcome, RunReport, RunWorkspace};
pub use stage::{ExecutionContext, FallbackEvent, Stage, StageOutput};
