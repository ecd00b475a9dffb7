//! # Video Module
//!
//! Frame data model, temporal windowing, and the decode/encode collaborators
//! that sit at either end of a pipeline run.

pub mod types;
pub mod window;
pub mod ffmpeg;
pub mod source;
pub mod sink;

pub use types::{ColorSpace, Frame, FrameStore};
pub use window::{FrameWindow, WindowBuilder};
pub use ffmpeg::FfmpegTools;
pub use source::{FfmpegSource, ImageSequenceSource, VideoSource};
pub use sink::{FfmpegSink, ImageSequenceSink, VideoSink};
