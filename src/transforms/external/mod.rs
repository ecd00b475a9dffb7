//! # External Model
//!
//! Reaches an inference backend through an external command. Input frames are
//! exchanged as PNG files in a per-call scratch directory.
//!
//! Command arguments may contain these placeholders:
//!
//! - `{input_dir}` - directory holding `frame_00.png`, `frame_01.png`, ... in window order
//! - `{input}` - the centre (or only) input frame
//! - `{output}` - where the command must write its result frame
//! - `{radius}` - temporal radius, `0` for single-frame models
//! - `{model}` - the configured model path

mod command;

pub use command::ExternalModel;

// External-model parameter names
pub const COMMAND: &str = "command";
pub const MODEL: &str = "model";
pub const WINDOWED: &str = "windowed";
pub const SCALE: &str = "scale";
