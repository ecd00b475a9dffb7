//! # Spatial Upscale
//!
//! Single-frame resolution increase by an integer factor. The primary path
//! uses a sharp resampling filter and falls back to bicubic.

mod resize;

pub use resize::{parse_filter, resize_frame, SpatialUpscale};

// Upscale-specific parameter names
pub const SCALE: &str = "scale";
pub const FILTER: &str = "filter";

pub const DEFAULT_SCALE: u32 = 2;
pub const MAX_SCALE: u32 = 8;
