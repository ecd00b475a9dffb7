//! # Temporal Denoise
//!
//! Windowed denoiser that averages each pixel with its temporal neighbours,
//! weighting them down by distance in time and in colour.

mod temporal;

pub use temporal::TemporalDenoise;

// Denoise-specific parameter names
pub const STRENGTH: &str = "strength";
pub const TEMPORAL_FALLOFF: &str = "temporal_falloff";

pub const DEFAULT_STRENGTH: f32 = 12.0;
pub const DEFAULT_TEMPORAL_FALLOFF: f32 = 1.0;
/// Below this the colour kernel collapses to exact-match only
pub const MIN_STRENGTH: f32 = 0.01;
