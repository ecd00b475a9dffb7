//! # Transform System
//!
//! Pluggable enhancement steps. Each transform maps one frame, or a temporal
//! window of frames, to one output frame, and declares a cheap fallback for
//! positions where its primary computation fails.
//!
//! ## Built-in Kinds
//!
//! - **temporal_denoise** (alias **denoise**): windowed, same size, passthrough fallback
//! - **upscale**: single-frame, integer scale, bicubic fallback
//! - **external**: an external inference command, passthrough or bicubic fallback
//! - **passthrough**: identity
//!
//! ## Usage
//!
//! ```rust,no_run
//! use frame_enhancer::transforms::{StageConfig, TransformRegistry};
//!
//! let registry = TransformRegistry::new();
//! let upscale = registry
//!     .create(&StageConfig::new("upscale", "upscale").set("scale", 2u32), 2)
//!     .unwrap();
//! assert_eq!(upscale.scale_factor(), 2);
//! ```

pub mod registry;
pub mod traits;

// Transform implementations
pub mod denoise;
pub mod upscale;
pub mod external;
pub mod passthrough;

// Re-exports for convenience
pub use registry::TransformRegistry;
pub use traits::{Arity, ConfigValue, StageConfig, Transform, TransformInput, TransformMetadata};

// Re-export all built-in transforms
pub use denoise::TemporalDenoise;
pub use upscale::SpatialUpscale;
pub use external::ExternalModel;
pub use passthrough::Passthrough;
