use image::imageops::{self, FilterType};

use crate::{
    error::Result,
    transforms::traits::{Arity, StageConfig, Transform, TransformInput, TransformMetadata},
    video::Frame,
};

use super::{DEFAULT_SCALE, FILTER, MAX_SCALE, SCALE};

/// Parse a resampling filter name as used in stage parameters
pub fn parse_filter(name: &str) -> Option<FilterType> {
    match name.to_lowercase().as_str() {
        "nearest" => Some(FilterType::Nearest),
        "triangle" | "bilinear" => Some(FilterType::Triangle),
        "catmullrom" | "bicubic" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" | "lanczos" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

/// Resize a frame by an integer factor, keeping its index and colour space
pub fn resize_frame(frame: &Frame, scale: u32, filter: FilterType) -> Frame {
    let (width, height) = frame.dimensions();
    let resized = imageops::resize(frame.as_image(), width * scale, height * scale, filter);
    Frame::new(frame.index(), resized).with_colorspace(frame.colorspace())
}

/// Integer-factor spatial upscaler
pub struct SpatialUpscale {
    name: String,
    scale: u32,
    filter: FilterType,
}

impl SpatialUpscale {
    pub fn new(name: impl Into<String>, scale: u32, filter: FilterType) -> Self {
        Self {
            name: name.into(),
            scale,
            filter,
        }
    }

    pub fn from_config(config: &StageConfig) -> Result<Self> {
        let scale = match config.parameters.get(SCALE) {
            Some(value) => value
                .as_u32()
                .ok_or_else(|| config.invalid(format!("{} must be a positive integer", SCALE)))?,
            None => DEFAULT_SCALE,
        };
        if scale == 0 || scale > MAX_SCALE {
            return Err(config.invalid(format!("{} must be within 1..={}, got {}", SCALE, MAX_SCALE, scale)).into());
        }

        let filter = match config.get_string(FILTER) {
            Some(name) => parse_filter(name).ok_or_else(|| config.invalid(format!("unknown filter '{}'", name)))?,
            None => FilterType::Lanczos3,
        };

        Ok(Self::new(config.name.clone(), scale, filter))
    }
}

impl Transform for SpatialUpscale {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Integer-factor spatial upscaling"
    }

    fn arity(&self) -> Arity {
        Arity::SingleFrame
    }

    fn scale_factor(&self) -> u32 {
        self.scale
    }

    fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
        let frame = input.expect_frame(&self.name)?;
        Ok(resize_frame(frame, self.scale, self.filter))
    }

    /// Bicubic resize of the same input
    fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
        Ok(resize_frame(input.primary(), self.scale, FilterType::CatmullRom))
    }

    fn metadata(&self) -> TransformMetadata {
        TransformMetadata {
            uses_backend: false,
            performance_impact: 0.3,
            fallback: "bicubic resize".to_string(),
            optional_parameters: vec![
                (SCALE.to_string(), format!("Integer scale factor 1-{} (default {})", MAX_SCALE, DEFAULT_SCALE)),
                (FILTER.to_string(), "nearest, bilinear, bicubic, gaussian or lanczos3 (default)".to_string()),
            ],
        }
    }
}
