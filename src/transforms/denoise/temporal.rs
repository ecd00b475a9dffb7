use crate::{
    error::{Result, TransformError},
    transforms::traits::{Arity, StageConfig, Transform, TransformInput, TransformMetadata},
    video::{Frame, FrameWindow},
};

use super::{DEFAULT_STRENGTH, DEFAULT_TEMPORAL_FALLOFF, MIN_STRENGTH, STRENGTH, TEMPORAL_FALLOFF};

/// Windowed temporal denoiser
///
/// Every output pixel is a weighted mean of the same pixel across the window.
/// Neighbours further away in time, or whose colour differs strongly from the
/// centre pixel (motion, scene cuts), contribute less, which keeps moving
/// edges from ghosting.
pub struct TemporalDenoise {
    name: String,
    radius: usize,
    temporal_weights: Vec<f32>,
    colour_weights: [f32; 256],
}

impl TemporalDenoise {
    pub fn new(name: impl Into<String>, radius: usize, strength: f32, temporal_falloff: f32) -> Self {
        let spread = radius.max(1) as f32;
        let temporal_weights = (0..=2 * radius)
            .map(|k| {
                let d = k as f32 - radius as f32;
                (-(d * d) * temporal_falloff / (2.0 * spread * spread)).exp()
            })
            .collect();

        let mut colour_weights = [0.0f32; 256];
        for (diff, weight) in colour_weights.iter_mut().enumerate() {
            let diff = diff as f32;
            *weight = (-(diff * diff) / (2.0 * strength * strength)).exp();
        }
        // Identical colours always count fully, even when strength underflows
        colour_weights[0] = 1.0;

        Self {
            name: name.into(),
            radius,
            temporal_weights,
            colour_weights,
        }
    }

    /// Build from a stage configuration, using `default_radius` when the stage sets none
    pub fn from_config(config: &StageConfig, default_radius: usize) -> Result<Self> {
        let radius = config.radius.unwrap_or(default_radius);
        let strength = config.get_f32_or(STRENGTH, DEFAULT_STRENGTH);
        let falloff = config.get_f32_or(TEMPORAL_FALLOFF, DEFAULT_TEMPORAL_FALLOFF);

        if !(strength.is_finite() && strength >= MIN_STRENGTH) {
            return Err(config
                .invalid(format!("{} must be at least {}, got {}", STRENGTH, MIN_STRENGTH, strength))
                .into());
        }
        if !(falloff.is_finite() && falloff >= 0.0) {
            return Err(config.invalid(format!("{} must be non-negative, got {}", TEMPORAL_FALLOFF, falloff)).into());
        }

        Ok(Self::new(config.name.clone(), radius, strength, falloff))
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    fn denoise_window(&self, window: &FrameWindow<'_>) -> Result<Frame> {
        let center = window.center();
        let (width, height) = center.dimensions();

        if let Some(odd) = window.frames().iter().find(|f| f.dimensions() != (width, height)) {
            return Err(TransformError::ShapeMismatch {
                name: self.name.clone(),
                expected_width: width,
                expected_height: height,
                actual_width: odd.width(),
                actual_height: odd.height(),
            }
            .into());
        }

        let center_raw = center.as_raw();
        let neighbours: Vec<&[u8]> = window.frames().iter().map(|f| f.as_raw()).collect();
        let mut output = vec![0u8; center_raw.len()];

        for (px, out) in output.chunks_exact_mut(3).enumerate() {
            let base = px * 3;
            let c0 = &center_raw[base..base + 3];
            let mut acc = [0.0f32; 3];
            let mut total = 0.0f32;

            for (k, raw) in neighbours.iter().enumerate() {
                let sample = &raw[base..base + 3];
                let diff = (0..3)
                    .map(|c| (sample[c] as i32 - c0[c] as i32).unsigned_abs())
                    .sum::<u32>()
                    / 3;
                let weight = self.temporal_weights[k] * self.colour_weights[diff.min(255) as usize];

                for c in 0..3 {
                    acc[c] += weight * sample[c] as f32;
                }
                total += weight;
            }

            if !total.is_finite() || total <= 0.0 {
                return Err(TransformError::InferenceFailed {
                    name: self.name.clone(),
                    reason: format!("degenerate weights at pixel {}", px),
                }
                .into());
            }
            for c in 0..3 {
                out[c] = (acc[c] / total).round().clamp(0.0, 255.0) as u8;
            }
        }

        Frame::from_rgb_bytes(center.index(), width, height, output)
            .map(|frame| frame.with_colorspace(center.colorspace()))
    }
}

impl Transform for TemporalDenoise {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Temporal denoising over a reflection-padded frame window"
    }

    fn arity(&self) -> Arity {
        Arity::Windowed { radius: self.radius }
    }

    fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
        let window = input.expect_window(&self.name)?;
        self.denoise_window(window)
    }

    /// Passthrough of the centre frame
    fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
        Ok(input.primary().clone())
    }

    fn metadata(&self) -> TransformMetadata {
        TransformMetadata {
            uses_backend: false,
            performance_impact: 0.4,
            fallback: "passthrough".to_string(),
            optional_parameters: vec![
                (STRENGTH.to_string(), "Colour distance tolerance (default 12.0)".to_string()),
                (TEMPORAL_FALLOFF.to_string(), "How quickly far neighbours lose weight (default 1.0)".to_string()),
            ],
        }
    }
}
