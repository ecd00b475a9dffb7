use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, Result},
    transforms::{StageConfig, TransformRegistry},
};

/// Largest temporal half-width a windowed stage may use
pub const MAX_WINDOW_RADIUS: usize = 8;

/// Main configuration for a frame-enhancer run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Stage list and execution settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Decode/encode settings
    #[serde(default)]
    pub video: VideoConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration against the built-in transform kinds
    pub fn validate(&self) -> Result<()> {
        self.validate_with(&TransformRegistry::new())
    }

    /// Validate the configuration against a specific registry
    pub fn validate_with(&self, registry: &TransformRegistry) -> Result<()> {
        self.pipeline.validate(registry)?;
        self.video.validate()?;
        Ok(())
    }
}

/// Pipeline execution configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Default temporal half-width for windowed stages
    pub window_radius: usize,

    /// Keep the run workspace after the run finishes
    pub keep_temp: bool,

    /// Abort on the first fatal stage failure (the only supported mode)
    pub fail_fast: bool,

    /// Worker threads per stage
    pub workers: usize,

    /// Frames between progress log lines, 0 to disable
    pub progress_interval: usize,

    /// Write every stage's output frames into the workspace
    pub dump_intermediates: bool,

    /// Base directory for run workspaces (system temp dir when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_dir: Option<PathBuf>,

    /// Ordered stage list
    pub stages: Vec<StageConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_radius: 2,
            keep_temp: false,
            fail_fast: true,
            workers: num_cpus::get(),
            progress_interval: 50,
            dump_intermediates: false,
            temp_dir: None,
            stages: vec![
                StageConfig::new("denoise", "temporal_denoise"),
                StageConfig::new("upscale", "upscale").set("scale", 2u32),
            ],
        }
    }
}

impl PipelineConfig {
    fn validate(&self, registry: &TransformRegistry) -> Result<()> {
        if self.window_radius > MAX_WINDOW_RADIUS {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.window_radius".to_string(),
                value: self.window_radius.to_string()
            }.into());
        }

        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.workers".to_string(),
                value: self.workers.to_string()
            }.into());
        }

        // Recovering from a fatal stage failure would break the frame count guarantee
        if !self.fail_fast {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.fail_fast".to_string(),
                value: "false".to_string()
            }.into());
        }

        let mut seen = HashSet::new();
        for (index, stage) in self.stages.iter().enumerate() {
            if stage.name.trim().is_empty() {
                return Err(ConfigError::MissingKey {
                    key: format!("pipeline.stages[{}].name", index),
                }.into());
            }

            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::InvalidValue {
                    key: format!("pipeline.stages[{}].name", index),
                    value: format!("duplicate stage name '{}'", stage.name)
                }.into());
            }

            if !registry.has_kind(&stage.kind) {
                return Err(ConfigError::InvalidValue {
                    key: format!("pipeline.stages[{}].kind", index),
                    value: format!("'{}' (available: {})", stage.kind, registry.available_kinds().join(", "))
                }.into());
            }

            if let Some(radius) = stage.radius.filter(|r| *r > MAX_WINDOW_RADIUS) {
                return Err(ConfigError::InvalidValue {
                    key: format!("pipeline.stages[{}].radius", index),
                    value: radius.to_string()
                }.into());
            }
        }

        Ok(())
    }
}

/// Decode/encode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VideoConfig {
    /// ffmpeg video codec for the output container
    pub codec: String,

    /// Output quality 0-100, mapped to a CRF value
    pub quality: u8,

    /// Frame rate assumed for image-sequence input
    pub image_sequence_fps: f64,

    /// Explicit ffmpeg binary; discovered when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<PathBuf>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            quality: 85,
            image_sequence_fps: 30.0,
            ffmpeg_path: None,
        }
    }
}

impl VideoConfig {
    fn validate(&self) -> Result<()> {
        if self.quality > 100 {
            return Err(ConfigError::InvalidValue {
                key: "video.quality".to_string(),
                value: self.quality.to_string()
            }.into());
        }

        if !(self.image_sequence_fps.is_finite() && self.image_sequence_fps > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "video.image_sequence_fps".to_string(),
                value: self.image_sequence_fps.to_string()
            }.into());
        }

        if self.codec.trim().is_empty() {
            return Err(ConfigError::MissingKey { key: "video.codec".to_string() }.into());
        }

        Ok(())
    }
}
