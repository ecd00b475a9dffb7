use std::path::{Path, PathBuf};
use std::process::Command;

use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::{
    error::{Result, TransformError},
    transforms::traits::{Arity, StageConfig, Transform, TransformInput, TransformMetadata},
    transforms::upscale::{resize_frame, MAX_SCALE},
    video::Frame,
};

use super::{COMMAND, MODEL, SCALE, WINDOWED};

/// Transform whose compute path is an external inference command
pub struct ExternalModel {
    name: String,
    arity: Arity,
    scale: u32,
    command: Vec<String>,
    model: Option<PathBuf>,
    model_available: bool,
}

impl ExternalModel {
    pub fn new(name: impl Into<String>, arity: Arity, scale: u32, command: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arity,
            scale,
            command,
            model: None,
            model_available: true,
        }
    }

    pub fn with_model<P: Into<PathBuf>>(mut self, model: P) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn from_config(config: &StageConfig, default_radius: usize) -> Result<Self> {
        let command: Vec<String> = match config.parameters.get(COMMAND) {
            Some(value) => match (value.as_list(), value.as_string()) {
                (Some(items), _) => items.to_vec(),
                (None, Some(line)) => line.split_whitespace().map(str::to_string).collect(),
                _ => return Err(config.invalid(format!("{} must be a string or list of strings", COMMAND)).into()),
            },
            None => return Err(config.invalid(format!("missing '{}' parameter", COMMAND)).into()),
        };
        if command.is_empty() {
            return Err(config.invalid(format!("{} is empty", COMMAND)).into());
        }

        let scale = match config.parameters.get(SCALE) {
            Some(value) => value
                .as_u32()
                .ok_or_else(|| config.invalid(format!("{} must be a positive integer", SCALE)))?,
            None => 1,
        };
        if scale == 0 || scale > MAX_SCALE {
            return Err(config.invalid(format!("{} must be within 1..={}, got {}", SCALE, MAX_SCALE, scale)).into());
        }

        let arity = if config.get_bool(WINDOWED).unwrap_or(false) {
            Arity::Windowed {
                radius: config.radius.unwrap_or(default_radius),
            }
        } else {
            Arity::SingleFrame
        };

        let mut model = Self::new(config.name.clone(), arity, scale, command);
        if let Some(path) = config.get_string(MODEL) {
            model = model.with_model(path);
        }
        Ok(model)
    }

    fn inference_failed(&self, reason: impl Into<String>) -> TransformError {
        TransformError::InferenceFailed {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn expand_args(&self, input_dir: &Path, input: &Path, output: &Path) -> Vec<String> {
        let radius = self.arity.radius().unwrap_or(0).to_string();
        let model = self
            .model
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let vars = [
            ("{input_dir}", input_dir.display().to_string()),
            ("{input}", input.display().to_string()),
            ("{output}", output.display().to_string()),
            ("{radius}", radius),
            ("{model}", model),
        ];

        self.command
            .iter()
            .map(|arg| {
                vars.iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect()
    }
}

impl Transform for ExternalModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Inference through an external model command"
    }

    fn arity(&self) -> Arity {
        self.arity
    }

    fn scale_factor(&self) -> u32 {
        self.scale
    }

    fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
        if !self.model_available {
            return Err(self.inference_failed("model file not found").into());
        }

        let scratch = tempfile::Builder::new()
            .prefix("frame_enhancer_infer_")
            .tempdir()?;
        let input_dir = scratch.path().join("input");
        std::fs::create_dir_all(&input_dir)?;

        let frames = input.frames();
        for (k, frame) in frames.iter().enumerate() {
            frame
                .save_png(input_dir.join(format!("frame_{:02}.png", k)))
                .map_err(|e| self.inference_failed(format!("cannot stage input frame: {}", e)))?;
        }

        let center_slot = frames.len() / 2;
        let input_path = input_dir.join(format!("frame_{:02}.png", center_slot));
        let output_path = scratch.path().join("output.png");

        let args = self.expand_args(&input_dir, &input_path, &output_path);
        debug!("Running inference command for frame {}: {}", input.position(), args.join(" "));

        let (program, rest) = args
            .split_first()
            .ok_or_else(|| self.inference_failed("empty command"))?;
        let output = Command::new(program)
            .args(rest)
            .output()
            .map_err(|e| self.inference_failed(format!("failed to spawn {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self
                .inference_failed(format!("command exited with {}: {}", output.status, stderr.trim()))
                .into());
        }

        let result = image::open(&output_path)
            .map_err(|e| self.inference_failed(format!("unreadable output: {}", e)))?;

        let primary = input.primary();
        Ok(Frame::new(input.position(), result.to_rgb8()).with_colorspace(primary.colorspace()))
    }

    /// Passthrough for same-size models, bicubic resize otherwise
    fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
        let primary = input.primary();
        if self.scale == 1 {
            Ok(primary.clone())
        } else {
            Ok(resize_frame(primary, self.scale, FilterType::CatmullRom))
        }
    }

    fn metadata(&self) -> TransformMetadata {
        TransformMetadata {
            uses_backend: true,
            performance_impact: 1.0,
            fallback: (if self.scale == 1 { "passthrough" } else { "bicubic resize" }).to_string(),
            optional_parameters: vec![
                (MODEL.to_string(), "Model file substituted for {model}; missing files disable compute".to_string()),
                (WINDOWED.to_string(), "Feed a temporal window instead of one frame".to_string()),
                (SCALE.to_string(), "Integer output scale factor (default 1)".to_string()),
            ],
        }
    }

    fn initialize(&mut self) -> Result<()> {
        if let Some(model) = &self.model {
            self.model_available = model.exists();
            if !self.model_available {
                warn!("Model {:?} for '{}' not found; every frame will use the fallback", model, self.name);
            }
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::video::{FrameStore, WindowBuilder};

    fn cp_command(from: &str) -> Vec<String> {
        vec!["cp".to_string(), from.to_string(), "{output}".to_string()]
    }

    #[test]
    fn test_single_frame_command_roundtrip() {
        let frame = Frame::new_filled(4, 6, 6, [12, 34, 56]);
        let model = ExternalModel::new("copy", Arity::SingleFrame, 1, cp_command("{input}"));

        let out = model.compute(&TransformInput::Frame(&frame)).unwrap();
        assert_eq!(out, frame);
    }

    #[test]
    fn test_windowed_command_sees_reflected_window() {
        let frames = (0..4).map(|i| Frame::new_filled(i, 4, 4, [i as u8 * 50, 0, 0])).collect();
        let store = FrameStore::new(frames, 30.0).unwrap();
        let model = ExternalModel::new(
            "first",
            Arity::Windowed { radius: 2 },
            1,
            cp_command("{input_dir}/frame_00.png"),
        );

        // Window at 0 is [2, 1, 0, 1, 2]; slot 0 holds frame 2
        let window = WindowBuilder::build(&store, 0, 2).unwrap();
        let out = model.compute(&TransformInput::Window(&window)).unwrap();

        assert_eq!(out.index(), 0);
        assert_eq!(out.get_pixel(0, 0), [100, 0, 0]);
    }

    #[test]
    fn test_failing_command_is_inference_error() {
        let frame = Frame::new_black(0, 4, 4);
        let model = ExternalModel::new("broken", Arity::SingleFrame, 2, vec!["false".to_string()]);

        let err = model.compute(&TransformInput::Frame(&frame)).unwrap_err();
        assert!(err.is_recoverable());

        let fallback = model.fallback(&TransformInput::Frame(&frame)).unwrap();
        assert_eq!(fallback.dimensions(), (8, 8));
    }

    #[test]
    fn test_missing_model_disables_compute() {
        let frame = Frame::new_black(0, 4, 4);
        let mut model = ExternalModel::new("copy", Arity::SingleFrame, 1, cp_command("{input}"))
            .with_model("/definitely/not/here.pt");

        model.initialize().unwrap();
        assert!(model.compute(&TransformInput::Frame(&frame)).is_err());
    }

    #[test]
    fn test_config_parsing() {
        let config = StageConfig::new("model", "external")
            .set(COMMAND, "infer --in {input_dir} --out {output}")
            .set(WINDOWED, true)
            .set(SCALE, 2u32);
        let model = ExternalModel::from_config(&config, 2).unwrap();

        assert_eq!(model.arity(), Arity::Windowed { radius: 2 });
        assert_eq!(model.scale_factor(), 2);

        let args = model.expand_args(Path::new("/in"), Path::new("/in/frame_02.png"), Path::new("/out.png"));
        assert_eq!(args, vec!["infer", "--in", "/in", "--out", "/out.png"]);

        let missing = StageConfig::new("model", "external");
        assert!(ExternalModel::from_config(&missing, 2).is_err());
    }
}
