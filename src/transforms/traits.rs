use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    error::{Result, TransformError},
    video::{Frame, FrameWindow},
};

/// How many frames a transform consumes per output frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One frame in, one frame out
    SingleFrame,
    /// A reflection-padded window of `2 * radius + 1` frames in, the centre frame out
    Windowed { radius: usize },
}

impl Arity {
    pub fn radius(&self) -> Option<usize> {
        match self {
            Arity::SingleFrame => None,
            Arity::Windowed { radius } => Some(*radius),
        }
    }
}

/// The input handed to a transform for one output position
#[derive(Debug, Clone, Copy)]
pub enum TransformInput<'a> {
    Frame(&'a Frame),
    Window(&'a FrameWindow<'a>),
}

impl<'a> TransformInput<'a> {
    /// The frame this input's output position corresponds to
    pub fn primary(&self) -> &'a Frame {
        match self {
            TransformInput::Frame(frame) => *frame,
            TransformInput::Window(window) => window.center(),
        }
    }

    pub fn position(&self) -> usize {
        self.primary().index()
    }

    /// Every frame this input carries, in window order
    pub fn frames(&self) -> Vec<&'a Frame> {
        match self {
            TransformInput::Frame(frame) => vec![*frame],
            TransformInput::Window(window) => window.frames().to_vec(),
        }
    }

    /// Require a single frame, failing with a typed error for window input
    pub fn expect_frame(&self, transform: &str) -> Result<&'a Frame> {
        match self {
            TransformInput::Frame(frame) => Ok(*frame),
            TransformInput::Window(_) => Err(TransformError::WrongInput {
                name: transform.to_string(),
                input: "windowed",
            }
            .into()),
        }
    }

    /// Require a window, failing with a typed error for single-frame input
    pub fn expect_window(&self, transform: &str) -> Result<&'a FrameWindow<'a>> {
        match self {
            TransformInput::Window(window) => Ok(*window),
            TransformInput::Frame(_) => Err(TransformError::WrongInput {
                name: transform.to_string(),
                input: "single-frame",
            }
            .into()),
        }
    }
}

/// Core trait that every enhancement step implements
///
/// A transform is a black box: frame(s) in, one frame out. `compute` is the
/// expensive primary path (usually a model) and may fail for any reason;
/// `fallback` is a cheap deterministic substitute for the same input. Both
/// must produce frames of [`Transform::output_dimensions`].
///
/// Transforms must not keep state between calls. Positions may be computed
/// in any order and on any thread.
pub trait Transform: Send + Sync {
    /// Returns the unique name of this transform
    fn name(&self) -> &str;

    /// Returns a human-readable description of this transform
    fn description(&self) -> &str;

    fn arity(&self) -> Arity;

    /// Uniform output scale factor (1 for same-size transforms)
    fn scale_factor(&self) -> u32 {
        1
    }

    /// Output shape for an input of the given shape
    fn output_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.scale_factor();
        (width * scale, height * scale)
    }

    /// Primary computation for one output position
    fn compute(&self, input: &TransformInput<'_>) -> Result<Frame>;

    /// Cheap substitute used when `compute` fails for this input
    fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame>;

    /// Get transform-specific metadata or capabilities
    fn metadata(&self) -> TransformMetadata {
        TransformMetadata::default()
    }

    /// Load any resources needed by this transform
    ///
    /// Called once before the pipeline runs.
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release resources held by this transform
    ///
    /// Called once after the pipeline finishes, on success and failure alike.
    fn finalize(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Configuration for one pipeline stage
///
/// `kind` selects the transform implementation from the registry, `name`
/// labels the stage in logs and errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    pub name: String,

    pub kind: String,

    /// Temporal half-width for windowed kinds; falls back to the pipeline default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<usize>,

    /// Kind-specific parameters
    #[serde(default)]
    pub parameters: HashMap<String, ConfigValue>,
}

impl StageConfig {
    pub fn new<N: Into<String>, K: Into<String>>(name: N, kind: K) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            radius: None,
            parameters: HashMap::new(),
        }
    }

    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ConfigValue>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Get a parameter value as a float
    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.parameters.get(key).and_then(|v| v.as_f32())
    }

    /// Get a parameter value as an unsigned integer
    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.parameters.get(key).and_then(|v| v.as_u32())
    }

    /// Get a parameter value as a boolean
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(|v| v.as_bool())
    }

    /// Get a parameter value as a string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_string())
    }

    /// Get a parameter value with a default
    pub fn get_f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_f32(key).unwrap_or(default)
    }

    /// Error helper for kind-specific validation failures
    pub fn invalid(&self, details: impl Into<String>) -> TransformError {
        TransformError::InvalidConfig {
            name: self.name.clone(),
            details: details.into(),
        }
    }
}

/// Flexible configuration value that can hold different types
///
/// Integers are tried first so that `scale = 2` stays an integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    String(String),
    List(Vec<String>),
}

impl ConfigValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConfigValue::Float(f) => Some(*f as f32),
            ConfigValue::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ConfigValue::Integer(i) => u32::try_from(*i).ok(),
            ConfigValue::Float(f) if f.fract() == 0.0 && *f >= 0.0 => Some(*f as u32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value as f64)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<u32> for ConfigValue {
    fn from(value: u32) -> Self {
        ConfigValue::Integer(value as i64)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(value: Vec<String>) -> Self {
        ConfigValue::List(value)
    }
}

/// Metadata about a transform's capabilities and characteristics
#[derive(Debug, Clone, Default)]
pub struct TransformMetadata {
    /// Whether compute delegates to an external inference backend
    pub uses_backend: bool,

    /// Estimated cost per frame (0.0 = trivial, 1.0 = heavy)
    pub performance_impact: f32,

    /// Short description of the fallback path
    pub fallback: String,

    /// List of optional parameters with descriptions
    pub optional_parameters: Vec<(String, String)>,
}
