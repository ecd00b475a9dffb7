use std::collections::HashMap;

use crate::error::{Result, TransformError};
use crate::transforms::{
    ExternalModel, Passthrough, SpatialUpscale, StageConfig, TemporalDenoise, Transform,
};

/// Factory that turns a stage configuration into a transform
///
/// The second argument is the pipeline-wide default window radius.
pub type TransformFactory = Box<dyn Fn(&StageConfig, usize) -> Result<Box<dyn Transform>> + Send + Sync>;

/// Registry for managing available transform kinds
///
/// Stage configurations name a `kind`; the registry maps it to a factory so
/// new models can be plugged in without touching the stage or pipeline code.
pub struct TransformRegistry {
    factories: HashMap<String, TransformFactory>,
}

impl TransformRegistry {
    /// Create a new registry with all built-in kinds
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register_builtin_kinds();
        registry
    }

    /// Register all built-in kinds
    fn register_builtin_kinds(&mut self) {
        self.register("temporal_denoise", |config, radius| {
            Ok(Box::new(TemporalDenoise::from_config(config, radius)?))
        });

        self.register("denoise", |config, radius| {
            Ok(Box::new(TemporalDenoise::from_config(config, radius)?))
        });

        self.register("upscale", |config, _| {
            Ok(Box::new(SpatialUpscale::from_config(config)?))
        });

        self.register("external", |config, radius| {
            Ok(Box::new(ExternalModel::from_config(config, radius)?))
        });

        self.register("passthrough", |config, _| {
            Ok(Box::new(Passthrough::new(config.name.clone())))
        });
    }

    /// Register a custom transform kind
    ///
    /// # Arguments
    ///
    /// * `kind` - Unique kind name referenced by stage configurations
    /// * `factory` - Function that builds a transform from a stage configuration
    pub fn register<K, F>(&mut self, kind: K, factory: F)
    where
        K: Into<String>,
        F: Fn(&StageConfig, usize) -> Result<Box<dyn Transform>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.into(), Box::new(factory));
    }

    /// Build the transform for a stage
    pub fn create(&self, config: &StageConfig, default_radius: usize) -> Result<Box<dyn Transform>> {
        let factory = self
            .factories
            .get(&config.kind)
            .ok_or_else(|| TransformError::UnknownKind {
                kind: config.kind.clone(),
            })?;
        factory(config, default_radius)
    }

    /// Get all available kind names, sorted
    pub fn available_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Check if a kind is available
    pub fn has_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Get the number of registered kinds
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new()
    }
}
