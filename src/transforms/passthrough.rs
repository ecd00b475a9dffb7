use crate::{
    error::Result,
    transforms::traits::{Arity, Transform, TransformInput},
    video::Frame,
};

/// Identity transform, mostly useful for disabling a stage without removing it
pub struct Passthrough {
    name: String,
}

impl Passthrough {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Transform for Passthrough {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Copies every frame unchanged"
    }

    fn arity(&self) -> Arity {
        Arity::SingleFrame
    }

    fn compute(&self, input: &TransformInput<'_>) -> Result<Frame> {
        Ok(input.primary().clone())
    }

    fn fallback(&self, input: &TransformInput<'_>) -> Result<Frame> {
        Ok(input.primary().clone())
    }
}
