use std::time::Instant;

use tracing::{info, warn};

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result},
    pipeline::{
        cancel::CancellationToken,
        stage::{ExecutionContext, FallbackEvent, Stage},
    },
    transforms::{Transform, TransformRegistry},
    video::FrameStore,
};

/// Execution settings shared by every stage of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub workers: usize,
    pub progress_interval: usize,
    pub cancel: CancellationToken,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            progress_interval: 50,
            cancel: CancellationToken::new(),
        }
    }
}

/// Final store of a pipeline plus every fallback recorded on the way
#[derive(Debug)]
pub struct PipelineOutput {
    pub store: FrameStore,
    pub fallback_events: Vec<FallbackEvent>,
}

/// Ordered composition of stages
///
/// The output store of stage `k` is the input of stage `k + 1`. A pipeline
/// without stages returns its input unchanged.
pub struct Pipeline {
    stages: Vec<Stage>,
    context: ExecutionContext,
}

impl Pipeline {
    pub fn new(transforms: Vec<Box<dyn Transform>>, options: PipelineOptions) -> Result<Self> {
        let context = ExecutionContext::new(options.workers, options.progress_interval, options.cancel)?;
        Ok(Self {
            stages: transforms.into_iter().map(Stage::new).collect(),
            context,
        })
    }

    /// Build every configured stage through the registry
    pub fn from_config(
        config: &PipelineConfig,
        registry: &TransformRegistry,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let transforms = config
            .stages
            .iter()
            .map(|stage| registry.create(stage, config.window_radius))
            .collect::<Result<Vec<_>>>()?;

        Self::new(
            transforms,
            PipelineOptions {
                workers: config.workers,
                progress_interval: config.progress_interval,
                cancel,
            },
        )
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        self.context.cancellation_token()
    }

    /// Initialize every transform, stopping at the first failure
    pub fn initialize(&mut self) -> Result<()> {
        for stage in &mut self.stages {
            stage.initialize()?;
        }
        Ok(())
    }

    /// Finalize every transform, even after one of them fails
    ///
    /// Returns the first error encountered.
    pub fn finalize(&mut self) -> Result<()> {
        let mut first_error = None;
        for stage in &mut self.stages {
            if let Err(e) = stage.finalize() {
                warn!("Failed to finalize stage '{}': {}", stage.name(), e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn run(&self, input: FrameStore) -> Result<PipelineOutput> {
        self.run_with(input, |_, _, _| {})
    }

    /// Run every stage in order, handing each stage's output to `observer`
    pub fn run_with<F>(&self, input: FrameStore, mut observer: F) -> Result<PipelineOutput>
    where
        F: FnMut(usize, &Stage, &FrameStore),
    {
        let mut store = input;
        let mut fallback_events = Vec::new();

        for (index, stage) in self.stages.iter().enumerate() {
            if self.context.cancellation_token().is_cancelled() {
                return Err(PipelineError::Cancelled {
                    stage: stage.name().to_string(),
                    completed: 0,
                }
                .into());
            }

            let started = Instant::now();
            let output = stage.run(&store, index, &self.context)?;

            info!(
                "Stage {} '{}' finished in {:.2?} ({} fallbacks)",
                index,
                stage.name(),
                started.elapsed(),
                output.fallback_events.len()
            );

            observer(index, stage, &output.store);
            fallback_events.extend(output.fallback_events);
            store = output.store;
        }

        Ok(PipelineOutput { store, fallback_events })
    }
}
