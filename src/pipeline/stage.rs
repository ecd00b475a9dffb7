use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    error::{EnhanceError, PipelineError, Result, TransformError},
    pipeline::cancel::CancellationToken,
    transforms::{Arity, Transform, TransformInput},
    video::{Frame, FrameStore, WindowBuilder},
};

/// One recovered per-frame failure: compute failed, the fallback was used
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackEvent {
    pub stage: String,
    pub frame_index: usize,
    pub error: String,
}

/// Everything a stage produced
#[derive(Debug)]
pub struct StageOutput {
    pub store: FrameStore,
    pub fallback_events: Vec<FallbackEvent>,
}

/// Shared execution resources for running stages
pub struct ExecutionContext {
    pool: rayon::ThreadPool,
    cancel: CancellationToken,
    progress_interval: usize,
}

impl ExecutionContext {
    pub fn new(workers: usize, progress_interval: usize, cancel: CancellationToken) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("stage-worker-{}", i))
            .build()
            .map_err(|e| PipelineError::WorkerPool { reason: e.to_string() })?;

        Ok(Self {
            pool,
            cancel,
            progress_interval,
        })
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

enum Position {
    Done(Frame, Option<FallbackEvent>),
    Failed(EnhanceError),
    Skipped,
}

/// Applies one transform to every position of a store
///
/// A stage always emits exactly one frame per input position. Compute
/// failures are absorbed by the transform's fallback and recorded as
/// [`FallbackEvent`]s; a failing fallback aborts the whole stage.
pub struct Stage {
    transform: Box<dyn Transform>,
}

impl Stage {
    pub fn new(transform: Box<dyn Transform>) -> Self {
        Self { transform }
    }

    pub fn name(&self) -> &str {
        self.transform.name()
    }

    pub fn transform(&self) -> &dyn Transform {
        self.transform.as_ref()
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.transform.initialize()
    }

    pub fn finalize(&mut self) -> Result<()> {
        self.transform.finalize()
    }

    /// Run the transform over every position of `input`
    ///
    /// Positions may complete in any order; output is assembled by index.
    pub fn run(&self, input: &FrameStore, stage_index: usize, ctx: &ExecutionContext) -> Result<StageOutput> {
        let total = input.len();
        let Some((width, height)) = input.resolution() else {
            debug!("Stage '{}' received an empty store", self.name());
            return Ok(StageOutput {
                store: FrameStore::empty(input.frame_rate()),
                fallback_events: Vec::new(),
            });
        };
        let expected = self.transform.output_dimensions(width, height);

        info!(
            "Stage {} '{}': {} frames {}x{} -> {}x{} on {} workers",
            stage_index, self.name(), total, width, height, expected.0, expected.1, ctx.workers()
        );

        // Lowest position whose fallback failed; positions above it are skipped
        let first_failure = AtomicUsize::new(usize::MAX);
        let completed = AtomicUsize::new(0);

        let positions: Vec<Position> = ctx.pool.install(|| {
            (0..total)
                .into_par_iter()
                .map(|i| {
                    if i > first_failure.load(Ordering::SeqCst) || ctx.cancel.is_cancelled() {
                        return Position::Skipped;
                    }

                    match self.process_position(input, i, expected, stage_index) {
                        Ok((frame, event)) => {
                            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                            if ctx.progress_interval > 0 && done % ctx.progress_interval == 0 {
                                info!("{}: {}/{} frames", self.name(), done, total);
                            }
                            Position::Done(frame, event)
                        }
                        Err(e) => {
                            first_failure.fetch_min(i, Ordering::SeqCst);
                            Position::Failed(e)
                        }
                    }
                })
                .collect()
        });

        let mut frames = Vec::with_capacity(total);
        let mut fallback_events = Vec::new();
        let mut skipped = false;

        // Every position below the lowest failure ran, so the first Failed in
        // index order is the same one an in-order run would hit
        for position in positions {
            match position {
                Position::Done(frame, event) => {
                    frames.push(frame);
                    fallback_events.extend(event);
                }
                Position::Failed(e) => return Err(e),
                Position::Skipped => skipped = true,
            }
        }

        if skipped {
            return Err(PipelineError::Cancelled {
                stage: self.name().to_string(),
                completed: completed.load(Ordering::SeqCst),
            }
            .into());
        }

        if !fallback_events.is_empty() {
            warn!(
                "Stage '{}' used its fallback for {} of {} frames",
                self.name(), fallback_events.len(), total
            );
        }

        Ok(StageOutput {
            store: FrameStore::new(frames, input.frame_rate())?,
            fallback_events,
        })
    }

    fn process_position(
        &self,
        input: &FrameStore,
        index: usize,
        expected: (u32, u32),
        stage_index: usize,
    ) -> Result<(Frame, Option<FallbackEvent>)> {
        let fatal = |reason: String| -> EnhanceError {
            PipelineError::StageFailed {
                stage_index,
                stage: self.name().to_string(),
                frame_index: index,
                reason,
            }
            .into()
        };

        let window;
        let transform_input = match self.transform.arity() {
            Arity::SingleFrame => {
                let frame = input
                    .get(index)
                    .ok_or_else(|| fatal(format!("no frame at position {}", index)))?;
                TransformInput::Frame(frame)
            }
            Arity::Windowed { radius } => {
                window = WindowBuilder::build(input, index, radius).map_err(|e| fatal(e.to_string()))?;
                TransformInput::Window(&window)
            }
        };

        let computed = self
            .transform
            .compute(&transform_input)
            .and_then(|frame| self.check_shape(frame, expected));

        match computed {
            Ok(frame) => Ok((frame.with_index(index), None)),
            Err(compute_err) => {
                warn!(
                    stage = self.name(),
                    frame = index,
                    "compute failed, using fallback: {}", compute_err
                );

                let frame = self
                    .transform
                    .fallback(&transform_input)
                    .and_then(|frame| self.check_shape(frame, expected))
                    .map_err(|fallback_err| {
                        fatal(format!(
                            "fallback failed ({}) after compute error ({})",
                            fallback_err, compute_err
                        ))
                    })?;

                let event = FallbackEvent {
                    stage: self.name().to_string(),
                    frame_index: index,
                    error: compute_err.to_string(),
                };
                Ok((frame.with_index(index), Some(event)))
            }
        }
    }

    fn check_shape(&self, frame: Frame, expected: (u32, u32)) -> Result<Frame> {
        if frame.dimensions() == expected {
            return Ok(frame);
        }

        Err(TransformError::ShapeMismatch {
            name: self.name().to_string(),
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: frame.width(),
            actual_height: frame.height(),
        }
        .into())
    }
}
