//! # Chain
//!
//! An ordered composition of processors that behaves as a single [`Processor`].
//!
//! Every step is composed once, at build time, with its layers (see
//! [`layers`](self::layers)): context propagation, processing strategy, user
//! interceptors and span observation. Events flow through the steps in configured
//! order; each step receives the output of the previous one.
//!
//! # Error propagation
//!
//! A step failure is resolved against the failing processor and then either handed
//! to the chain's [`ErrorHandler`](flowline_core::ErrorHandler), exactly once, or
//! returned to the caller. No step after the failing one runs. A handler that
//! recovers turns the failure into a successful result; a handler that rethrows
//! surfaces its failure unchanged, except that the failed event is kept.
//!
//! # Lifecycle
//!
//! `initialise` and `start` cascade to every step that participates in
//! [`Lifecycle`]. `stop` makes the chain reject new events with a
//! [`FlowError::Stopped`] failure before any step runs; in-flight events are not
//! cancelled. `dispose` cascades and stops the chain's error scheduler.

mod builder;
pub(crate) mod layers;

pub use builder::ChainBuilder;

use crate::{resolution::ErrorResolver, scheduling};
use flowline_core::{
    BoxErrorHandler, BoxProcessor, BoxScheduler, Capabilities, Component, ComponentLocation,
    Event, FlowError, Lifecycle, LifecycleError, LifecycleState, ProcessResult, ProcessingError,
    ProcessingType, Processor, StepFn, StepInfo,
};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// One composed step.
pub(crate) struct ChainStep {
    pub(crate) processor: BoxProcessor,
    pub(crate) info: StepInfo,
    pub(crate) capabilities: Capabilities,
    pub(crate) call: StepFn,
}

pub(crate) struct ChainInner {
    pub(crate) name: String,
    pub(crate) location: ComponentLocation,
    pub(crate) steps: Vec<ChainStep>,
    pub(crate) error_handler: Option<BoxErrorHandler>,
    pub(crate) error_scheduler: Option<BoxScheduler>,
    pub(crate) resolver: ErrorResolver,
    pub(crate) lifecycle: LifecycleState,
    pub(crate) can_process: AtomicBool,
    pub(crate) processing_type: ProcessingType,
}

/// An ordered sequence of processors executed as one.
///
/// Cloning is cheap and yields a handle to the same chain.
///
/// # Example
///
/// ```rust,ignore
/// let chain = Chain::builder("orders")
///     .processor(validate)
///     .processor(enrich)
///     .error_handler(OnErrorContinue::new())
///     .build();
///
/// let out = chain.process(Event::of("order-1")).await?;
/// ```
#[derive(Clone)]
pub struct Chain {
    inner: Arc<ChainInner>,
}

impl Chain {
    /// Start building a chain named `name`.
    pub fn builder(name: impl Into<String>) -> ChainBuilder {
        ChainBuilder::new(name)
    }

    pub(crate) fn from_inner(inner: ChainInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The chain's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.inner.steps.len()
    }

    /// Whether the chain has no steps.
    pub fn is_empty(&self) -> bool {
        self.inner.steps.is_empty()
    }

    /// Processor paths of the steps, in order.
    pub fn step_paths(&self) -> Vec<&str> {
        self.inner
            .steps
            .iter()
            .map(|step| step.info.location.path())
            .collect()
    }

    /// Whether the chain accepts new events.
    pub fn can_process(&self) -> bool {
        self.inner.can_process.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same chain.
    pub fn ptr_eq(a: &Chain, b: &Chain) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    async fn run(&self, event: Event) -> ProcessResult {
        if !self.can_process() {
            let stopped = ProcessingError::new(FlowError::Stopped(self.inner.name.clone()));
            return Err(self.inner.resolver.resolve(Some(self), &event, stopped));
        }

        let mut current = event;
        for step in &self.inner.steps {
            match (step.call)(current).await {
                Ok(next) => current = next,
                Err(error) => return self.route_error(step, error).await,
            }
        }
        Ok(current)
    }

    async fn route_error(&self, step: &ChainStep, error: ProcessingError) -> ProcessResult {
        let Some(handler) = &self.inner.error_handler else {
            return Err(error);
        };

        let failed_event = error.event().cloned();
        let offload = step.capabilities.contains(Capabilities::BLOCKING)
            || failed_event
                .as_ref()
                .is_some_and(|event| event.context().is_transaction_active());

        let outcome = match (&self.inner.error_scheduler, offload) {
            (Some(scheduler), true) => {
                tracing::debug!(
                    chain = %self.inner.name,
                    processor = %step.info.location,
                    scheduler = scheduler.name(),
                    "routing error to handler on scheduler"
                );
                let handler = handler.clone();
                scheduling::offload(
                    scheduler.clone(),
                    Box::pin(async move { handler.handle_dyn(error).await }),
                )
                .await
            }
            _ => handler.handle_dyn(error).await,
        };

        outcome.map_err(|rethrown| match failed_event {
            Some(event) => rethrown.with_event_if_absent(|| event),
            None => rethrown,
        })
    }

    fn lifecycle_steps(&self) -> impl Iterator<Item = &dyn Lifecycle> {
        self.inner
            .steps
            .iter()
            .filter(|step| step.capabilities.contains(Capabilities::LIFECYCLE))
            .filter_map(|step| step.processor.as_lifecycle())
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("name", &self.inner.name)
            .field("steps", &self.step_paths())
            .field("error_handler", &self.inner.error_handler.is_some())
            .finish()
    }
}

impl Processor for Chain {
    async fn process(&self, event: Event) -> ProcessResult {
        self.run(event).await
    }

    fn processing_type(&self) -> ProcessingType {
        self.inner.processing_type
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

impl Component for Chain {
    fn location(&self) -> &ComponentLocation {
        &self.inner.location
    }
}

impl Lifecycle for Chain {
    fn initialise(&self) -> Result<(), LifecycleError> {
        if self.inner.lifecycle.initialise()? {
            for step in self.lifecycle_steps() {
                step.initialise()?;
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<(), LifecycleError> {
        if self.inner.lifecycle.start()? {
            for step in self.lifecycle_steps() {
                step.start()?;
            }
        }
        self.inner.can_process.store(true, Ordering::Release);
        Ok(())
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        self.inner.can_process.store(false, Ordering::Release);
        if self.inner.lifecycle.stop()? {
            for step in self.lifecycle_steps() {
                step.stop()?;
            }
        }
        Ok(())
    }

    fn dispose(&self) {
        self.inner.can_process.store(false, Ordering::Release);
        if let Ok(true) = self.inner.lifecycle.dispose() {
            for step in self.lifecycle_steps() {
                step.dispose();
            }
            if let Some(scheduler) = &self.inner.error_scheduler {
                scheduler.stop();
            }
        }
    }
}
