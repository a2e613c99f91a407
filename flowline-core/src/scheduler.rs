//! # Schedulers and Processing Strategies
//!
//! A [`Scheduler`] runs detached tasks, immediately or after a delay. It is used for
//! off-thread error routing, until-successful retry timers and fork-join branches.
//!
//! A [`ProcessingStrategy`] decides, per chain step, whether the step runs inline or
//! is handed to a scheduler based on the step's [`ProcessingType`].

use crate::{
    error::FlowError,
    processor::{ProcessingType, StepFuture},
};
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

/// A detached unit of work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Shared, type-erased scheduler.
pub type BoxScheduler = Arc<dyn Scheduler>;

/// Runs tasks off the submitting task.
pub trait Scheduler: Send + Sync + 'static {
    /// Name used in logs and rejection errors.
    fn name(&self) -> &str;

    /// Run `task` as soon as possible.
    ///
    /// Fails with [`FlowError::RejectedExecution`] once the scheduler is stopped.
    fn submit(&self, task: Task) -> Result<(), FlowError>;

    /// Run `task` after `delay`.
    fn schedule(&self, delay: Duration, task: Task) -> Result<(), FlowError>;

    /// Stop accepting tasks.
    fn stop(&self);

    /// Whether [`Scheduler::stop`] was called.
    fn is_stopped(&self) -> bool;
}

/// Execution-thread policy of a chain.
pub trait ProcessingStrategy: Send + Sync + 'static {
    /// Wrap the future of one step, possibly moving it to a scheduler.
    fn on_processor(&self, processing_type: ProcessingType, step: StepFuture) -> StepFuture;

    /// Scheduler used for work of the given type, if the strategy has one.
    fn scheduler_for(&self, processing_type: ProcessingType) -> Option<BoxScheduler>;
}

/// Shared, type-erased processing strategy.
pub type BoxProcessingStrategy = Arc<dyn ProcessingStrategy>;
