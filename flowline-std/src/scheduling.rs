//! Tokio-backed schedulers and processing strategies.
//!
//! - [`TokioScheduler`] - A [`Scheduler`] spawning onto a tokio runtime
//! - [`DirectProcessingStrategy`] - Every step runs inline on the caller's task
//! - [`WorkerPoolProcessingStrategy`] - Steps are moved to a CPU-light or a
//!   blocking scheduler according to their [`ProcessingType`]
//! - [`offload`] - Run a step future on a scheduler and await its result

use flowline_core::{
    BoxScheduler, FlowError, ProcessingError, ProcessingStrategy, ProcessingType, Scheduler,
    StepFuture, Task,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{runtime::Handle, sync::oneshot};

/// A [`Scheduler`] spawning tasks onto a tokio runtime.
#[derive(Debug)]
pub struct TokioScheduler {
    name: String,
    handle: Handle,
    stopped: AtomicBool,
}

impl TokioScheduler {
    /// Create a scheduler on the given runtime.
    pub fn new(name: impl Into<String>, handle: Handle) -> Self {
        Self {
            name: name.into(),
            handle,
            stopped: AtomicBool::new(false),
        }
    }

    /// Create a scheduler on the runtime of the calling task.
    ///
    /// Returns `None` outside of a tokio runtime.
    pub fn current(name: impl Into<String>) -> Option<Self> {
        Handle::try_current().ok().map(|handle| Self::new(name, handle))
    }

    fn rejected(&self) -> FlowError {
        FlowError::RejectedExecution(self.name.clone())
    }
}

impl Scheduler for TokioScheduler {
    fn name(&self) -> &str {
        &self.name
    }

    fn submit(&self, task: Task) -> Result<(), FlowError> {
        if self.is_stopped() {
            return Err(self.rejected());
        }
        self.handle.spawn(task);
        Ok(())
    }

    fn schedule(&self, delay: Duration, task: Task) -> Result<(), FlowError> {
        if self.is_stopped() {
            return Err(self.rejected());
        }
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Ok(())
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            tracing::debug!(scheduler = %self.name, "scheduler stopped");
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Run `step` on `scheduler` and resolve to its result.
///
/// Fails with [`FlowError::RejectedExecution`] if the scheduler refuses the task or
/// drops it before it completes.
pub fn offload(scheduler: BoxScheduler, step: StepFuture) -> StepFuture {
    Box::pin(async move {
        let (tx, rx) = oneshot::channel();
        scheduler.submit(Box::pin(async move {
            let _ = tx.send(step.await);
        }))?;
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ProcessingError::new(FlowError::RejectedExecution(
                scheduler.name().to_owned(),
            ))),
        }
    })
}

/// Wait for `delay` using a timer task on `scheduler`.
///
/// The waiting task is suspended, never blocked.
pub async fn delay_on(scheduler: &dyn Scheduler, delay: Duration) -> Result<(), FlowError> {
    let (tx, rx) = oneshot::channel();
    scheduler.schedule(
        delay,
        Box::pin(async move {
            let _ = tx.send(());
        }),
    )?;
    rx.await
        .map_err(|_| FlowError::RejectedExecution(scheduler.name().to_owned()))
}

// ============================================================================
// Processing strategies
// ============================================================================

/// Runs every step inline on the task that processes the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProcessingStrategy;

impl ProcessingStrategy for DirectProcessingStrategy {
    fn on_processor(&self, _processing_type: ProcessingType, step: StepFuture) -> StepFuture {
        step
    }

    fn scheduler_for(&self, _processing_type: ProcessingType) -> Option<BoxScheduler> {
        None
    }
}

/// Moves each step onto a scheduler selected by its processing type.
///
/// Blocking and CPU-intensive steps go to the `blocking` scheduler, everything
/// else to `cpu_lite`.
pub struct WorkerPoolProcessingStrategy {
    cpu_lite: BoxScheduler,
    blocking: BoxScheduler,
}

impl WorkerPoolProcessingStrategy {
    /// Create a strategy over two schedulers.
    pub fn new(cpu_lite: BoxScheduler, blocking: BoxScheduler) -> Self {
        Self { cpu_lite, blocking }
    }

    fn select(&self, processing_type: ProcessingType) -> &BoxScheduler {
        if processing_type.is_blocking() || processing_type == ProcessingType::CpuIntensive {
            &self.blocking
        } else {
            &self.cpu_lite
        }
    }
}

impl ProcessingStrategy for WorkerPoolProcessingStrategy {
    fn on_processor(&self, processing_type: ProcessingType, step: StepFuture) -> StepFuture {
        offload(self.select(processing_type).clone(), step)
    }

    fn scheduler_for(&self, processing_type: ProcessingType) -> Option<BoxScheduler> {
        Some(self.select(processing_type).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::Event;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_offload_returns_step_result() {
        let scheduler: BoxScheduler = Arc::new(TokioScheduler::current("cpu").unwrap());
        let result = offload(scheduler, Box::pin(async { Ok(Event::of("done")) })).await;
        assert_eq!(result.unwrap().payload().as_str(), Some("done"));
    }

    #[tokio::test]
    async fn test_stopped_scheduler_rejects() {
        let scheduler = TokioScheduler::current("io").unwrap();
        scheduler.stop();
        let err = scheduler.submit(Box::pin(async {})).unwrap_err();
        assert!(matches!(err, FlowError::RejectedExecution(name) if name == "io"));
    }

    #[tokio::test]
    async fn test_rejection_surfaces_through_offload() {
        let scheduler = TokioScheduler::current("io").unwrap();
        scheduler.stop();
        let result = offload(Arc::new(scheduler), Box::pin(async { Ok(Event::of(())) })).await;
        assert!(matches!(
            result.unwrap_err().cause(),
            FlowError::RejectedExecution(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_on_waits() {
        let scheduler = TokioScheduler::current("timer").unwrap();
        let start = tokio::time::Instant::now();
        delay_on(&scheduler, Duration::from_millis(250)).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }
}
