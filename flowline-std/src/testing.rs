//! Testing utilities for Flowline.
//!
//! This module provides processors, error handlers and schedulers that make
//! chains and routers easy to observe in tests.
//!
//! # Features
//!
//! - [`InvocationLog`]: A shared record of which processors saw which events
//! - [`SpyProcessor`]: A pass-through processor writing to an [`InvocationLog`]
//! - [`FailingProcessor`] / [`FailNTimesProcessor`]: Controlled failures
//! - [`SleepingProcessor`]: A processor that takes time
//! - [`RecordingErrorHandler`]: An error handler counting the failures it sees
//! - [`CountingScheduler`]: A tokio scheduler counting submissions

use crate::scheduling::TokioScheduler;
use flowline_core::{
    BoxScheduler, ErrorHandler, Event, FlowError, ProcessResult, ProcessingError, Processor,
    Scheduler, Task, Value,
};
use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::runtime::Handle;

// ============================================================================
// Invocation Log
// ============================================================================

/// A shared, ordered record of processor invocations.
///
/// # Example
///
/// ```rust,ignore
/// let log = InvocationLog::new();
/// let chain = Chain::builder("flow")
///     .processor(SpyProcessor::new("a", &log))
///     .processor(SpyProcessor::new("b", &log))
///     .build();
///
/// chain.process(Event::of(1)).await?;
/// assert_eq!(log.names(), vec!["a", "b"]);
/// ```
#[derive(Clone, Default)]
pub struct InvocationLog {
    entries: Arc<Mutex<Vec<(String, Option<Event>)>>>,
}

impl InvocationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation without an event.
    pub fn record(&self, name: &str) {
        self.entries.lock().unwrap().push((name.to_owned(), None));
    }

    fn record_event(&self, name: &str, event: &Event) {
        self.entries
            .lock()
            .unwrap()
            .push((name.to_owned(), Some(event.clone())));
    }

    /// Names of the recorded invocations, in order.
    pub fn names(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Events seen by spies, in order.
    pub fn events(&self) -> Vec<Event> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, event)| event.clone())
            .collect()
    }

    /// Number of recorded invocations.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Processors
// ============================================================================

/// Records its name and input in a log, then passes the event through.
#[derive(Clone)]
pub struct SpyProcessor {
    name: String,
    log: InvocationLog,
}

impl SpyProcessor {
    /// Create a spy writing to `log`.
    pub fn new(name: impl Into<String>, log: &InvocationLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl Processor for SpyProcessor {
    async fn process(&self, event: Event) -> ProcessResult {
        self.log.record_event(&self.name, &event);
        Ok(event)
    }
}

/// Always fails with a fixed message.
#[derive(Clone)]
pub struct FailingProcessor {
    message: String,
}

impl FailingProcessor {
    /// Fail with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Processor for FailingProcessor {
    async fn process(&self, _event: Event) -> ProcessResult {
        Err(ProcessingError::msg(self.message.clone()))
    }
}

/// Fails the first `n` attempts, then passes events through.
///
/// Clones share the attempt counter. `usize::MAX` never succeeds.
#[derive(Clone)]
pub struct FailNTimesProcessor {
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl FailNTimesProcessor {
    /// Fail `failures` times.
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Processor for FailNTimesProcessor {
    async fn process(&self, event: Event) -> ProcessResult {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(ProcessingError::msg(format!("attempt {attempt} failed")))
        } else {
            Ok(event)
        }
    }
}

/// Sleeps before passing the event through, optionally replacing the payload.
pub struct SleepingProcessor {
    duration: Duration,
    payload: Option<Value>,
}

impl SleepingProcessor {
    /// Sleep for `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            payload: None,
        }
    }

    /// Set the payload to `payload` after sleeping.
    pub fn then_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

impl Processor for SleepingProcessor {
    async fn process(&self, event: Event) -> ProcessResult {
        tokio::time::sleep(self.duration).await;
        Ok(match &self.payload {
            Some(payload) => event.with_payload(payload.clone()),
            None => event,
        })
    }
}

/// Replaces the payload.
pub struct SetPayloadProcessor {
    payload: Value,
}

impl SetPayloadProcessor {
    /// Set the payload to `payload`.
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
        }
    }
}

impl Processor for SetPayloadProcessor {
    async fn process(&self, event: Event) -> ProcessResult {
        Ok(event.with_payload(self.payload.clone()))
    }
}

/// Sets one flow variable.
pub struct SetVariableProcessor {
    name: String,
    value: Value,
}

impl SetVariableProcessor {
    /// Set variable `name` to `value`.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl Processor for SetVariableProcessor {
    async fn process(&self, event: Event) -> ProcessResult {
        Ok(event.with_variable(self.name.clone(), self.value.clone()))
    }
}

// ============================================================================
// Error Handler
// ============================================================================

/// Counts the failures it handles.
#[derive(Clone)]
pub struct RecordingErrorHandler {
    recover: bool,
    count: Arc<AtomicUsize>,
}

impl RecordingErrorHandler {
    /// A handler that completes the failed event without its error record.
    pub fn recovering() -> Self {
        Self {
            recover: true,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A handler that rethrows every failure.
    pub fn rethrowing() -> Self {
        Self {
            recover: false,
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of failures handled.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl ErrorHandler for RecordingErrorHandler {
    async fn handle(&self, mut error: ProcessingError) -> ProcessResult {
        self.count.fetch_add(1, Ordering::SeqCst);
        if !self.recover {
            return Err(error);
        }
        match error.take_event() {
            Some(event) => Ok(event.into_builder().error(None).build()),
            None => Err(error),
        }
    }
}

// ============================================================================
// Counting Scheduler
// ============================================================================

/// A [`TokioScheduler`] that counts tasks and can be told to reject them.
pub struct CountingScheduler {
    inner: TokioScheduler,
    submitted: AtomicUsize,
    scheduled: AtomicUsize,
    reject: AtomicBool,
}

impl CountingScheduler {
    /// Create a scheduler on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics outside of a tokio runtime.
    pub fn current(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            inner: TokioScheduler::new(name, Handle::current()),
            submitted: AtomicUsize::new(0),
            scheduled: AtomicUsize::new(0),
            reject: AtomicBool::new(false),
        })
    }

    /// Reject every further task with [`FlowError::RejectedExecution`].
    pub fn reject_all(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    /// Tasks accepted by [`Scheduler::submit`].
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Tasks accepted by [`Scheduler::schedule`].
    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Erase the concrete type, keeping the counters shared.
    pub fn into_scheduler(self: Arc<Self>) -> BoxScheduler {
        self
    }

    fn check(&self) -> Result<(), FlowError> {
        if self.reject.load(Ordering::SeqCst) {
            Err(FlowError::RejectedExecution(self.inner.name().to_owned()))
        } else {
            Ok(())
        }
    }
}

impl Scheduler for CountingScheduler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn submit(&self, task: Task) -> Result<(), FlowError> {
        self.check()?;
        self.inner.submit(task)?;
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn schedule(&self, delay: Duration, task: Task) -> Result<(), FlowError> {
        self.check()?;
        self.inner.schedule(delay, task)?;
        self.scheduled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.inner.stop();
    }

    fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spy_records_events() {
        let log = InvocationLog::new();
        let spy = SpyProcessor::new("spy", &log);
        spy.process(Event::of(7)).await.unwrap();
        log.record("marker");

        assert_eq!(log.names(), vec!["spy", "marker"]);
        assert_eq!(log.events().len(), 1);
        assert_eq!(log.events()[0].payload(), &Value::from(7));
    }

    #[tokio::test]
    async fn test_fail_n_times_shares_counter() {
        let flaky = FailNTimesProcessor::new(1);
        let clone = flaky.clone();
        assert!(flaky.process(Event::of(1)).await.is_err());
        assert!(clone.process(Event::of(1)).await.is_ok());
        assert_eq!(flaky.attempts(), 2);
    }

    #[tokio::test]
    async fn test_counting_scheduler_rejects() {
        let scheduler = CountingScheduler::current("test");
        scheduler.submit(Box::pin(async {})).unwrap();
        scheduler.reject_all();
        assert!(scheduler.submit(Box::pin(async {})).is_err());
        assert_eq!(scheduler.submitted(), 1);
    }
}
