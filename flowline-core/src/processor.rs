//! # Processor
//!
//! The atomic capability of the engine: receive an [`Event`], return a new event or
//! a [`ProcessingError`]. Chains and routers are processors themselves, so any of
//! them can be nested anywhere a processor is expected.
//!
//! # Static vs Dynamic Dispatch
//!
//! [`Processor`] uses native `async fn` style methods for zero-cost static dispatch.
//! Chains and routers hold heterogeneous processors through [`DynProcessor`], the
//! object-safe twin implemented for every `Processor`.
//!
//! # Capabilities
//!
//! A processor may also be a [`Component`] (identity and error resolution) or
//! participate in [`Lifecycle`]. These are explicit queries that chains answer once,
//! when they are composed, and summarize as [`Capabilities`].

use crate::{
    component::Component,
    error::ProcessingError,
    event::Event,
    lifecycle::Lifecycle,
};
use bitflags::bitflags;
use std::{future::Future, pin::Pin, sync::Arc};

/// Result of processing one event.
pub type ProcessResult = Result<Event, ProcessingError>;

/// Boxed future returned by [`DynProcessor::process_dyn`].
pub type ProcessFuture<'a> = Pin<Box<dyn Future<Output = ProcessResult> + Send + 'a>>;

/// Owned future of a composed chain step.
pub type StepFuture = Pin<Box<dyn Future<Output = ProcessResult> + Send + 'static>>;

/// A composed chain step: one processor with all its layers applied.
pub type StepFn = Arc<dyn Fn(Event) -> StepFuture + Send + Sync>;

/// Shared, type-erased processor.
pub type BoxProcessor = Arc<dyn DynProcessor>;

/// Scheduling hint declared by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingType {
    /// Short, non-blocking work.
    #[default]
    CpuLite,
    /// Non-blocking work that completes asynchronously.
    CpuLiteAsync,
    /// Work that blocks the thread.
    Blocking,
    /// Blocking I/O.
    IoRw,
    /// Long computations.
    CpuIntensive,
}

impl ProcessingType {
    /// Whether the work may block the executing thread.
    pub fn is_blocking(self) -> bool {
        matches!(self, ProcessingType::Blocking | ProcessingType::IoRw)
    }
}

bitflags! {
    /// Capabilities of a processor, resolved at composition time.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u8 {
        /// The processor is a [`Component`].
        const COMPONENT = 1;
        /// The processor takes part in [`Lifecycle`].
        const LIFECYCLE = 1 << 1;
        /// The processor declares a blocking processing type.
        const BLOCKING = 1 << 2;
    }
}

/// The atomic unit of event processing.
///
/// # Example
///
/// ```rust,ignore
/// struct Upper;
///
/// impl Processor for Upper {
///     async fn process(&self, event: Event) -> ProcessResult {
///         let text = event.payload().to_string().to_uppercase();
///         Ok(event.with_payload(text))
///     }
/// }
/// ```
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Processor`",
    label = "missing `Processor` implementation",
    note = "Processors must implement `process(&self, Event) -> Result<Event, ProcessingError>`."
)]
pub trait Processor: Send + Sync + 'static {
    /// Process one event.
    fn process(&self, event: Event) -> impl Future<Output = ProcessResult> + Send;

    /// Scheduling hint for processing strategies.
    fn processing_type(&self) -> ProcessingType {
        ProcessingType::CpuLite
    }

    /// This processor as a [`Component`], if it is one.
    fn component(&self) -> Option<&dyn Component> {
        None
    }

    /// This processor's [`Lifecycle`], if it has one.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Erase the concrete type.
    fn boxed(self) -> BoxProcessor
    where
        Self: Sized,
    {
        Arc::new(self)
    }
}

/// Dynamic object-safe version of [`Processor`].
pub trait DynProcessor: Send + Sync + 'static {
    /// Process one event (dynamic dispatch version).
    fn process_dyn(&self, event: Event) -> ProcessFuture<'_>;

    /// See [`Processor::processing_type`].
    fn processing_type_dyn(&self) -> ProcessingType;

    /// See [`Processor::component`].
    fn as_component(&self) -> Option<&dyn Component>;

    /// See [`Processor::lifecycle`].
    fn as_lifecycle(&self) -> Option<&dyn Lifecycle>;

    /// Summary of the capability queries.
    fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        if self.as_component().is_some() {
            caps |= Capabilities::COMPONENT;
        }
        if self.as_lifecycle().is_some() {
            caps |= Capabilities::LIFECYCLE;
        }
        if self.processing_type_dyn().is_blocking() {
            caps |= Capabilities::BLOCKING;
        }
        caps
    }
}

// Blanket implementation: Any type implementing Processor implements DynProcessor automatically.
impl<T: Processor> DynProcessor for T {
    fn process_dyn(&self, event: Event) -> ProcessFuture<'_> {
        Box::pin(self.process(event))
    }

    fn processing_type_dyn(&self) -> ProcessingType {
        self.processing_type()
    }

    fn as_component(&self) -> Option<&dyn Component> {
        self.component()
    }

    fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        self.lifecycle()
    }
}

// Allow Arc<dyn DynProcessor> to be used where Processor is expected.
// Calls go through the trait object explicitly; the Arc itself also implements
// DynProcessor through the blanket impl.
impl Processor for Arc<dyn DynProcessor> {
    fn process(&self, event: Event) -> impl Future<Output = ProcessResult> + Send {
        (**self).process_dyn(event)
    }

    fn processing_type(&self) -> ProcessingType {
        (**self).processing_type_dyn()
    }

    fn component(&self) -> Option<&dyn Component> {
        (**self).as_component()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        (**self).as_lifecycle()
    }

    fn boxed(self) -> BoxProcessor {
        self
    }
}

// ============================================================================
// Closure adapter
// ============================================================================

/// A processor backed by an async closure. Created by [`processor_fn`].
pub struct FnProcessor<F> {
    f: F,
    processing_type: ProcessingType,
}

impl<F> FnProcessor<F> {
    /// Declare a processing type other than the default.
    pub fn with_processing_type(mut self, processing_type: ProcessingType) -> Self {
        self.processing_type = processing_type;
        self
    }
}

/// Create a processor from an async closure.
///
/// ```rust,ignore
/// let upper = processor_fn(|event: Event| async move {
///     let text = event.payload().to_string().to_uppercase();
///     Ok(event.with_payload(text))
/// });
/// ```
pub fn processor_fn<F, Fut>(f: F) -> FnProcessor<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessResult> + Send,
{
    FnProcessor {
        f,
        processing_type: ProcessingType::CpuLite,
    }
}

impl<F, Fut> Processor for FnProcessor<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ProcessResult> + Send,
{
    fn process(&self, event: Event) -> impl Future<Output = ProcessResult> + Send {
        (self.f)(event)
    }

    fn processing_type(&self) -> ProcessingType {
        self.processing_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentLocation, Value};

    struct Named(ComponentLocation);

    impl Component for Named {
        fn location(&self) -> &ComponentLocation {
            &self.0
        }
    }

    impl Processor for Named {
        async fn process(&self, event: Event) -> ProcessResult {
            Ok(event)
        }

        fn component(&self) -> Option<&dyn Component> {
            Some(self)
        }

        fn processing_type(&self) -> ProcessingType {
            ProcessingType::IoRw
        }
    }

    // Polls a future that never suspends.
    fn block_on<F: Future>(future: F) -> F::Output {
        use std::task::{Context, Poll, Waker};
        let mut future = std::pin::pin!(future);
        let mut cx = Context::from_waker(Waker::noop());
        match future.as_mut().poll(&mut cx) {
            Poll::Ready(output) => output,
            Poll::Pending => panic!("future suspended"),
        }
    }

    #[test]
    fn test_closure_processor() {
        let upper = processor_fn(|event: Event| async move {
            let text = event.payload().to_string().to_uppercase();
            Ok(event.with_payload(text))
        });
        let out = block_on(upper.process(Event::of("abc"))).ok();
        assert_eq!(out.map(|e| e.payload().clone()), Some(Value::from("ABC")));
    }

    #[test]
    fn test_capabilities_through_box() {
        let boxed: BoxProcessor = Named(ComponentLocation::root("n")).boxed();
        let caps = boxed.capabilities();
        assert!(caps.contains(Capabilities::COMPONENT | Capabilities::BLOCKING));
        assert!(!caps.contains(Capabilities::LIFECYCLE));
        assert_eq!(
            Processor::component(&boxed).map(|c| c.location().path().to_owned()),
            Some("n".to_owned())
        );
    }
}
