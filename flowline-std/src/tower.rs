//! Tower integration for Flowline.
//!
//! This module provides adapters between Flowline's [`Processor`] and tower's
//! [`Service`]:
//!
//! - Use processors (chains, routers) as tower services
//! - Use tower services as processors
//! - Apply tower layers to processors
//!
//! # Example
//!
//! ```rust,ignore
//! use flowline_std::tower::{ProcessorService, ServiceProcessor};
//!
//! let service = ProcessorService::new(chain);
//! let processor = ServiceProcessor::new(tower::timeout::Timeout::new(service, timeout));
//! ```

use flowline_core::{Component, Event, Lifecycle, ProcessResult, ProcessingError, Processor};
use std::{
    future::{Future, poll_fn},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

// ============================================================================
// Processor → Service Adapter
// ============================================================================

/// Wraps a [`Processor`] as a tower [`Service`].
///
/// Processors are always ready; backpressure comes from the layers around them.
pub struct ProcessorService<P> {
    processor: Arc<P>,
}

impl<P> ProcessorService<P> {
    /// Wrap `processor`.
    pub fn new(processor: P) -> Self {
        Self {
            processor: Arc::new(processor),
        }
    }

    /// The wrapped processor.
    pub fn inner(&self) -> &P {
        &self.processor
    }
}

impl<P> Clone for ProcessorService<P> {
    fn clone(&self) -> Self {
        Self {
            processor: Arc::clone(&self.processor),
        }
    }
}

impl<P: Processor> Service<Event> for ProcessorService<P> {
    type Response = Event;
    type Error = ProcessingError;
    type Future = Pin<Box<dyn Future<Output = ProcessResult> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: Event) -> Self::Future {
        let processor = Arc::clone(&self.processor);
        Box::pin(async move { processor.process(event).await })
    }
}

// ============================================================================
// Service → Processor Adapter
// ============================================================================

/// Wraps a tower [`Service`] as a [`Processor`].
///
/// Each event is processed by a clone of the service, after waiting for it to
/// become ready.
#[derive(Clone)]
pub struct ServiceProcessor<S> {
    service: S,
}

impl<S> ServiceProcessor<S> {
    /// Wrap `service`.
    pub fn new(service: S) -> Self {
        Self { service }
    }

    /// The wrapped service.
    pub fn inner(&self) -> &S {
        &self.service
    }
}

impl<S> Processor for ServiceProcessor<S>
where
    S: Service<Event, Response = Event, Error = ProcessingError> + Clone + Send + Sync + 'static,
    S::Future: Send,
{
    async fn process(&self, event: Event) -> ProcessResult {
        let mut service = self.service.clone();
        poll_fn(|cx| service.poll_ready(cx)).await?;
        service.call(event).await
    }
}

// ============================================================================
// Layer Integration
// ============================================================================

/// Applies a tower [`Layer`] to a processor.
///
/// The result is a processor that keeps the wrapped processor's component and
/// lifecycle capabilities.
///
/// ```rust,ignore
/// let limited = LayeredProcessor::new(ConcurrencyLimitLayer::new(4), chain);
/// ```
pub struct LayeredProcessor<L, P>
where
    L: Layer<ProcessorService<P>>,
{
    inner: ProcessorService<P>,
    service: L::Service,
}

impl<L, P> LayeredProcessor<L, P>
where
    L: Layer<ProcessorService<P>>,
{
    /// Wrap `processor` in `layer`.
    pub fn new(layer: L, processor: P) -> Self {
        let inner = ProcessorService::new(processor);
        let service = layer.layer(inner.clone());
        Self { inner, service }
    }
}

impl<L, P> Processor for LayeredProcessor<L, P>
where
    P: Processor,
    L: Layer<ProcessorService<P>> + Send + Sync + 'static,
    L::Service:
        Service<Event, Response = Event, Error = ProcessingError> + Clone + Send + Sync + 'static,
    <L::Service as Service<Event>>::Future: Send,
{
    async fn process(&self, event: Event) -> ProcessResult {
        let mut service = self.service.clone();
        poll_fn(|cx| service.poll_ready(cx)).await?;
        service.call(event).await
    }

    fn processing_type(&self) -> flowline_core::ProcessingType {
        self.inner.inner().processing_type()
    }

    fn component(&self) -> Option<&dyn Component> {
        self.inner.inner().component()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        self.inner.inner().lifecycle()
    }
}
