//! # Route
//!
//! A [`Route`] wraps one processor with an identity, an optional acceptance
//! predicate and an optional local error handler (the default propagates). Routers
//! execute their branches through routes, which also track how many executions
//! are in flight so a router can wait for all of them to finish.

use crate::resolution::ErrorResolver;
use flowline_core::{
    BoxErrorHandler, BoxProcessor, Component, ComponentLocation, ErrorHandler, Event, Lifecycle,
    LifecycleError, LifecycleState, ProcessResult, ProcessingType, Processor,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Notify;

type Predicate = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

struct RouteInner {
    id: String,
    location: ComponentLocation,
    processor: BoxProcessor,
    filter: Option<Predicate>,
    error_handler: Option<BoxErrorHandler>,
    resolver: ErrorResolver,
    in_flight: AtomicUsize,
    idle: Notify,
    lifecycle: LifecycleState,
}

/// A processor with identity, acceptance predicate and local error handling.
///
/// Cloning is cheap and yields a handle to the same route.
#[derive(Clone)]
pub struct Route {
    inner: Arc<RouteInner>,
}

impl Route {
    /// Create a route named `id` over `processor`.
    pub fn new(id: impl Into<String>, processor: BoxProcessor) -> Self {
        let id = id.into();
        Self::with_location(ComponentLocation::root(id.clone()), id, processor)
    }

    /// Create a route at a specific location.
    pub fn with_location(
        location: ComponentLocation,
        id: impl Into<String>,
        processor: BoxProcessor,
    ) -> Self {
        let id = id.into();
        Self {
            inner: Arc::new(RouteInner {
                lifecycle: LifecycleState::new(id.clone()),
                id,
                location,
                processor,
                filter: None,
                error_handler: None,
                resolver: ErrorResolver::default(),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
            }),
        }
    }

    fn update(self, f: impl FnOnce(&mut RouteInner)) -> Self {
        let mut inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => {
                tracing::warn!(
                    route = %shared.id,
                    "configuring a shared route, the result is detached from its other handles"
                );
                RouteInner {
                    id: shared.id.clone(),
                    location: shared.location.clone(),
                    processor: shared.processor.clone(),
                    filter: shared.filter.clone(),
                    error_handler: shared.error_handler.clone(),
                    resolver: shared.resolver.clone(),
                    in_flight: AtomicUsize::new(0),
                    idle: Notify::new(),
                    lifecycle: LifecycleState::new(shared.id.clone()),
                }
            }
        };
        f(&mut inner);
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Only accept events matching `predicate`.
    ///
    /// Configuring a route that was already cloned yields a new route; the earlier
    /// handles keep the old settings and their own in-flight tracking.
    pub fn with_filter(self, predicate: impl Fn(&Event) -> bool + Send + Sync + 'static) -> Self {
        self.update(|inner| inner.filter = Some(Arc::new(predicate)))
    }

    /// Handle failures of this route locally.
    ///
    /// The handler sees failures already resolved against the route. See
    /// [`Route::with_filter`] for routes that were already cloned.
    pub fn with_error_handler(self, handler: impl ErrorHandler) -> Self {
        self.update(|inner| inner.error_handler = Some(Arc::new(handler)))
    }

    /// Resolve failures with `resolver` instead of the default one.
    pub fn with_error_resolver(self, resolver: ErrorResolver) -> Self {
        self.update(|inner| inner.resolver = resolver)
    }

    /// The route's identity.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The wrapped processor.
    pub fn processor(&self) -> &BoxProcessor {
        &self.inner.processor
    }

    /// Whether the route accepts `event`.
    pub fn accepts(&self, event: &Event) -> bool {
        self.inner
            .filter
            .as_ref()
            .is_none_or(|predicate| predicate(event))
    }

    /// Number of executions currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait until no execution is running.
    pub async fn await_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Execute the route for one event.
    pub async fn execute(&self, event: Event) -> ProcessResult {
        let _guard = InFlight::enter(&self.inner);
        let input = event.clone();
        let error = match self.inner.processor.process_dyn(event).await {
            Ok(out) => return Ok(out),
            Err(error) => self.inner.resolver.resolve(Some(self), &input, error),
        };
        match &self.inner.error_handler {
            Some(handler) => handler
                .handle_dyn(error)
                .await
                .map_err(|rethrown| rethrown.with_event_if_absent(|| input)),
            None => Err(error),
        }
    }
}

struct InFlight<'a>(&'a RouteInner);

impl<'a> InFlight<'a> {
    fn enter(inner: &'a RouteInner) -> Self {
        inner.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(inner)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.inner.id)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Processor for Route {
    async fn process(&self, event: Event) -> ProcessResult {
        self.execute(event).await
    }

    fn processing_type(&self) -> ProcessingType {
        self.inner.processor.processing_type_dyn()
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

impl Component for Route {
    fn location(&self) -> &ComponentLocation {
        &self.inner.location
    }
}

impl Lifecycle for Route {
    fn initialise(&self) -> Result<(), LifecycleError> {
        if self.inner.lifecycle.initialise()? {
            if let Some(lifecycle) = self.inner.processor.as_lifecycle() {
                lifecycle.initialise()?;
            }
        }
        Ok(())
    }

    fn start(&self) -> Result<(), LifecycleError> {
        if self.inner.lifecycle.start()? {
            if let Some(lifecycle) = self.inner.processor.as_lifecycle() {
                lifecycle.start()?;
            }
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), LifecycleError> {
        if self.inner.lifecycle.stop()? {
            if let Some(lifecycle) = self.inner.processor.as_lifecycle() {
                lifecycle.stop()?;
            }
        }
        Ok(())
    }

    fn dispose(&self) {
        if let Ok(true) = self.inner.lifecycle.dispose() {
            if let Some(lifecycle) = self.inner.processor.as_lifecycle() {
                lifecycle.dispose();
            }
        }
    }
}

/// Wrap each processor in a route named `route {index}` under `parent`.
pub(crate) fn routes_under(
    parent: &ComponentLocation,
    processors: impl IntoIterator<Item = BoxProcessor>,
) -> Vec<Route> {
    let routes = parent.child("routes");
    processors
        .into_iter()
        .enumerate()
        .map(|(index, processor)| {
            let location = routes.child(index.to_string());
            Route::with_location(location, format!("route {index}"), processor)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error_handlers::{ErrorTypeMatcher, OnErrorContinue, OnErrorPropagate},
        testing::{FailingProcessor, RecordingErrorHandler, SetPayloadProcessor, SleepingProcessor},
    };
    use flowline_core::{ErrorType, ProcessingError, processor_fn};
    use std::time::Duration;

    #[tokio::test]
    async fn test_execute_runs_processor() {
        let route = Route::new("r", SetPayloadProcessor::new("done").boxed());
        let out = route.execute(Event::of(())).await.unwrap();
        assert_eq!(out.payload().as_str(), Some("done"));
    }

    #[tokio::test]
    async fn test_local_handler_overrides_propagation() {
        let route = Route::new("r", FailingProcessor::new("bad").boxed())
            .with_error_handler(OnErrorContinue::new());
        assert!(route.execute(Event::of("x")).await.is_ok());

        let plain = Route::new("r", FailingProcessor::new("bad").boxed());
        assert!(plain.execute(Event::of("x")).await.is_err());
    }

    #[tokio::test]
    async fn test_failures_are_resolved_against_the_route() {
        let plain = Route::new("orders", FailingProcessor::new("bad").boxed());
        let err = plain.execute(Event::of("x")).await.unwrap_err();
        assert!(err.is_resolved());
        assert_eq!(err.error_type(), Some(&ErrorType::UNKNOWN));
        assert_eq!(err.failing_component().map(|c| c.path()), Some("orders"));
        assert_eq!(err.event().unwrap().payload().as_str(), Some("x"));
    }

    #[tokio::test]
    async fn test_local_handler_sees_event_and_type() {
        let handler = RecordingErrorHandler::recovering();
        let route = Route::new("r", FailingProcessor::new("bad").boxed())
            .with_error_handler(handler.clone());
        let out = route.execute(Event::of("x")).await.unwrap();
        assert_eq!(handler.count(), 1);
        assert_eq!(out.payload().as_str(), Some("x"));

        let rethrowing = Route::new("r", FailingProcessor::new("bad").boxed())
            .with_error_handler(OnErrorPropagate::new());
        let err = rethrowing.execute(Event::of("x")).await.unwrap_err();
        assert_eq!(err.message(), "bad");
        assert_eq!(err.error_type(), Some(&ErrorType::UNKNOWN));
        assert!(err.event().unwrap().has_error());
    }

    #[tokio::test]
    async fn test_typed_failure_keeps_its_type() {
        let route = Route::new(
            "r",
            processor_fn(|_event: Event| async move {
                Err(ProcessingError::typed(ErrorType::ROUTING, "no target"))
            })
            .boxed(),
        )
        .with_error_handler(OnErrorContinue::new().when(ErrorTypeMatcher::of(ErrorType::ROUTING)));
        assert!(route.execute(Event::of("x")).await.is_ok());
    }

    #[test]
    fn test_configuring_shared_route_detaches_it() {
        let shared = Route::new("ints", SetPayloadProcessor::new(1).boxed());
        let handle = shared.clone();
        let filtered = shared.with_filter(|event| event.payload().as_int().is_some());

        assert!(!filtered.accepts(&Event::of("three")));
        assert!(handle.accepts(&Event::of("three")));
        assert_eq!(filtered.id(), "ints");
    }

    #[test]
    fn test_filter() {
        let route = Route::new("ints", SetPayloadProcessor::new(1).boxed())
            .with_filter(|event| event.payload().as_int().is_some());
        assert!(route.accepts(&Event::of(3)));
        assert!(!route.accepts(&Event::of("three")));
    }

    #[tokio::test]
    async fn test_await_idle_waits_for_in_flight() {
        let route = Route::new(
            "slow",
            SleepingProcessor::new(Duration::from_millis(30)).boxed(),
        );
        let running = {
            let route = route.clone();
            tokio::spawn(async move { route.execute(Event::of(())).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(route.in_flight(), 1);
        route.await_idle().await;
        assert_eq!(route.in_flight(), 0);
        assert!(running.await.unwrap().is_ok());
    }
}
