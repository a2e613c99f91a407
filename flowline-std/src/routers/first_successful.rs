//! First-successful router.

use super::{RouterCore, router_component};
use crate::{
    resolution::error_from_record,
    route::{Route, routes_under},
    tracing_spans::OpenSpan,
};
use flowline_core::{
    BoxProcessor, BoxSpanFactory, Component, ComponentLocation, Event, Lifecycle, NoopSpanFactory,
    ProcessResult, Processor,
};
use std::sync::Arc;
use tracing::Instrument;

/// Tries routes in configured order and returns the result of the first one that
/// succeeds.
///
/// A route succeeds when it returns an event without an error record. Routes that
/// do not accept the event are skipped. Routes after the successful one are never
/// invoked. If every attempted route fails, the last failure is returned.
pub struct FirstSuccessful {
    core: RouterCore,
    span_factory: BoxSpanFactory,
}

impl FirstSuccessful {
    /// Try `processors` in order, each wrapped in a route under `location`.
    pub fn new(
        location: ComponentLocation,
        processors: impl IntoIterator<Item = BoxProcessor>,
    ) -> Self {
        let routes = routes_under(&location, processors);
        Self::from_routes(location, routes)
    }

    /// Try pre-built routes in order.
    pub fn from_routes(location: ComponentLocation, routes: Vec<Route>) -> Self {
        Self {
            core: RouterCore::new(location, routes),
            span_factory: Arc::new(NoopSpanFactory),
        }
    }

    /// Open a span per attempt, labelled with the attempt's ordinal.
    pub fn with_span_factory(mut self, span_factory: BoxSpanFactory) -> Self {
        self.span_factory = span_factory;
        self
    }

    /// The routes, in attempt order.
    pub fn routes(&self) -> &[Route] {
        &self.core.routes
    }

    /// Execute `event` on the first route that succeeds.
    pub async fn route(&self, event: Event) -> ProcessResult {
        let mut last_failure = None;
        for (ordinal, route) in self.core.routes.iter().enumerate() {
            if !route.accepts(&event) {
                continue;
            }

            let label = format!("attempt:{ordinal}");
            let span = tracing::debug_span!(
                "flowline.attempt",
                router = %self.core.location,
                route = route.id(),
                ordinal,
            );
            let attempt = OpenSpan::start(self.span_factory.clone(), &event, &label);
            let outcome = route.execute(event.clone()).instrument(span).await;
            if let Err(error) = &outcome {
                attempt.record_error(error);
            }
            drop(attempt);

            match outcome {
                Ok(out) if !out.has_error() => return Ok(out),
                Ok(out) => last_failure = Some(error_from_record(out)),
                Err(error) => last_failure = Some(error),
            }
        }

        match last_failure {
            Some(error) => Err(self.core.fail(self, &event, error)),
            None => Err(self.core.could_not_route(self, &event)),
        }
    }
}

impl Processor for FirstSuccessful {
    async fn process(&self, event: Event) -> ProcessResult {
        self.route(event).await
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

router_component!(FirstSuccessful);
