//! Scatter-gather router.

use super::{RouterCore, router_component};
use crate::{
    forkjoin::{CollectMap, ForkJoinConfig, ForkJoinStrategy, RoutingPair},
    route::{Route, routes_under},
};
use flowline_core::{
    BoxProcessingStrategy, BoxProcessor, Component, ComponentLocation, ConfigError, Event,
    FlowError, Lifecycle, ProcessResult, ProcessingStrategy, Processor,
};
use std::{sync::Arc, time::Duration};

const MIN_ROUTES: usize = 2;

/// Sends a copy of each event to every route in parallel and gathers the results
/// into a map keyed by route index.
///
/// Every route runs to completion. If any failed, the result is a
/// [`CompositeRoutingError`](flowline_core::CompositeRoutingError) holding every
/// failure and the messages of the routes that succeeded.
pub struct ScatterGather {
    core: RouterCore,
    fork_join: ForkJoinStrategy<CollectMap>,
}

impl ScatterGather {
    /// Start configuring a scatter-gather at `location`.
    pub fn builder(location: ComponentLocation) -> ScatterGatherBuilder {
        ScatterGatherBuilder::new(location)
    }

    /// The routes, indexed as in the gathered map.
    pub fn routes(&self) -> &[Route] {
        &self.core.routes
    }

    /// Scatter `event` to every route and gather the results.
    pub async fn route(&self, event: Event) -> ProcessResult {
        if event.payload().is_stream() {
            return Err(self.core.fail(self, &event, FlowError::NonRepeatablePayload));
        }
        let pairs: Vec<RoutingPair> = self
            .core
            .routes
            .iter()
            .map(|route| RoutingPair::new(event.clone(), route.clone()))
            .collect();
        self.fork_join.fork_join(&event, pairs).await
    }
}

impl Processor for ScatterGather {
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

router_component!(ScatterGather);

/// Builder for [`ScatterGather`].
pub struct ScatterGatherBuilder {
    location: ComponentLocation,
    routes: Vec<BoxProcessor>,
    max_concurrency: Option<usize>,
    timeout: Option<Duration>,
    target: Option<String>,
    processing_strategy: Option<BoxProcessingStrategy>,
}

impl ScatterGatherBuilder {
    /// Create a builder with no routes.
    pub fn new(location: ComponentLocation) -> Self {
        Self {
            location,
            routes: Vec::new(),
            max_concurrency: None,
            timeout: None,
            target: None,
            processing_strategy: None,
        }
    }

    /// Add a route.
    pub fn route(mut self, processor: impl Processor) -> Self {
        self.routes.push(processor.boxed());
        self
    }

    /// Add type-erased routes.
    pub fn routes(mut self, processors: impl IntoIterator<Item = BoxProcessor>) -> Self {
        self.routes.extend(processors);
        self
    }

    /// Bound the routes in flight. Defaults to the number of routes.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Fail routes that run longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Store the gathered map in variable `target` and keep the payload.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Run routes on the strategy's scheduler.
    pub fn processing_strategy(mut self, strategy: impl ProcessingStrategy) -> Self {
        self.processing_strategy = Some(Arc::new(strategy));
        self
    }

    /// Build the router.
    ///
    /// Fails with [`ConfigError::TooFewRoutes`] with fewer than two routes.
    pub fn build(self) -> Result<ScatterGather, ConfigError> {
        if self.routes.len() < MIN_ROUTES {
            return Err(ConfigError::TooFewRoutes {
                min: MIN_ROUTES,
                actual: self.routes.len(),
            });
        }

        let config = ForkJoinConfig {
            max_concurrency: Some(self.max_concurrency.unwrap_or(self.routes.len())),
            timeout: self.timeout,
            delay_errors: true,
        };

        let fork_join = ForkJoinStrategy::new(self.location.clone(), config, CollectMap)?
            .with_target(self.target)
            .with_processing_strategy(self.processing_strategy);
        let routes = routes_under(&self.location, self.routes);
        Ok(ScatterGather {
            core: RouterCore::new(self.location, routes),
            fork_join,
        })
    }
}
