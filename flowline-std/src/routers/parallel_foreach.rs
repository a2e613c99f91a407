//! Parallel foreach router.

use super::{RouterCore, router_component};
use crate::{
    forkjoin::{CollectList, ForkJoinConfig, ForkJoinStrategy, RoutingPair},
    route::Route,
    splitters::PayloadSplitter,
};
use flowline_core::{
    BoxProcessingStrategy, BoxSplitter, Component, ComponentLocation, ConfigError, Event,
    ItemSequenceInfo, Lifecycle, ProcessResult, ProcessingStrategy, Processor, SplittingStrategy,
    Value,
};
use std::{sync::Arc, time::Duration};

/// Splits each event and processes every part in parallel through one shared
/// route, then collects the results into a list in split order.
///
/// Each part event carries the part as payload (or as message, when the part is a
/// message) and its position as item sequence info. Every part runs to completion
/// before failures are reported.
pub struct ParallelForEach {
    core: RouterCore,
    splitter: BoxSplitter,
    fork_join: ForkJoinStrategy<CollectList>,
}

impl ParallelForEach {
    /// Start configuring a parallel foreach at `location` over `nested`.
    pub fn builder(location: ComponentLocation, nested: impl Processor) -> ParallelForEachBuilder {
        ParallelForEachBuilder::new(location, nested)
    }

    /// The shared route every part goes through.
    pub fn route(&self) -> &Route {
        &self.core.routes[0]
    }

    /// Split `event` and process all parts.
    pub async fn route_event(&self, event: Event) -> ProcessResult {
        let parts = self
            .splitter
            .split(&event)
            .map_err(|error| self.core.fail(self, &event, error))?;

        let route = self.route().clone();
        let base = event.clone();
        let pairs = parts.enumerate().map(move |(position, part)| {
            let builder = base.clone().into_builder();
            let builder = match part {
                Value::Message(message) => builder.message(*message),
                other => builder.payload(other),
            };
            let part = builder
                .item_sequence(Some(ItemSequenceInfo::of(position)))
                .build();
            RoutingPair::new(part, route.clone())
        });
        self.fork_join.fork_join(&event, pairs).await
    }
}

impl Processor for ParallelForEach {
    async fn process(&self, event: Event) -> ProcessResult {
        self.route_event(event).await
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

router_component!(ParallelForEach);

/// Builder for [`ParallelForEach`].
pub struct ParallelForEachBuilder {
    location: ComponentLocation,
    nested: Route,
    splitter: Option<BoxSplitter>,
    max_concurrency: Option<usize>,
    timeout: Option<Duration>,
    target: Option<String>,
    flatten: bool,
    processing_strategy: Option<BoxProcessingStrategy>,
}

impl ParallelForEachBuilder {
    /// Create a builder that routes every part through `nested`.
    pub fn new(location: ComponentLocation, nested: impl Processor) -> Self {
        let nested = Route::with_location(location.child("route"), "route", nested.boxed());
        Self {
            location,
            nested,
            splitter: None,
            max_concurrency: None,
            timeout: None,
            target: None,
            flatten: false,
            processing_strategy: None,
        }
    }

    /// Split events with `splitter` instead of element-wise on the payload.
    pub fn splitter(mut self, splitter: impl SplittingStrategy) -> Self {
        self.splitter = Some(Arc::new(splitter));
        self
    }

    /// Bound the parts in flight. Unbounded by default.
    pub fn max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Fail parts that run longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Store the collected list in variable `target` and keep the payload.
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Collect part payloads instead of whole part messages.
    pub fn flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Run parts on the strategy's scheduler.
    pub fn processing_strategy(mut self, strategy: impl ProcessingStrategy) -> Self {
        self.processing_strategy = Some(Arc::new(strategy));
        self
    }

    /// Build the router.
    pub fn build(self) -> Result<ParallelForEach, ConfigError> {
        let config = ForkJoinConfig {
            max_concurrency: self.max_concurrency,
            timeout: self.timeout,
            delay_errors: true,
        };
        let aggregation = if self.flatten {
            CollectList::payloads()
        } else {
            CollectList::messages()
        };
        let fork_join = ForkJoinStrategy::new(self.location.clone(), config, aggregation)?
            .with_target(self.target)
            .with_processing_strategy(self.processing_strategy);
        Ok(ParallelForEach {
            core: RouterCore::new(self.location, vec![self.nested]),
            splitter: self
                .splitter
                .unwrap_or_else(|| Arc::new(PayloadSplitter::new())),
            fork_join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        splitters::VariableSplitter,
        testing::{InvocationLog, SpyProcessor},
    };
    use flowline_core::{FlowError, ProcessingError, processor_fn};

    fn double() -> impl Processor {
        processor_fn(|event: Event| async move {
            let n = event.payload().as_int().unwrap_or_default();
            Ok(event.with_payload(n * 2))
        })
    }

    #[tokio::test]
    async fn test_processes_every_element_in_order() {
        let router = ParallelForEach::builder(ComponentLocation::root("pfe"), double())
            .flatten(true)
            .build()
            .unwrap();
        let out = router.route_event(Event::of(vec![1, 2, 3])).await.unwrap();
        assert_eq!(out.payload(), &Value::from(vec![2, 4, 6]));
    }

    #[tokio::test]
    async fn test_collects_messages_by_default() {
        let router = ParallelForEach::builder(ComponentLocation::root("pfe"), double())
            .build()
            .unwrap();
        let out = router.route_event(Event::of(vec![5])).await.unwrap();
        let first = &out.payload().as_list().unwrap()[0];
        assert_eq!(first.as_message().unwrap().payload, Value::from(10));
    }

    #[tokio::test]
    async fn test_parts_carry_position() {
        let log = InvocationLog::new();
        let router = ParallelForEach::builder(
            ComponentLocation::root("pfe"),
            SpyProcessor::new("part", &log),
        )
        .max_concurrency(1)
        .build()
        .unwrap();
        let original = Event::of(vec!["a", "b"]);
        let out = router.route_event(original.clone()).await.unwrap();

        let positions: Vec<_> = log
            .events()
            .iter()
            .map(|event| event.item_sequence().map(|info| info.position))
            .collect();
        assert_eq!(positions, vec![Some(0), Some(1)]);
        assert_eq!(out.item_sequence(), original.item_sequence());
    }

    #[tokio::test]
    async fn test_failures_are_composite() {
        let nested = processor_fn(|event: Event| async move {
            match event.payload().as_int() {
                Some(2) => Err(ProcessingError::msg("two")),
                _ => Ok(event),
            }
        });
        let router = ParallelForEach::builder(ComponentLocation::root("pfe"), nested)
            .build()
            .unwrap();
        let err = router
            .route_event(Event::of(vec![1, 2, 3]))
            .await
            .unwrap_err();
        let composite = err.as_composite().unwrap();
        assert_eq!(composite.failures().keys().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(composite.results().len(), 2);
    }

    #[tokio::test]
    async fn test_custom_splitter_and_target() {
        let router = ParallelForEach::builder(ComponentLocation::root("pfe"), double())
            .splitter(VariableSplitter::new("items"))
            .flatten(true)
            .target("doubled")
            .build()
            .unwrap();
        let event = Event::of("keep").with_variable("items", vec![4, 5]);
        let out = router.route_event(event).await.unwrap();
        assert_eq!(out.payload().as_str(), Some("keep"));
        assert_eq!(out.variable("doubled"), Some(&Value::from(vec![8, 10])));
    }

    #[tokio::test]
    async fn test_map_payload_is_rejected_by_default_splitter() {
        let router = ParallelForEach::builder(ComponentLocation::root("pfe"), double())
            .build()
            .unwrap();
        let map = std::collections::BTreeMap::from([("k".to_owned(), Value::from(1))]);
        let err = router.route_event(Event::of(map)).await.unwrap_err();
        assert!(matches!(err.cause(), FlowError::MapNotSupported));
    }
}
