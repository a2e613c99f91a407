//! # Fork-Join Strategy
//!
//! Executes a set of [`RoutingPair`]s concurrently, up to a concurrency bound, with
//! a deadline per pair, and joins the outcomes.
//!
//! # Policies
//!
//! - **Fail-fast** (`delay_errors = false`): the first branch failure stops the
//!   join. Outstanding branches are dropped, their contexts errored, and the
//!   failure is returned with the original event attached.
//! - **Delay errors** (`delay_errors = true`): every branch runs to completion. If
//!   any failed, the result is a [`CompositeRoutingError`] carrying one failure per
//!   failed branch plus the messages of the successful ones. Otherwise the results
//!   are combined by an [`Aggregation`], in route order.
//!
//! In both cases the variables of all successful branches are merged into the
//! outgoing event, last-wins in route order.
//!
//! Every branch failure is resolved against its route with the branch event.
//! A branch that exceeds its deadline fails with [`FlowError::Timeout`]. Its
//! execution is not cancelled if it was moved to a scheduler, only ignored.

mod aggregation;

pub use aggregation::{Aggregation, CollectList, CollectMap, JoinOnly};

use crate::{
    resolution::{ErrorResolver, LocatedAt},
    route::Route,
    scheduling,
};
use flowline_core::{
    BoxProcessingStrategy, BoxScheduler, CompositeRoutingError, ComponentLocation, ConfigError,
    ErrorType, Event, EventContext, FlowError, Message, ProcessResult, ProcessingError,
    ProcessingType, RoutingResult, StepFuture,
};
use futures::{StreamExt, stream};
use std::{collections::BTreeMap, time::Duration};

/// One branch of a fork-join: an event and the route that processes it.
#[derive(Debug, Clone)]
pub struct RoutingPair {
    event: Event,
    route: Route,
}

impl RoutingPair {
    /// Pair `event` with `route`.
    pub fn new(event: Event, route: Route) -> Self {
        Self { event, route }
    }

    /// The branch event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The branch route.
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Split into event and route.
    pub fn into_parts(self) -> (Event, Route) {
        (self.event, self.route)
    }
}

/// Settings of a fork-join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForkJoinConfig {
    /// Maximum number of branches in flight. `None` means unbounded.
    pub max_concurrency: Option<usize>,
    /// Deadline of each branch. `None` means no deadline.
    pub timeout: Option<Duration>,
    /// Run every branch before reporting failures.
    pub delay_errors: bool,
}

impl Default for ForkJoinConfig {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            timeout: None,
            delay_errors: true,
        }
    }
}

impl ForkJoinConfig {
    /// Bound the number of branches in flight.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    /// Fail branches that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the delay-errors policy.
    pub fn with_delay_errors(mut self, delay_errors: bool) -> Self {
        self.delay_errors = delay_errors;
        self
    }

    /// Reject a zero concurrency bound or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == Some(0) {
            return Err(ConfigError::invalid("max_concurrency", "must be greater than 0"));
        }
        if self.timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(ConfigError::invalid("timeout", "must be greater than 0"));
        }
        Ok(())
    }
}

/// Concurrency-bounded executor and aggregator of routing pairs.
pub struct ForkJoinStrategy<A> {
    location: ComponentLocation,
    config: ForkJoinConfig,
    aggregation: A,
    target: Option<String>,
    processing_strategy: Option<BoxProcessingStrategy>,
    resolver: ErrorResolver,
}

impl<A: Aggregation> ForkJoinStrategy<A> {
    /// Create a strategy for the router at `location`.
    pub fn new(
        location: ComponentLocation,
        config: ForkJoinConfig,
        aggregation: A,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            location,
            config,
            aggregation,
            target: None,
            processing_strategy: None,
            resolver: ErrorResolver::default(),
        })
    }

    /// Store the aggregated value in variable `target` instead of the payload.
    pub fn with_target(mut self, target: Option<String>) -> Self {
        self.target = target;
        self
    }

    /// Run branches on the strategy's scheduler when more than one may be in flight.
    pub fn with_processing_strategy(mut self, strategy: Option<BoxProcessingStrategy>) -> Self {
        self.processing_strategy = strategy;
        self
    }

    /// The strategy's settings.
    pub fn config(&self) -> &ForkJoinConfig {
        &self.config
    }

    /// Execute `pairs` and join their outcomes for `original`.
    pub async fn fork_join<I>(&self, original: &Event, pairs: I) -> ProcessResult
    where
        I: IntoIterator<Item = RoutingPair>,
        I::IntoIter: Send,
    {
        let concurrency = self.config.max_concurrency.unwrap_or(usize::MAX);
        let scheduler = if concurrency == 1 {
            None
        } else {
            self.processing_strategy
                .as_ref()
                .and_then(|strategy| strategy.scheduler_for(ProcessingType::CpuLite))
        };
        tracing::debug!(
            router = %self.location,
            max_concurrency = ?self.config.max_concurrency,
            delay_errors = self.config.delay_errors,
            "fork-join started"
        );

        let parent = original.context().clone();
        let mut outcomes = stream::iter(pairs.into_iter().enumerate())
            .map(|(index, pair)| self.branch(index, pair, parent.clone(), scheduler.clone()))
            .buffer_unordered(concurrency);

        let mut results = Vec::new();
        let mut failures = BTreeMap::new();
        while let Some((index, outcome)) = outcomes.next().await {
            match outcome {
                Ok(event) => results.push((index, event)),
                Err(error) if !self.config.delay_errors || is_rejection(&error) => {
                    return Err(self.fail_fast(original, index, error));
                }
                Err(error) => {
                    failures.insert(index, error);
                }
            }
        }
        results.sort_by_key(|(index, _)| *index);

        if failures.is_empty() {
            return Ok(self.join(original, results));
        }

        let routing = RoutingResult {
            results: results
                .into_iter()
                .map(|(index, event)| (index, event.message().clone()))
                .collect(),
            failures,
        };
        let composite = ProcessingError::from(CompositeRoutingError::new(routing));
        Err(self
            .resolver
            .resolve(Some(&LocatedAt(&self.location)), original, composite))
    }

    async fn branch(
        &self,
        index: usize,
        pair: RoutingPair,
        parent: EventContext,
        scheduler: Option<BoxScheduler>,
    ) -> (usize, ProcessResult) {
        let (event, route) = pair.into_parts();
        let context = BranchContext(parent.child());
        let event = event.with_context(context.0.clone());
        let input = event.clone();

        let run: StepFuture = {
            let route = route.clone();
            Box::pin(async move { route.execute(event).await })
        };
        let run = match scheduler {
            Some(scheduler) => scheduling::offload(scheduler, run),
            None => run,
        };

        let outcome = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProcessingError::new(FlowError::Timeout(limit))
                    .with_error_type(ErrorType::TIMEOUT)),
            },
            None => run.await,
        };
        let outcome = outcome.map_err(|error| self.resolver.resolve(Some(&route), &input, error));

        match &outcome {
            Ok(_) => context.0.complete(),
            Err(_) => context.0.error(),
        };
        (index, outcome)
    }

    fn fail_fast(&self, original: &Event, index: usize, error: ProcessingError) -> ProcessingError {
        let record = error.to_record();
        error
            .with_event(original.clone().into_builder().error(Some(record)).build())
            .with_info("router", self.location.path())
            .with_info("route", index.to_string())
    }

    fn join(&self, original: &Event, results: Vec<(usize, Event)>) -> Event {
        let mut builder = original.clone().into_builder();
        for (_, event) in &results {
            builder = builder.merge_variables(event.variables());
        }
        match (self.aggregation.aggregate(&results), &self.target) {
            (Some(value), Some(target)) => builder = builder.variable(target.clone(), value),
            (Some(value), None) => builder = builder.message(Message::of(value)),
            (None, _) => {}
        }
        builder.build()
    }
}

/// A branch context that is errored if its branch is dropped before finishing,
/// as happens to branches still in flight when a fail-fast join returns.
struct BranchContext(EventContext);

impl Drop for BranchContext {
    fn drop(&mut self) {
        if !self.0.is_terminated() {
            self.0.error();
        }
    }
}

fn is_rejection(error: &ProcessingError) -> bool {
    matches!(error.cause(), FlowError::RejectedExecution(_))
}
