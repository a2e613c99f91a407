//! Until-successful router.

use super::{RouterCore, router_component};
use crate::{expr::IntExpr, resolution::error_from_record, route::Route, scheduling};
use flowline_core::{
    BoxScheduler, Component, ComponentLocation, ConfigError, Event, FlowError, Lifecycle,
    ProcessResult, ProcessingError, ProcessingType, Processor,
};
use std::time::Duration;

/// Default number of attempts.
pub const DEFAULT_MAX_RETRIES: &str = "5";
/// Default delay between attempts, in milliseconds.
pub const DEFAULT_MILLIS_BETWEEN_RETRIES: &str = "60000";

/// Retries the nested route until it succeeds.
///
/// An attempt succeeds when the route returns an event without an error record.
/// The route is attempted at most `max_retries` times (at least once), waiting
/// `millis_between_retries` between attempts. The wait is a timer, on the
/// configured scheduler when one is set, and never blocks a thread.
///
/// Exhaustion fails with [`FlowError::RetryExhausted`] wrapping the last failure.
/// Settings that cannot be evaluated for an event fail with
/// [`FlowError::RetryContextInitialization`] before any attempt.
pub struct UntilSuccessful {
    core: RouterCore,
    max_retries: IntExpr,
    millis_between_retries: IntExpr,
    scheduler: Option<BoxScheduler>,
}

impl UntilSuccessful {
    /// Start configuring an until-successful at `location` over `nested`.
    pub fn builder(location: ComponentLocation, nested: impl Processor) -> UntilSuccessfulBuilder {
        UntilSuccessfulBuilder::new(location, nested)
    }

    /// The nested route.
    pub fn route(&self) -> &Route {
        &self.core.routes[0]
    }

    fn retry_policy(&self, event: &Event) -> Result<(usize, Duration), FlowError> {
        let init_error =
            |error: FlowError| FlowError::RetryContextInitialization(error.to_string());
        let max_retries = self.max_retries.evaluate(event).map_err(init_error)?;
        let millis = self.millis_between_retries.evaluate(event).map_err(init_error)?;
        let attempts = usize::try_from(max_retries).map_err(|_| {
            FlowError::RetryContextInitialization(format!("negative max retries: {max_retries}"))
        })?;
        let millis = u64::try_from(millis).map_err(|_| {
            FlowError::RetryContextInitialization(format!("negative retry delay: {millis}"))
        })?;
        Ok((attempts.max(1), Duration::from_millis(millis)))
    }

    /// Execute `event` on the nested route, retrying on failure.
    pub async fn retry(&self, event: Event) -> ProcessResult {
        let (attempts, delay) = self
            .retry_policy(&event)
            .map_err(|error| self.core.fail(self, &event, error))?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.route().execute(event.clone()).await {
                Ok(output) if !output.has_error() => return Ok(output),
                Ok(output) => error_from_record(output),
                Err(error) => error,
            };

            if attempt >= attempts {
                tracing::warn!(
                    router = %self.core.location,
                    attempts = attempt,
                    error = %failure,
                    "until-successful retries exhausted"
                );
                let exhausted = FlowError::RetryExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                };
                return Err(self.core.fail(self, &event, ProcessingError::new(exhausted)));
            }

            tracing::debug!(
                router = %self.core.location,
                attempt,
                delay = ?delay,
                error = %failure,
                "scheduling until-successful retry"
            );
            match &self.scheduler {
                Some(scheduler) => scheduling::delay_on(scheduler.as_ref(), delay)
                    .await
                    .map_err(|error| self.core.fail(self, &event, error))?,
                None => tokio::time::sleep(delay).await,
            }
        }
    }
}

impl Processor for UntilSuccessful {
    async fn process(&self, event: Event) -> ProcessResult {
        self.retry(event).await
    }

    fn processing_type(&self) -> ProcessingType {
        self.route().processing_type()
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

router_component!(UntilSuccessful);

/// Builder for [`UntilSuccessful`].
pub struct UntilSuccessfulBuilder {
    location: ComponentLocation,
    nested: Route,
    max_retries: String,
    millis_between_retries: String,
    scheduler: Option<BoxScheduler>,
}

impl UntilSuccessfulBuilder {
    /// Create a builder that retries `nested`.
    pub fn new(location: ComponentLocation, nested: impl Processor) -> Self {
        let nested = Route::with_location(location.child("route"), "route", nested.boxed());
        Self {
            location,
            nested,
            max_retries: DEFAULT_MAX_RETRIES.to_owned(),
            millis_between_retries: DEFAULT_MILLIS_BETWEEN_RETRIES.to_owned(),
            scheduler: None,
        }
    }

    /// Maximum number of attempts: a literal or `#[vars.<name>]`.
    pub fn max_retries(mut self, max_retries: impl Into<String>) -> Self {
        self.max_retries = max_retries.into();
        self
    }

    /// Delay between attempts in milliseconds: a literal or `#[vars.<name>]`.
    pub fn millis_between_retries(mut self, millis: impl Into<String>) -> Self {
        self.millis_between_retries = millis.into();
        self
    }

    /// Run retry timers on `scheduler`.
    pub fn scheduler(mut self, scheduler: BoxScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Build the router, parsing both settings.
    pub fn build(self) -> Result<UntilSuccessful, ConfigError> {
        let max_retries: IntExpr = self.max_retries.parse()?;
        let millis_between_retries: IntExpr = self.millis_between_retries.parse()?;
        if matches!(max_retries, IntExpr::Literal(n) if n < 0) {
            return Err(ConfigError::invalid("max_retries", "must not be negative"));
        }
        if matches!(millis_between_retries, IntExpr::Literal(n) if n < 0) {
            return Err(ConfigError::invalid("millis_between_retries", "must not be negative"));
        }
        Ok(UntilSuccessful {
            core: RouterCore::new(self.location, vec![self.nested]),
            max_retries,
            millis_between_retries,
            scheduler: self.scheduler,
        })
    }
}
