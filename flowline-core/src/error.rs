//! Error types for Flowline.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`FlowError`] - The closed set of causes raised by the routing core
//! - [`ProcessingError`] - A cause enriched with the failed event, error type and
//!   failing component (a "messaging exception")
//! - [`CompositeRoutingError`] - Every branch failure of a delay-errors fork-join
//! - [`ConfigError`] - Invalid values detected at configuration time
//! - [`LifecycleError`] - Illegal lifecycle transitions

use crate::{
    component::ComponentLocation,
    event::Event,
    lifecycle::LifecyclePhase,
    message::Message,
};
use std::{borrow::Cow, collections::BTreeMap, fmt, sync::Arc, time::Duration};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A shared, cloneable error type.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Error types
// ============================================================================

/// A resolved error type, rendered as `NAMESPACE:IDENTIFIER`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorType {
    namespace: Cow<'static, str>,
    identifier: Cow<'static, str>,
}

impl ErrorType {
    /// Matches every error type.
    pub const ANY: ErrorType = ErrorType::of("FLOW", "ANY");
    /// A cause no locator could classify.
    pub const UNKNOWN: ErrorType = ErrorType::of("FLOW", "UNKNOWN");
    /// A fork-join branch exceeded its deadline.
    pub const TIMEOUT: ErrorType = ErrorType::of("FLOW", "TIMEOUT");
    /// One or more branches of a delay-errors fork-join failed.
    pub const COMPOSITE_ROUTING: ErrorType = ErrorType::of("FLOW", "COMPOSITE_ROUTING");
    /// A router could not select a route.
    pub const ROUTING: ErrorType = ErrorType::of("FLOW", "ROUTING");
    /// Until-successful ran out of attempts.
    pub const RETRY_EXHAUSTED: ErrorType = ErrorType::of("FLOW", "RETRY_EXHAUSTED");
    /// An expression or split could not be evaluated.
    pub const EXPRESSION: ErrorType = ErrorType::of("FLOW", "EXPRESSION");
    /// A stopped component received an event.
    pub const LIFECYCLE: ErrorType = ErrorType::of("FLOW", "LIFECYCLE");
    /// A scheduler refused a task.
    pub const REJECTED_EXECUTION: ErrorType = ErrorType::of("FLOW", "REJECTED_EXECUTION");

    /// Create an error type from static parts.
    pub const fn of(namespace: &'static str, identifier: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            identifier: Cow::Borrowed(identifier),
        }
    }

    /// Create an error type from owned parts.
    pub fn new(namespace: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            identifier: Cow::Owned(identifier.into()),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Whether an error of type `other` is selected by this type.
    pub fn matches(&self, other: &ErrorType) -> bool {
        *self == ErrorType::ANY || self == other
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.identifier)
    }
}

/// Error details attached to an event by error resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    /// The resolved error type.
    pub error_type: ErrorType,
    /// Human readable description of the cause.
    pub description: String,
    /// Where the failure was raised.
    pub failing_component: Option<ComponentLocation>,
}

// ============================================================================
// Causes
// ============================================================================

/// Causes raised by the routing core itself.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// A fork-join branch did not complete within its deadline.
    #[error("route timed out after {0:?}")]
    Timeout(Duration),

    /// One or more fork-join branches failed.
    #[error(transparent)]
    CompositeRouting(#[from] CompositeRoutingError),

    /// No route could be selected for the event.
    #[error("could not route event: {0}")]
    CouldNotRoute(String),

    /// The component is stopped and does not accept events.
    #[error("`{0}` is stopped and cannot process events")]
    Stopped(String),

    /// Until-successful exhausted its attempts.
    #[error("until-successful retries exhausted. Last exception message was: {last}")]
    RetryExhausted {
        /// Number of attempts performed.
        attempts: usize,
        /// The failure of the final attempt.
        #[source]
        last: Box<ProcessingError>,
    },

    /// The retry machinery could not be set up for the event.
    #[error("could not initialise retry context: {0}")]
    RetryContextInitialization(String),

    /// A map payload was used as a split source.
    #[error("map payloads cannot be split, split over the entry set instead")]
    MapNotSupported,

    /// A non-repeatable streaming payload would be consumed by several routes.
    #[error("payload is a non-repeatable stream and cannot be sent to multiple routes")]
    NonRepeatablePayload,

    /// An expression could not be evaluated.
    #[error("expression evaluation failed: {0}")]
    Expression(String),

    /// A scheduler refused a task.
    #[error("task rejected by scheduler `{0}`")]
    RejectedExecution(String),

    /// A user cause with an explicit error type.
    #[error("{1}")]
    Typed(ErrorType, #[source] SharedError),

    /// Any other user cause.
    #[error(transparent)]
    Custom(SharedError),
}

// ============================================================================
// Composite routing
// ============================================================================

/// Per-route outcomes of a delay-errors fork-join, keyed by route index.
#[derive(Debug, Clone, Default)]
pub struct RoutingResult {
    /// Messages of the branches that succeeded.
    pub results: BTreeMap<usize, Message>,
    /// Failures of the branches that failed.
    pub failures: BTreeMap<usize, ProcessingError>,
}

/// Bundles every branch failure of a delay-errors fork-join.
#[derive(Debug, Clone)]
pub struct CompositeRoutingError {
    result: RoutingResult,
}

impl CompositeRoutingError {
    /// Create a composite error from a routing result with at least one failure.
    pub fn new(result: RoutingResult) -> Self {
        Self { result }
    }

    pub fn result(&self) -> &RoutingResult {
        &self.result
    }

    pub fn failures(&self) -> &BTreeMap<usize, ProcessingError> {
        &self.result.failures
    }

    pub fn results(&self) -> &BTreeMap<usize, Message> {
        &self.result.results
    }
}

impl fmt::Display for CompositeRoutingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Exception(s) were found for route(s): ")?;
        for (i, (route, failure)) in self.result.failures.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "route {route}: {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositeRoutingError {}

// ============================================================================
// Processing error
// ============================================================================

/// A failure raised while processing an event.
///
/// Resolution (see `flowline_std::resolution`) fills in the failed event, the
/// error type and the failing component close to where the cause was raised.
#[derive(Error, Debug, Clone)]
#[error("{cause}")]
pub struct ProcessingError {
    #[source]
    cause: FlowError,
    event: Option<Box<Event>>,
    error_type: Option<ErrorType>,
    failing_component: Option<ComponentLocation>,
    info: BTreeMap<String, String>,
    resolved: bool,
}

impl ProcessingError {
    /// Wrap a cause without any context.
    pub fn new(cause: FlowError) -> Self {
        Self {
            cause,
            event: None,
            error_type: None,
            failing_component: None,
            info: BTreeMap::new(),
            resolved: false,
        }
    }

    /// Wrap a user error.
    pub fn custom(error: impl Into<BoxError>) -> Self {
        Self::new(FlowError::Custom(Arc::from(error.into())))
    }

    /// Wrap a user error with an explicit error type.
    pub fn typed(error_type: ErrorType, error: impl Into<BoxError>) -> Self {
        Self::new(FlowError::Typed(error_type, Arc::from(error.into())))
    }

    /// A user error carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::custom(message.into())
    }

    pub fn cause(&self) -> &FlowError {
        &self.cause
    }

    /// The event that was being processed, if attached.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_deref()
    }

    /// Take the attached event out of this error.
    pub fn take_event(&mut self) -> Option<Event> {
        self.event.take().map(|event| *event)
    }

    pub fn error_type(&self) -> Option<&ErrorType> {
        self.error_type.as_ref()
    }

    pub fn failing_component(&self) -> Option<&ComponentLocation> {
        self.failing_component.as_ref()
    }

    pub fn info(&self) -> &BTreeMap<String, String> {
        &self.info
    }

    /// Whether this error went through resolution.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The message of the cause.
    pub fn message(&self) -> String {
        self.cause.to_string()
    }

    /// The innermost error in the source chain.
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        let mut current: &(dyn std::error::Error + 'static) = &self.cause;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }

    /// Whether the cause is a fork-join timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, FlowError::Timeout(_))
    }

    /// The composite error, if this is a delay-errors routing failure.
    pub fn as_composite(&self) -> Option<&CompositeRoutingError> {
        match &self.cause {
            FlowError::CompositeRouting(composite) => Some(composite),
            _ => None,
        }
    }

    /// Attach the failed event, replacing any previous one.
    pub fn with_event(mut self, event: Event) -> Self {
        self.event = Some(Box::new(event));
        self
    }

    /// Attach the failed event only if none is attached yet.
    pub fn with_event_if_absent(mut self, event: impl FnOnce() -> Event) -> Self {
        if self.event.is_none() {
            self.event = Some(Box::new(event()));
        }
        self
    }

    pub fn with_error_type(mut self, error_type: ErrorType) -> Self {
        self.error_type = Some(error_type);
        self
    }

    pub fn with_failing_component(mut self, location: ComponentLocation) -> Self {
        self.failing_component = Some(location);
        self
    }

    /// Add a context entry.
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }

    /// Mark this error as resolved.
    pub fn mark_resolved(mut self) -> Self {
        self.resolved = true;
        self
    }

    /// Replace the cause, keeping event and context.
    pub fn map_cause(mut self, f: impl FnOnce(FlowError) -> FlowError) -> Self {
        self.cause = f(self.cause);
        self
    }

    /// The error record describing this failure on an event.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            error_type: self.error_type.clone().unwrap_or(ErrorType::UNKNOWN),
            description: self.message(),
            failing_component: self.failing_component.clone(),
        }
    }
}

impl From<FlowError> for ProcessingError {
    fn from(cause: FlowError) -> Self {
        ProcessingError::new(cause)
    }
}

impl From<CompositeRoutingError> for ProcessingError {
    fn from(cause: CompositeRoutingError) -> Self {
        ProcessingError::new(FlowError::CompositeRouting(cause))
    }
}

impl From<BoxError> for ProcessingError {
    fn from(err: BoxError) -> Self {
        ProcessingError::custom(err)
    }
}

// ============================================================================
// Configuration and lifecycle
// ============================================================================

/// Invalid values detected while configuring a component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting has an unusable value.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// The offending setting.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A router needs more routes than were configured.
    #[error("at least {min} routes are required, {actual} configured")]
    TooFewRoutes {
        /// Minimum number of routes.
        min: usize,
        /// Configured number of routes.
        actual: usize,
    },

    /// The configuration source could not be read.
    #[error("configuration source error: {0}")]
    Source(String),
}

impl ConfigError {
    /// Shorthand for [`ConfigError::Invalid`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors raised by lifecycle transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The transition is not allowed from the current phase.
    #[error("cannot {action} `{component}` while {phase:?}")]
    IllegalPhase {
        /// Component name.
        component: String,
        /// Attempted transition.
        action: &'static str,
        /// Current phase.
        phase: LifecyclePhase,
    },

    /// A component failed while transitioning.
    #[error("`{component}` failed to {action}: {reason}")]
    Failed {
        /// Component name.
        component: String,
        /// Attempted transition.
        action: &'static str,
        /// Failure description.
        reason: String,
    },

    /// Configuration was rejected during initialisation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_display_and_matching() {
        assert_eq!(ErrorType::TIMEOUT.to_string(), "FLOW:TIMEOUT");
        assert!(ErrorType::ANY.matches(&ErrorType::new("APP", "BAD")));
        assert!(!ErrorType::TIMEOUT.matches(&ErrorType::ROUTING));
        assert!(ErrorType::new("FLOW", "ROUTING").matches(&ErrorType::ROUTING));
    }

    #[test]
    fn test_retry_exhausted_message() {
        let last = ProcessingError::msg("boom");
        let err = FlowError::RetryExhausted {
            attempts: 3,
            last: Box::new(last),
        };
        assert_eq!(
            err.to_string(),
            "until-successful retries exhausted. Last exception message was: boom"
        );
    }

    #[test]
    fn test_root_cause_walks_sources() {
        let inner = ProcessingError::msg("disk full");
        let err = ProcessingError::new(FlowError::RetryExhausted {
            attempts: 1,
            last: Box::new(inner),
        });
        assert_eq!(err.root_cause().to_string(), "disk full");
    }

    #[test]
    fn test_composite_lists_failed_routes() {
        let mut result = RoutingResult::default();
        result.failures.insert(1, ProcessingError::msg("bad"));
        result.results.insert(0, Message::of("ok"));
        let err = CompositeRoutingError::new(result);
        assert_eq!(
            err.to_string(),
            "Exception(s) were found for route(s): route 1: bad"
        );
    }

    #[test]
    fn test_event_if_absent_keeps_first() {
        let err = ProcessingError::msg("x")
            .with_event(Event::of("first"))
            .with_event_if_absent(|| Event::of("second"));
        assert_eq!(
            err.event().map(|e| e.payload().clone()),
            Some(crate::Value::from("first"))
        );
    }
}
