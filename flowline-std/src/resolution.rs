//! Error resolution.
//!
//! Turns a raw failure raised by a processor into a structured [`ProcessingError`]
//! that carries the event that failed, the resolved [`ErrorType`], the location of
//! the failing component and any context contributed by
//! [`ExceptionContextProvider`]s.
//!
//! Resolution is idempotent: a failure resolved by a nested chain keeps its type
//! and innermost failing component when it is resolved again further out.

use flowline_core::{
    BoxContextProvider, BoxErrorTypeLocator, Component, ComponentLocation,
    DefaultErrorTypeLocator, ErrorType, Event, ExceptionContextProvider, ProcessingError,
};
use std::sync::Arc;

/// Resolves failures raised by processors.
#[derive(Clone)]
pub struct ErrorResolver {
    locator: BoxErrorTypeLocator,
    providers: Vec<BoxContextProvider>,
}

impl ErrorResolver {
    /// Create a resolver with the given locator and no context providers.
    pub fn new(locator: BoxErrorTypeLocator) -> Self {
        Self {
            locator,
            providers: Vec::new(),
        }
    }

    /// Add a context provider.
    pub fn with_provider(mut self, provider: impl ExceptionContextProvider) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Resolve `error`, raised by `component` (if the processor is one) while
    /// processing `event`.
    pub fn resolve(
        &self,
        component: Option<&dyn Component>,
        event: &Event,
        error: ProcessingError,
    ) -> ProcessingError {
        if error.is_resolved() {
            return error.with_event_if_absent(|| event.clone());
        }

        let mut error = error.with_event_if_absent(|| event.clone());
        let mut error_type = error
            .error_type()
            .cloned()
            .unwrap_or_else(|| self.locator.locate(error.cause()));

        if let Some(component) = component {
            if let Some(mapping) = component
                .error_mappings()
                .iter()
                .find(|mapping| mapping.source.matches(&error_type))
            {
                error_type = mapping.target.clone();
            }
            if error.failing_component().is_none() {
                error = error.with_failing_component(component.location().clone());
            }
        }
        error = error.with_error_type(error_type);

        let info: Vec<(String, String)> = self
            .providers
            .iter()
            .flat_map(|provider| provider.context_info(event, error.failing_component(), &error))
            .collect();
        for (key, value) in info {
            error = error.with_info(key, value);
        }

        if let Some(component) = component {
            error = component.resolve_error(error);
        }
        attach_record(error.mark_resolved())
    }

    /// Resolve a failure that is not associated with any component.
    pub fn resolve_generic(&self, event: &Event, error: ProcessingError) -> ProcessingError {
        self.resolve(None, event, error)
    }
}

impl Default for ErrorResolver {
    fn default() -> Self {
        Self::new(Arc::new(DefaultErrorTypeLocator))
    }
}

impl std::fmt::Debug for ErrorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorResolver")
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// A bare location standing in for a processor that is not a component itself.
pub(crate) struct LocatedAt<'a>(pub(crate) &'a ComponentLocation);

impl Component for LocatedAt<'_> {
    fn location(&self) -> &ComponentLocation {
        self.0
    }
}

// The failed event carries a record of its own failure.
fn attach_record(mut error: ProcessingError) -> ProcessingError {
    let record = error.to_record();
    match error.take_event() {
        Some(event) => error.with_event(event.into_builder().error(Some(record)).build()),
        None => error,
    }
}

/// Build a failure for an event that completed with an error record attached.
pub fn error_from_record(event: Event) -> ProcessingError {
    let (error_type, description) = match event.error() {
        Some(record) => (record.error_type.clone(), record.description.clone()),
        None => (ErrorType::UNKNOWN, String::from("event completed with an error")),
    };
    ProcessingError::typed(error_type.clone(), description)
        .with_error_type(error_type)
        .with_event(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::{ErrorMapping, FlowError};
    use std::time::Duration;

    struct Step {
        location: ComponentLocation,
        mappings: Vec<ErrorMapping>,
    }

    impl Component for Step {
        fn location(&self) -> &ComponentLocation {
            &self.location
        }

        fn error_mappings(&self) -> &[ErrorMapping] {
            &self.mappings
        }
    }

    struct FlowName;

    impl ExceptionContextProvider for FlowName {
        fn context_info(
            &self,
            _event: &Event,
            _component: Option<&ComponentLocation>,
            _error: &ProcessingError,
        ) -> Vec<(String, String)> {
            vec![("flow".into(), "orders".into())]
        }
    }

    fn step(path: &str) -> Step {
        Step {
            location: ComponentLocation::root(path),
            mappings: Vec::new(),
        }
    }

    #[test]
    fn test_resolution_fills_event_type_and_component() {
        let resolver = ErrorResolver::default().with_provider(FlowName);
        let event = Event::of("x");
        let err = resolver.resolve(Some(&step("a")), &event, ProcessingError::msg("boom"));

        assert!(err.is_resolved());
        assert_eq!(err.error_type(), Some(&ErrorType::UNKNOWN));
        assert_eq!(err.failing_component().map(|c| c.path()), Some("a"));
        assert_eq!(err.info().get("flow").map(String::as_str), Some("orders"));
        let failed = err.event().unwrap();
        assert_eq!(failed.payload().as_str(), Some("x"));
        assert_eq!(failed.error().unwrap().description, "boom");
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = ErrorResolver::default();
        let event = Event::of("x");
        let inner = resolver.resolve(
            Some(&step("inner")),
            &event,
            ProcessingError::new(FlowError::Timeout(Duration::from_millis(1))),
        );
        let outer = resolver.resolve(Some(&step("outer")), &event, inner.clone());

        assert_eq!(outer.error_type(), inner.error_type());
        assert_eq!(outer.failing_component().map(|c| c.path()), Some("inner"));
        assert_eq!(outer.message(), inner.message());
    }

    #[test]
    fn test_component_mappings_apply() {
        let resolver = ErrorResolver::default();
        let app_error = ErrorType::new("APP", "UPSTREAM");
        let component = Step {
            location: ComponentLocation::root("http"),
            mappings: vec![ErrorMapping::new(ErrorType::TIMEOUT, app_error.clone())],
        };
        let err = resolver.resolve(
            Some(&component),
            &Event::of(()),
            ProcessingError::new(FlowError::Timeout(Duration::from_secs(1))),
        );
        assert_eq!(err.error_type(), Some(&app_error));
    }

    #[test]
    fn test_generic_resolution_has_no_component() {
        let err = ErrorResolver::default().resolve_generic(&Event::of(1), ProcessingError::msg("x"));
        assert!(err.failing_component().is_none());
        assert!(err.event().is_some());
    }
}
