//! Error type location and context contributors used by error resolution.

use crate::{
    component::ComponentLocation,
    error::{ErrorType, FlowError, ProcessingError},
    event::Event,
};
use std::sync::Arc;

/// Maps a cause to an [`ErrorType`].
pub trait ErrorTypeLocator: Send + Sync + 'static {
    /// The error type of `cause`.
    fn locate(&self, cause: &FlowError) -> ErrorType;
}

/// Locator that understands the routing core's own causes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorTypeLocator;

impl ErrorTypeLocator for DefaultErrorTypeLocator {
    fn locate(&self, cause: &FlowError) -> ErrorType {
        match cause {
            FlowError::Timeout(_) => ErrorType::TIMEOUT,
            FlowError::CompositeRouting(_) => ErrorType::COMPOSITE_ROUTING,
            FlowError::CouldNotRoute(_) | FlowError::NonRepeatablePayload => ErrorType::ROUTING,
            FlowError::Stopped(_) => ErrorType::LIFECYCLE,
            FlowError::RetryExhausted { .. } => ErrorType::RETRY_EXHAUSTED,
            FlowError::RetryContextInitialization(_)
            | FlowError::MapNotSupported
            | FlowError::Expression(_) => ErrorType::EXPRESSION,
            FlowError::RejectedExecution(_) => ErrorType::REJECTED_EXECUTION,
            FlowError::Typed(error_type, _) => error_type.clone(),
            FlowError::Custom(_) => ErrorType::UNKNOWN,
        }
    }
}

/// Contributes context entries to a failure being resolved.
pub trait ExceptionContextProvider: Send + Sync + 'static {
    /// Entries to add to [`ProcessingError::info`].
    fn context_info(
        &self,
        event: &Event,
        component: Option<&ComponentLocation>,
        error: &ProcessingError,
    ) -> Vec<(String, String)>;
}

/// Shared, type-erased error type locator.
pub type BoxErrorTypeLocator = Arc<dyn ErrorTypeLocator>;

/// Shared, type-erased context provider.
pub type BoxContextProvider = Arc<dyn ExceptionContextProvider>;
