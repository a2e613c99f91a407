//! Standard error handlers.
//!
//! - [`OnErrorContinue`]: runs its processors on the failed event and completes
//!   it successfully, without the error record.
//! - [`OnErrorPropagate`]: runs its processors on the failed event and rethrows the
//!   original failure.
//! - [`ErrorHandlerChain`]: the first handler whose matcher accepts the failure
//!   handles it. Failures no handler accepts are rethrown.
//!
//! A failure raised by a handler's own processors replaces the original one.

use flowline_core::{BoxProcessor, ErrorHandler, ErrorType, Event, ProcessResult, ProcessingError};

/// Selects failures by error type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorTypeMatcher {
    /// Every failure.
    #[default]
    Any,
    /// Failures whose type matches one of these.
    OneOf(Vec<ErrorType>),
}

impl ErrorTypeMatcher {
    /// Match failures of `error_type`.
    pub fn of(error_type: ErrorType) -> Self {
        Self::OneOf(vec![error_type])
    }

    /// Whether `error` is selected. A failure without a type counts as `UNKNOWN`.
    pub fn matches(&self, error: &ProcessingError) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(types) => {
                let unknown = ErrorType::UNKNOWN;
                let actual = error.error_type().unwrap_or(&unknown);
                types.iter().any(|expected| expected.matches(actual))
            }
        }
    }
}

async fn run_processors(processors: &[BoxProcessor], event: Event) -> ProcessResult {
    let mut current = event;
    for processor in processors {
        let input = current.clone();
        current = processor
            .process_dyn(current)
            .await
            .map_err(|error| error.with_event_if_absent(|| input))?;
    }
    Ok(current)
}

/// Recovers matching failures.
#[derive(Clone, Default)]
pub struct OnErrorContinue {
    matcher: ErrorTypeMatcher,
    processors: Vec<BoxProcessor>,
}

impl OnErrorContinue {
    /// Recover every failure, with no processors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only recover failures selected by `matcher`.
    pub fn when(mut self, matcher: ErrorTypeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run `processor` on the failed event before recovering.
    pub fn processor(mut self, processor: BoxProcessor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Whether this handler accepts `error`.
    pub fn accepts(&self, error: &ProcessingError) -> bool {
        self.matcher.matches(error)
    }
}

impl ErrorHandler for OnErrorContinue {
    async fn handle(&self, error: ProcessingError) -> ProcessResult {
        if !self.accepts(&error) {
            return Err(error);
        }
        let Some(failed) = error.event().cloned() else {
            return Err(error);
        };
        tracing::debug!(
            error_type = ?error.error_type(),
            error = %error,
            "on-error-continue recovering failure"
        );
        let handled = run_processors(&self.processors, failed).await?;
        Ok(handled.into_builder().error(None).build())
    }
}

/// Rethrows matching failures after running its processors.
#[derive(Clone, Default)]
pub struct OnErrorPropagate {
    matcher: ErrorTypeMatcher,
    processors: Vec<BoxProcessor>,
}

impl OnErrorPropagate {
    /// Rethrow every failure, with no processors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only handle failures selected by `matcher`.
    pub fn when(mut self, matcher: ErrorTypeMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Run `processor` on the failed event before rethrowing.
    pub fn processor(mut self, processor: BoxProcessor) -> Self {
        self.processors.push(processor);
        self
    }

    /// Whether this handler accepts `error`.
    pub fn accepts(&self, error: &ProcessingError) -> bool {
        self.matcher.matches(error)
    }
}

impl ErrorHandler for OnErrorPropagate {
    async fn handle(&self, error: ProcessingError) -> ProcessResult {
        if !self.accepts(&error) {
            return Err(error);
        }
        let Some(failed) = error.event().cloned() else {
            return Err(error);
        };
        let handled = run_processors(&self.processors, failed).await?;
        Err(error.with_event(handled))
    }
}

/// One entry of an [`ErrorHandlerChain`].
#[derive(Clone)]
pub enum OnError {
    /// Recover.
    Continue(OnErrorContinue),
    /// Rethrow.
    Propagate(OnErrorPropagate),
}

impl OnError {
    fn accepts(&self, error: &ProcessingError) -> bool {
        match self {
            Self::Continue(handler) => handler.accepts(error),
            Self::Propagate(handler) => handler.accepts(error),
        }
    }
}

impl From<OnErrorContinue> for OnError {
    fn from(handler: OnErrorContinue) -> Self {
        Self::Continue(handler)
    }
}

impl From<OnErrorPropagate> for OnError {
    fn from(handler: OnErrorPropagate) -> Self {
        Self::Propagate(handler)
    }
}

/// Ordered handlers; the first that accepts a failure handles it.
#[derive(Clone, Default)]
pub struct ErrorHandlerChain {
    handlers: Vec<OnError>,
}

impl ErrorHandlerChain {
    /// An empty chain, which rethrows every failure.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler.
    pub fn on_error(mut self, handler: impl Into<OnError>) -> Self {
        self.handlers.push(handler.into());
        self
    }
}

impl ErrorHandler for ErrorHandlerChain {
    async fn handle(&self, error: ProcessingError) -> ProcessResult {
        match self.handlers.iter().find(|handler| handler.accepts(&error)) {
            Some(OnError::Continue(handler)) => handler.handle(error).await,
            Some(OnError::Propagate(handler)) => handler.handle(error).await,
            None => Err(error),
        }
    }
}
