//! # Error Handler
//!
//! The recovery point of a chain. A chain with a configured [`ErrorHandler`] routes
//! every step failure to it exactly once; the handler either recovers (`Ok`, the
//! event continues to the caller as a success) or rethrows (`Err`, the failure
//! propagates to the enclosing scope unchanged).

use crate::{
    error::ProcessingError,
    processor::{ProcessFuture, ProcessResult},
};
use std::{future::Future, sync::Arc};

/// Handles failures raised inside a chain.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an `ErrorHandler`",
    label = "missing `ErrorHandler` implementation",
    note = "Error handlers must implement `handle(&self, ProcessingError) -> Result<Event, ProcessingError>`."
)]
pub trait ErrorHandler: Send + Sync + 'static {
    /// Handle a resolved failure.
    ///
    /// The failure always carries the event that failed.
    fn handle(&self, error: ProcessingError) -> impl Future<Output = ProcessResult> + Send;
}

/// Dynamic object-safe version of [`ErrorHandler`].
pub trait DynErrorHandler: Send + Sync + 'static {
    /// Handle a resolved failure (dynamic dispatch version).
    fn handle_dyn(&self, error: ProcessingError) -> ProcessFuture<'_>;
}

impl<T: ErrorHandler> DynErrorHandler for T {
    fn handle_dyn(&self, error: ProcessingError) -> ProcessFuture<'_> {
        Box::pin(self.handle(error))
    }
}

/// Shared, type-erased error handler.
pub type BoxErrorHandler = Arc<dyn DynErrorHandler>;

impl ErrorHandler for Arc<dyn DynErrorHandler> {
    fn handle(&self, error: ProcessingError) -> impl Future<Output = ProcessResult> + Send {
        (**self).handle_dyn(error)
    }
}
