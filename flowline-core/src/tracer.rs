//! # Span Factory
//!
//! Optional observability of chain steps. Every step is bracketed by
//! [`SpanFactory::start_span`] and [`SpanFactory::end_current_span`]; failures are
//! recorded on the current span before it ends. [`NoopSpanFactory`] can always be
//! substituted without any change in processing behavior.

use crate::{error::ProcessingError, event::Event};
use std::sync::Arc;

/// Opaque handle of an open span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanHandle(u64);

impl SpanHandle {
    /// Wrap a raw handle value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw handle value.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

/// Creates and closes spans around processing steps.
pub trait SpanFactory: Send + Sync + 'static {
    /// Open a span named `name` as a child of the event's current span.
    fn start_span(&self, event: &Event, name: &str) -> Option<SpanHandle>;

    /// Close the event's current span.
    fn end_current_span(&self, event: &Event);

    /// Record a failure on the event's current span.
    ///
    /// With `propagate` set, the failure is also recorded on every ancestor span.
    fn record_error_at_current_span(&self, event: &Event, error: &ProcessingError, propagate: bool);
}

/// Shared, type-erased span factory.
pub type BoxSpanFactory = Arc<dyn SpanFactory>;

/// Span factory that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpanFactory;

impl SpanFactory for NoopSpanFactory {
    fn start_span(&self, _event: &Event, _name: &str) -> Option<SpanHandle> {
        None
    }

    fn end_current_span(&self, _event: &Event) {}

    fn record_error_at_current_span(&self, _event: &Event, _error: &ProcessingError, _propagate: bool) {
    }
}
