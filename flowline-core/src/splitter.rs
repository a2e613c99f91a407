//! # Splitting Strategy
//!
//! Foreach and parallel-foreach turn one event into a sequence of values through a
//! [`SplittingStrategy`]. The sequence is produced lazily and consumed once.

use crate::{error::ProcessingError, event::Event, message::Value};
use std::sync::Arc;

/// Lazily produced sequence of split values.
pub type SplitIter = Box<dyn Iterator<Item = Value> + Send>;

/// Splits an event into values.
pub trait SplittingStrategy: Send + Sync + 'static {
    /// Produce the values to iterate over.
    fn split(&self, event: &Event) -> Result<SplitIter, ProcessingError>;
}

/// Shared, type-erased splitting strategy.
pub type BoxSplitter = Arc<dyn SplittingStrategy>;

impl<F> SplittingStrategy for F
where
    F: Fn(&Event) -> Result<SplitIter, ProcessingError> + Send + Sync + 'static,
{
    fn split(&self, event: &Event) -> Result<SplitIter, ProcessingError> {
        (self)(event)
    }
}
