//! Processing event streams.
//!
//! [`ProcessorExt`] feeds a [`Stream`] of events through any processor, one at a
//! time or with bounded concurrency.

use flowline_core::{Event, ProcessResult, Processor};
use futures::{Stream, StreamExt};

/// Stream helpers available on every [`Processor`].
pub trait ProcessorExt: Processor + Sized {
    /// Process each event in order, one at a time.
    fn apply<'a, S>(&'a self, events: S) -> impl Stream<Item = ProcessResult> + Send + 'a
    where
        S: Stream<Item = Event> + Send + 'a,
    {
        events.then(move |event| self.process(event))
    }

    /// Process up to `limit` events at once. Results keep input order.
    fn apply_concurrent<'a, S>(
        &'a self,
        events: S,
        limit: usize,
    ) -> impl Stream<Item = ProcessResult> + Send + 'a
    where
        S: Stream<Item = Event> + Send + 'a,
    {
        events
            .map(move |event| self.process(event))
            .buffered(limit.max(1))
    }
}

impl<P: Processor> ProcessorExt for P {}
