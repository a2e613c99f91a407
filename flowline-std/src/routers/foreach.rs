//! Foreach router.

use super::{RouterCore, router_component};
use crate::{route::Route, splitters::PayloadSplitter};
use flowline_core::{
    BoxSplitter, Component, ComponentLocation, ConfigError, Event, ItemSequenceInfo, Lifecycle,
    Message, ProcessResult, ProcessingError, Processor, SplitIter, SplittingStrategy, Value,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Default name of the iteration counter variable.
pub const DEFAULT_COUNTER_VARIABLE: &str = "counter";
/// Default name of the root message variable.
pub const DEFAULT_ROOT_MESSAGE_VARIABLE: &str = "rootMessage";

/// Iterates sequentially over the elements split from each event.
///
/// Each iteration routes the element (or a batch of elements, as a list) through
/// the nested route with:
///
/// - the counter variable set to the 1-based iteration number
/// - the root message variable set to the message foreach received
/// - item sequence info set to the iteration position
///
/// Variables set by one iteration are visible to the next and to the outgoing
/// event. The outgoing event carries the original message, and the counter, root
/// message and item sequence values that were present before foreach began, both
/// on success and on the failed event of an iteration error.
///
/// An event that splits into nothing passes through unchanged.
pub struct Foreach {
    core: RouterCore,
    splitter: BoxSplitter,
    batch_size: usize,
    counter_variable: String,
    root_message_variable: String,
}

/// Values foreach overwrites and restores.
struct Saved {
    message: Message,
    counter: Option<Value>,
    root_message: Option<Value>,
    item_sequence: Option<ItemSequenceInfo>,
}

/// Iteration state of one foreach execution.
struct ForeachContext {
    iterations: AtomicUsize,
}

impl ForeachContext {
    fn new() -> Self {
        Self {
            iterations: AtomicUsize::new(0),
        }
    }

    /// The 1-based number of the iteration being started.
    fn next_iteration(&self) -> usize {
        self.iterations.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Foreach {
    /// Start configuring a foreach at `location` over `nested`.
    pub fn builder(location: ComponentLocation, nested: impl Processor) -> ForeachBuilder {
        ForeachBuilder::new(location, nested)
    }

    /// The nested route.
    pub fn route(&self) -> &Route {
        &self.core.routes[0]
    }

    /// Elements per iteration.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Iterate over the elements split from `event`.
    pub async fn iterate(&self, event: Event) -> ProcessResult {
        let elements = self
            .splitter
            .split(&event)
            .map_err(|error| self.core.fail(self, &event, error))?;
        let mut elements = elements.peekable();
        if elements.peek().is_none() {
            tracing::warn!(
                router = %self.core.location,
                "foreach split produced no elements, passing event through"
            );
            return Ok(event);
        }

        let saved = Saved {
            message: event.message().clone(),
            counter: event.variable(&self.counter_variable).cloned(),
            root_message: event.variable(&self.root_message_variable).cloned(),
            item_sequence: event.item_sequence(),
        };
        let context = ForeachContext::new();
        let mut current = event
            .into_builder()
            .variable(self.root_message_variable.clone(), saved.message.clone())
            .build();

        for (position, element) in batched(Box::new(elements), self.batch_size).enumerate() {
            let iteration = context.next_iteration();
            let builder = current.into_builder();
            let builder = match element {
                Value::Message(message) => builder.message(*message),
                other => builder.payload(other),
            };
            let input = builder
                .variable(self.counter_variable.clone(), iteration)
                .item_sequence(Some(ItemSequenceInfo::of(position)))
                .build();

            match self.route().execute(input.clone()).await {
                Ok(output) => current = output,
                Err(error) => {
                    let error = self.core.fail(self, &input, error);
                    return Err(self.restore_failed(error, &saved));
                }
            }
        }

        Ok(self.restore(current, &saved))
    }

    fn restore(&self, event: Event, saved: &Saved) -> Event {
        event
            .into_builder()
            .message(saved.message.clone())
            .restore_variable(&self.counter_variable, saved.counter.clone())
            .restore_variable(&self.root_message_variable, saved.root_message.clone())
            .item_sequence(saved.item_sequence)
            .build()
    }

    fn restore_failed(&self, mut error: ProcessingError, saved: &Saved) -> ProcessingError {
        match error.take_event() {
            Some(failed) => error.with_event(self.restore(failed, saved)),
            None => error,
        }
    }
}

/// Group elements into lists of `size` when `size > 1`.
fn batched(elements: SplitIter, size: usize) -> SplitIter {
    if size <= 1 {
        return elements;
    }
    let mut elements = elements;
    Box::new(std::iter::from_fn(move || {
        let batch: Vec<Value> = elements.by_ref().take(size).collect();
        (!batch.is_empty()).then_some(Value::List(batch))
    }))
}

impl Processor for Foreach {
    async fn process(&self, event: Event) -> ProcessResult {
        self.iterate(event).await
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

router_component!(Foreach);

/// Builder for [`Foreach`].
pub struct ForeachBuilder {
    location: ComponentLocation,
    nested: Route,
    splitter: Option<BoxSplitter>,
    batch_size: usize,
    counter_variable: String,
    root_message_variable: String,
    reject_map_payload: bool,
}

impl ForeachBuilder {
    /// Create a builder that routes every element through `nested`.
    pub fn new(location: ComponentLocation, nested: impl Processor) -> Self {
        let nested = Route::with_location(location.child("route"), "route", nested.boxed());
        Self {
            location,
            nested,
            splitter: None,
            batch_size: 1,
            counter_variable: DEFAULT_COUNTER_VARIABLE.to_owned(),
            root_message_variable: DEFAULT_ROOT_MESSAGE_VARIABLE.to_owned(),
            reject_map_payload: true,
        }
    }

    /// Split events with `splitter` instead of element-wise on the payload.
    pub fn splitter(mut self, splitter: impl SplittingStrategy) -> Self {
        self.splitter = Some(Arc::new(splitter));
        self
    }

    /// Route `batch_size` elements per iteration, as a list.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Name of the iteration counter variable.
    pub fn counter_variable(mut self, name: impl Into<String>) -> Self {
        self.counter_variable = name.into();
        self
    }

    /// Name of the root message variable.
    pub fn root_message_variable(mut self, name: impl Into<String>) -> Self {
        self.root_message_variable = name.into();
        self
    }

    /// Whether the default splitter rejects map payloads. Enabled by default.
    pub fn reject_map_payload(mut self, reject: bool) -> Self {
        self.reject_map_payload = reject;
        self
    }

    /// Build the router.
    pub fn build(self) -> Result<Foreach, ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::invalid("batch_size", "must be greater than 0"));
        }
        if self.counter_variable.is_empty() {
            return Err(ConfigError::invalid("counter_variable", "must not be empty"));
        }
        if self.root_message_variable.is_empty() {
            return Err(ConfigError::invalid("root_message_variable", "must not be empty"));
        }

        let reject_maps = self.reject_map_payload;
        Ok(Foreach {
            core: RouterCore::new(self.location, vec![self.nested]),
            splitter: self
                .splitter
                .unwrap_or_else(|| Arc::new(PayloadSplitter::new().with_reject_maps(reject_maps))),
            batch_size: self.batch_size,
            counter_variable: self.counter_variable,
            root_message_variable: self.root_message_variable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingProcessor, InvocationLog, SetVariableProcessor, SpyProcessor};
    use flowline_core::{FlowError, processor_fn};
    use std::collections::BTreeMap;

    fn location() -> ComponentLocation {
        ComponentLocation::root("foreach")
    }

    #[tokio::test]
    async fn test_iterates_in_order_with_counter() {
        let log = InvocationLog::new();
        let router = Foreach::builder(location(), SpyProcessor::new("element", &log))
            .build()
            .unwrap();
        router.iterate(Event::of(vec!["a", "b", "c"])).await.unwrap();

        let seen = log.events();
        let payloads: Vec<_> = seen.iter().map(|e| e.payload().clone()).collect();
        let counters: Vec<_> = seen
            .iter()
            .map(|e| e.variable("counter").and_then(Value::as_int))
            .collect();
        assert_eq!(payloads, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
        assert_eq!(counters, vec![Some(1), Some(2), Some(3)]);
        let root = seen[0].variable("rootMessage").and_then(Value::as_message).unwrap();
        assert_eq!(root.payload, Value::from(vec!["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_restores_message_and_variables() {
        let router = Foreach::builder(location(), SetVariableProcessor::new("seen", true))
            .build()
            .unwrap();
        let event = Event::of(vec![1, 2])
            .with_variable("counter", "outer")
            .with_variable("keep", 7);
        let out = router.iterate(event).await.unwrap();

        assert_eq!(out.payload(), &Value::from(vec![1, 2]));
        assert_eq!(out.variable("counter"), Some(&Value::from("outer")));
        assert_eq!(out.variable("rootMessage"), None);
        assert_eq!(out.variable("keep"), Some(&Value::from(7)));
        assert_eq!(out.variable("seen"), Some(&Value::from(true)));
        assert_eq!(out.item_sequence(), None);
    }

    #[tokio::test]
    async fn test_restores_on_failure() {
        let router = Foreach::builder(location(), FailingProcessor::new("element failed"))
            .build()
            .unwrap();
        let err = router.iterate(Event::of(vec![1, 2])).await.unwrap_err();

        assert_eq!(err.message(), "element failed");
        let failed = err.event().unwrap();
        assert_eq!(failed.payload(), &Value::from(vec![1, 2]));
        assert_eq!(failed.variable("counter"), None);
        assert_eq!(failed.variable("rootMessage"), None);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let log = InvocationLog::new();
        let spy = SpyProcessor::new("element", &log);
        let nested = processor_fn(move |event: Event| {
            let spy = spy.clone();
            async move {
                let event = spy.process(event).await?;
                match event.payload().as_int() {
                    Some(2) => Err(ProcessingError::msg("two")),
                    _ => Ok(event),
                }
            }
        });
        let router = Foreach::builder(location(), nested).build().unwrap();
        assert!(router.iterate(Event::of(vec![1, 2, 3])).await.is_err());
        assert_eq!(log.len(), 2);
    }

    #[tokio::test]
    async fn test_batches_elements() {
        let log = InvocationLog::new();
        let router = Foreach::builder(location(), SpyProcessor::new("batch", &log))
            .batch_size(2)
            .build()
            .unwrap();
        router.iterate(Event::of(vec![1, 2, 3])).await.unwrap();

        let payloads: Vec<_> = log.events().iter().map(|e| e.payload().clone()).collect();
        assert_eq!(payloads, vec![Value::from(vec![1, 2]), Value::from(vec![3])]);
    }

    #[tokio::test]
    async fn test_empty_split_passes_through() {
        let log = InvocationLog::new();
        let router = Foreach::builder(location(), SpyProcessor::new("element", &log))
            .build()
            .unwrap();
        let event = Event::of(Vec::<i64>::new());
        let out = router.iterate(event.clone()).await.unwrap();
        assert!(log.is_empty());
        assert!(out.shares_message_with(&event));
    }

    #[tokio::test]
    async fn test_map_payload_rejected_unless_allowed() {
        let map = BTreeMap::from([("a".to_owned(), Value::from(1))]);
        let strict = Foreach::builder(location(), SetVariableProcessor::new("x", 1))
            .build()
            .unwrap();
        let err = strict.iterate(Event::of(map.clone())).await.unwrap_err();
        assert!(matches!(err.cause(), FlowError::MapNotSupported));

        let log = InvocationLog::new();
        let lenient = Foreach::builder(location(), SpyProcessor::new("entry", &log))
            .reject_map_payload(false)
            .build()
            .unwrap();
        lenient.iterate(Event::of(map)).await.unwrap();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let result = Foreach::builder(location(), SetVariableProcessor::new("x", 1))
            .batch_size(0)
            .build();
        assert!(result.is_err());
    }
}
