//! Splitting strategies for foreach and parallel foreach.

use flowline_core::{Event, FlowError, ProcessingError, SplitIter, SplittingStrategy, Value};
use std::{collections::BTreeMap, iter};

/// Splits the payload element-wise.
///
/// | payload   | elements                                          |
/// |-----------|---------------------------------------------------|
/// | list      | each item                                         |
/// | map       | rejected, or `{key, value}` entries when allowed  |
/// | stream    | each chunk; a consumed stream is rejected         |
/// | message   | split of the inner payload                        |
/// | null      | nothing                                           |
/// | scalar    | the value itself                                  |
#[derive(Debug, Clone, Copy)]
pub struct PayloadSplitter {
    reject_maps: bool,
}

impl PayloadSplitter {
    /// A splitter that rejects map payloads.
    pub fn new() -> Self {
        Self { reject_maps: true }
    }

    /// Whether map payloads are rejected as ambiguous.
    pub fn with_reject_maps(mut self, reject_maps: bool) -> Self {
        self.reject_maps = reject_maps;
        self
    }
}

impl Default for PayloadSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl SplittingStrategy for PayloadSplitter {
    fn split(&self, event: &Event) -> Result<SplitIter, ProcessingError> {
        split_value(event.payload().clone(), self.reject_maps).map_err(ProcessingError::new)
    }
}

/// Splits the value of a variable with the same rules as [`PayloadSplitter`].
///
/// A missing variable splits into nothing.
#[derive(Debug, Clone)]
pub struct VariableSplitter {
    name: String,
}

impl VariableSplitter {
    /// Split variable `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SplittingStrategy for VariableSplitter {
    fn split(&self, event: &Event) -> Result<SplitIter, ProcessingError> {
        match event.variable(&self.name) {
            Some(value) => split_value(value.clone(), true).map_err(ProcessingError::new),
            None => Ok(Box::new(iter::empty())),
        }
    }
}

/// Splits a map payload into `{key, value}` entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntrySetSplitter;

impl SplittingStrategy for EntrySetSplitter {
    fn split(&self, event: &Event) -> Result<SplitIter, ProcessingError> {
        let payload = event.payload().clone().flatten_message();
        match payload {
            Value::Map(map) => Ok(entries(map)),
            other => Err(ProcessingError::new(FlowError::Expression(format!(
                "cannot split entries of a {} payload",
                other.kind()
            )))),
        }
    }
}

fn split_value(value: Value, reject_maps: bool) -> Result<SplitIter, FlowError> {
    match value {
        Value::List(items) => Ok(Box::new(items.into_iter())),
        Value::Map(_) if reject_maps => Err(FlowError::MapNotSupported),
        Value::Map(map) => Ok(entries(map)),
        Value::Stream(stream) => stream
            .consume()
            .map(|chunks| -> SplitIter { Box::new(chunks.into_iter()) })
            .ok_or(FlowError::NonRepeatablePayload),
        Value::Message(message) => split_value(message.payload, reject_maps),
        Value::Null => Ok(Box::new(iter::empty())),
        scalar => Ok(Box::new(iter::once(scalar))),
    }
}

fn entries(map: BTreeMap<String, Value>) -> SplitIter {
    Box::new(map.into_iter().map(|(key, value)| {
        Value::Map(BTreeMap::from([
            ("key".to_owned(), Value::String(key)),
            ("value".to_owned(), value),
        ]))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowline_core::{Message, StreamPayload};

    fn collect(split: Result<SplitIter, ProcessingError>) -> Vec<Value> {
        split.unwrap().collect()
    }

    #[test]
    fn test_payload_shapes() {
        let splitter = PayloadSplitter::new();
        assert_eq!(collect(splitter.split(&Event::of(vec![1, 2]))), vec![Value::from(1), Value::from(2)]);
        assert_eq!(collect(splitter.split(&Event::of(()))), Vec::<Value>::new());
        assert_eq!(collect(splitter.split(&Event::of("one"))), vec![Value::from("one")]);

        let nested = Message::of(vec!["a"]);
        assert_eq!(collect(splitter.split(&Event::of(nested))), vec![Value::from("a")]);
    }

    #[test]
    fn test_map_payload() {
        let map = BTreeMap::from([("k".to_owned(), Value::from(1))]);
        let err = PayloadSplitter::new().split(&Event::of(map.clone())).err().unwrap();
        assert!(matches!(err.cause(), FlowError::MapNotSupported));

        let entries = collect(PayloadSplitter::new().with_reject_maps(false).split(&Event::of(map)));
        let entry = entries[0].as_map().unwrap();
        assert_eq!(entry["key"], Value::from("k"));
        assert_eq!(entry["value"], Value::from(1));
    }

    #[test]
    fn test_stream_is_consumed_once() {
        let event = Event::of(StreamPayload::new(vec![Value::from(1), Value::from(2)]));
        assert_eq!(collect(PayloadSplitter::new().split(&event)).len(), 2);
        let err = PayloadSplitter::new().split(&event).err().unwrap();
        assert!(matches!(err.cause(), FlowError::NonRepeatablePayload));
    }

    #[test]
    fn test_variable_and_entry_splitters() {
        let event = Event::of(()).with_variable("items", vec![3, 4]);
        assert_eq!(collect(VariableSplitter::new("items").split(&event)).len(), 2);
        assert!(collect(VariableSplitter::new("absent").split(&event)).is_empty());

        assert!(EntrySetSplitter.split(&Event::of(1)).is_err());
        let map = BTreeMap::from([("a".to_owned(), Value::from(1)), ("b".to_owned(), Value::from(2))]);
        assert_eq!(collect(EntrySetSplitter.split(&Event::of(map))).len(), 2);
    }
}
