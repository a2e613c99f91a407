//! Payload values and the messages that carry them.
//!
//! A [`Message`] is the data half of an [`Event`](crate::Event): a payload plus
//! transport attributes. Payloads are dynamically typed [`Value`]s so that routers
//! can split collections, build aggregation maps and detect streaming content
//! without knowing anything about the processors that produced them.

use serde::{Serialize, Serializer};
use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex},
};

/// A dynamically typed payload or variable value.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    String(String),
    /// Ordered collection.
    List(Vec<Value>),
    /// Keyed collection with stable (sorted) key order.
    Map(BTreeMap<String, Value>),
    /// A whole message, as produced by fork-join aggregation.
    Message(Box<Message>),
    /// A non-repeatable streaming payload.
    Stream(StreamPayload),
}

impl Value {
    /// Short name of the value's kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Message(_) => "message",
            Value::Stream(_) => "stream",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value can only be consumed once.
    pub fn is_stream(&self) -> bool {
        matches!(self, Value::Stream(_))
    }

    /// Borrow the text content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The integer content, if this is an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// The boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the elements, if this is a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the entries, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrow the wrapped message, if any.
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Returns the payload of a wrapped message, or the value itself otherwise.
    pub fn flatten_message(self) -> Value {
        match self {
            Value::Message(message) => message.payload,
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                write!(f, "}}")
            }
            Value::Message(message) => write!(f, "{}", message.payload),
            Value::Stream(_) => write!(f, "<stream>"),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Message> for Value {
    fn from(value: Message) -> Self {
        Value::Message(Box::new(value))
    }
}

impl From<StreamPayload> for Value {
    fn from(value: StreamPayload) -> Self {
        Value::Stream(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// A streaming payload that can be consumed exactly once.
///
/// Clones share the same underlying cursor, so consuming any clone exhausts all of
/// them. Routers that broadcast an event reject this payload up front.
#[derive(Clone)]
pub struct StreamPayload {
    chunks: Arc<Mutex<Option<Vec<Value>>>>,
}

impl StreamPayload {
    /// Create a stream over the given chunks.
    pub fn new(chunks: Vec<Value>) -> Self {
        Self {
            chunks: Arc::new(Mutex::new(Some(chunks))),
        }
    }

    /// Takes the stream content. Returns `None` once consumed.
    pub fn consume(&self) -> Option<Vec<Value>> {
        self.chunks.lock().ok().and_then(|mut guard| guard.take())
    }

    /// Whether the content has already been taken.
    pub fn is_consumed(&self) -> bool {
        self.chunks.lock().map(|guard| guard.is_none()).unwrap_or(true)
    }
}

impl fmt::Debug for StreamPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPayload")
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

impl PartialEq for StreamPayload {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.chunks, &other.chunks)
    }
}

impl Serialize for StreamPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<stream>")
    }
}

/// The data carried by an event: payload plus attributes.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Message {
    /// The message body.
    pub payload: Value,
    /// Transport level metadata.
    pub attributes: Value,
}

impl Message {
    /// Create a message with the given payload and no attributes.
    pub fn of(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            attributes: Value::Null,
        }
    }

    /// Replace the attributes.
    pub fn with_attributes(mut self, attributes: impl Into<Value>) -> Self {
        self.attributes = attributes.into();
        self
    }
}

/// Position of an element event within the sequence it was split from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemSequenceInfo {
    /// Zero-based position within the sequence.
    pub position: usize,
    /// Total sequence size, when known up front.
    pub size: Option<usize>,
}

impl ItemSequenceInfo {
    /// Position without a known size.
    pub const fn of(position: usize) -> Self {
        Self {
            position,
            size: None,
        }
    }

    /// Position within a sequence of known size.
    pub const fn sized(position: usize, size: usize) -> Self {
        Self {
            position,
            size: Some(size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_display_matches_collection_notation() {
        let value = Value::from(vec![1, 2]);
        assert_eq!(value.to_string(), "[1, 2]");
    }

    #[test]
    fn test_stream_is_consumed_once_across_clones() {
        let stream = StreamPayload::new(vec![Value::from("a")]);
        let clone = stream.clone();
        assert_eq!(stream.consume(), Some(vec![Value::from("a")]));
        assert!(clone.is_consumed());
        assert_eq!(clone.consume(), None);
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({"items": [1, "two"]}));
        let items = value.as_map().and_then(|m| m.get("items")).cloned();
        assert_eq!(items, Some(Value::List(vec![Value::Int(1), Value::from("two")])));
    }

    #[test]
    fn test_flatten_message() {
        let value = Value::from(Message::of("inner"));
        assert_eq!(value.flatten_message(), Value::from("inner"));
    }
}
