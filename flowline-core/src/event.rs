//! # Event
//!
//! The unit of work flowing through chains and routers.
//!
//! An [`Event`] is immutable per step: processors receive an owned event and return
//! a new one. Message and variables are `Arc`-shared, so cloning an event for a
//! fan-out branch is O(1); modifications go through [`EventBuilder`], which copies
//! on write.

use crate::{
    context::EventContext,
    error::ErrorRecord,
    message::{ItemSequenceInfo, Message, Value},
};
use std::{collections::BTreeMap, sync::Arc};

/// Flow variables carried by an event.
pub type Variables = BTreeMap<String, Value>;

/// A unit of work: message, variables and the owning [`EventContext`].
#[derive(Debug, Clone)]
pub struct Event {
    context: EventContext,
    message: Arc<Message>,
    variables: Arc<Variables>,
    item_sequence: Option<ItemSequenceInfo>,
    error: Option<Arc<ErrorRecord>>,
}

impl Event {
    /// Create an event in a fresh root context.
    pub fn new(message: Message) -> Self {
        Self::in_context(message, EventContext::new())
    }

    /// Create an event carrying `payload` in a fresh root context.
    pub fn of(payload: impl Into<Value>) -> Self {
        Self::new(Message::of(payload))
    }

    /// Create an event owned by the given context.
    pub fn in_context(message: Message, context: EventContext) -> Self {
        Self {
            context,
            message: Arc::new(message),
            variables: Arc::new(Variables::new()),
            item_sequence: None,
            error: None,
        }
    }

    /// The owning context.
    pub fn context(&self) -> &EventContext {
        &self.context
    }

    /// The carried message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Shortcut for the message payload.
    pub fn payload(&self) -> &Value {
        &self.message.payload
    }

    /// All flow variables.
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Look up a single variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Position within a split sequence, if this is an element event.
    pub fn item_sequence(&self) -> Option<ItemSequenceInfo> {
        self.item_sequence
    }

    /// The error record attached by error resolution, if any.
    ///
    /// An event that carries an error record is considered failed by routers that
    /// test for success (first-successful, until-successful).
    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_deref()
    }

    /// Whether an error record is attached.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Start a copy-on-write modification of this event.
    pub fn into_builder(self) -> EventBuilder {
        EventBuilder { event: self }
    }

    /// Copy of this event with the payload replaced.
    pub fn with_payload(self, payload: impl Into<Value>) -> Self {
        self.into_builder().payload(payload).build()
    }

    /// Copy of this event with one variable set.
    pub fn with_variable(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.into_builder().variable(name, value).build()
    }

    /// Copy of this event owned by another context.
    pub fn with_context(self, context: EventContext) -> Self {
        self.into_builder().context(context).build()
    }

    /// Whether both events share the same message allocation.
    pub fn shares_message_with(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.message, &other.message)
    }
}

/// Builder for derived events. Obtained from [`Event::into_builder`].
#[derive(Debug)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Replace the whole message.
    pub fn message(mut self, message: Message) -> Self {
        self.event.message = Arc::new(message);
        self
    }

    /// Replace the payload, keeping attributes.
    pub fn payload(mut self, payload: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.event.message).payload = payload.into();
        self
    }

    /// Replace the attributes, keeping the payload.
    pub fn attributes(mut self, attributes: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.event.message).attributes = attributes.into();
        self
    }

    /// Set a variable.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.event.variables).insert(name.into(), value.into());
        self
    }

    /// Remove a variable.
    pub fn remove_variable(mut self, name: &str) -> Self {
        if self.event.variables.contains_key(name) {
            Arc::make_mut(&mut self.event.variables).remove(name);
        }
        self
    }

    /// Set a variable when `value` is `Some`, remove it otherwise.
    pub fn restore_variable(self, name: &str, value: Option<Value>) -> Self {
        match value {
            Some(value) => self.variable(name, value),
            None => self.remove_variable(name),
        }
    }

    /// Replace all variables.
    pub fn variables(mut self, variables: Variables) -> Self {
        self.event.variables = Arc::new(variables);
        self
    }

    /// Merge variables into this event; incoming values win.
    pub fn merge_variables(mut self, other: &Variables) -> Self {
        if !other.is_empty() {
            let vars = Arc::make_mut(&mut self.event.variables);
            for (name, value) in other {
                vars.insert(name.clone(), value.clone());
            }
        }
        self
    }

    /// Set or clear the item sequence info.
    pub fn item_sequence(mut self, info: Option<ItemSequenceInfo>) -> Self {
        self.event.item_sequence = info;
        self
    }

    /// Attach or clear the error record.
    pub fn error(mut self, record: Option<ErrorRecord>) -> Self {
        self.event.error = record.map(Arc::new);
        self
    }

    /// Move the event to another context.
    pub fn context(mut self, context: EventContext) -> Self {
        self.event.context = context;
        self
    }

    /// Finish building.
    pub fn build(self) -> Event {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_message_until_modified() {
        let event = Event::of("p");
        let copy = event.clone();
        assert!(copy.shares_message_with(&event));

        let modified = copy.with_payload("q");
        assert!(!modified.shares_message_with(&event));
        assert_eq!(event.payload(), &Value::from("p"));
        assert_eq!(modified.payload(), &Value::from("q"));
    }

    #[test]
    fn test_merge_variables_last_wins() {
        let mut other = Variables::new();
        other.insert("a".into(), Value::from(2));
        other.insert("b".into(), Value::from(3));

        let event = Event::of(())
            .with_variable("a", 1)
            .into_builder()
            .merge_variables(&other)
            .build();

        assert_eq!(event.variable("a"), Some(&Value::from(2)));
        assert_eq!(event.variable("b"), Some(&Value::from(3)));
    }

    #[test]
    fn test_restore_variable_removes_absent() {
        let event = Event::of(())
            .with_variable("counter", 3)
            .into_builder()
            .restore_variable("counter", None)
            .build();
        assert!(event.variable("counter").is_none());
    }
}
