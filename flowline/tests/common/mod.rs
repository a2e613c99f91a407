#![allow(dead_code)]

use flowline::{ComponentLocation, Event, ProcessResult, ProcessingError, Processor, Value};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Test Processors
// ============================================================================

/// Fails events whose payload equals `trigger`, passing others through.
pub struct FailOnPayload {
    pub trigger: String,
    pub calls: Arc<AtomicUsize>,
}

impl FailOnPayload {
    pub fn new(trigger: &str) -> Self {
        Self {
            trigger: trigger.to_owned(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Processor for FailOnPayload {
    async fn process(&self, event: Event) -> ProcessResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if event.payload().as_str() == Some(self.trigger.as_str()) {
            Err(ProcessingError::msg(format!("rejected {}", self.trigger)))
        } else {
            Ok(event)
        }
    }
}

/// Never completes.
pub struct Hang;

impl Processor for Hang {
    async fn process(&self, _event: Event) -> ProcessResult {
        std::future::pending().await
    }
}

// ============================================================================
// Helpers
// ============================================================================

pub fn loc(name: &str) -> ComponentLocation {
    ComponentLocation::root(name)
}

pub fn payload_str(value: &Value) -> Option<&str> {
    match value {
        Value::Message(message) => message.payload.as_str(),
        other => other.as_str(),
    }
}
