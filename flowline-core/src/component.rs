//! # Component Capability
//!
//! A processor that is also a [`Component`] has an identity in the flow (its
//! [`ComponentLocation`]) and may take part in error resolution: failures raised by
//! it are tagged with its location, remapped through its [`ErrorMapping`]s and
//! finally passed through [`Component::resolve_error`].
//!
//! Processors expose this capability through
//! [`Processor::component`](crate::Processor::component). The query is answered once,
//! when a chain is composed.

use crate::error::{ErrorType, ProcessingError};
use std::fmt;

/// Position of a component within a flow, e.g. `orders/processors/2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentLocation {
    name: String,
    path: String,
}

impl ComponentLocation {
    /// A top-level location.
    pub fn root(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
        }
    }

    /// A location nested under this one.
    pub fn child(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: format!("{}/{}", self.path, name),
            name,
        }
    }

    /// The last path segment.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The full slash-separated path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ComponentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Remaps an error type raised by a component to another type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMapping {
    /// Types selected by this mapping ([`ErrorType::ANY`] selects all).
    pub source: ErrorType,
    /// Type reported instead.
    pub target: ErrorType,
}

impl ErrorMapping {
    /// Map `source` to `target`.
    pub fn new(source: ErrorType, target: ErrorType) -> Self {
        Self { source, target }
    }
}

/// A processor with an identity in the flow.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Component`",
    label = "missing `Component` implementation",
    note = "Components must at least provide their `location`."
)]
pub trait Component: Send + Sync {
    /// Where this component sits in the flow.
    fn location(&self) -> &ComponentLocation;

    /// Error type remappings, applied in order; the first match wins.
    fn error_mappings(&self) -> &[ErrorMapping] {
        &[]
    }

    /// Component specific resolution, called after the generic resolution.
    fn resolve_error(&self, error: ProcessingError) -> ProcessingError {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_paths() {
        let flow = ComponentLocation::root("orders");
        let step = flow.child("processors").child("2");
        assert_eq!(step.path(), "orders/processors/2");
        assert_eq!(step.name(), "2");
        assert_eq!(step.to_string(), "orders/processors/2");
    }
}
