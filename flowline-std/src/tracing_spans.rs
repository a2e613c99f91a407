//! Span factory backed by `tracing`.
//!
//! Open spans live in an arena of nodes addressed by [`SpanHandle`]. Each node
//! stores the handle of its parent, and each event context keeps a stack of the
//! handles it opened, so parent lookup never needs a back-pointer. A branch
//! context with no open span of its own inherits the current span of its parent
//! context.

use flowline_core::{
    BoxSpanFactory, ContextId, Event, ProcessingError, SpanFactory, SpanHandle,
};
use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

struct SpanNode {
    name: String,
    parent: Option<SpanHandle>,
    span: tracing::Span,
    errored: bool,
}

#[derive(Default)]
struct Arena {
    next: u64,
    nodes: HashMap<SpanHandle, SpanNode>,
    stacks: HashMap<ContextId, Vec<SpanHandle>>,
}

impl Arena {
    fn current(&self, event: &Event) -> Option<SpanHandle> {
        let ctx = event.context();
        self.stacks
            .get(&ctx.id())
            .and_then(|stack| stack.last().copied())
            .or_else(|| {
                ctx.parent_id()
                    .and_then(|parent| self.stacks.get(&parent))
                    .and_then(|stack| stack.last().copied())
            })
    }
}

/// A [`SpanFactory`] emitting `tracing` spans.
#[derive(Default)]
pub struct TracingSpanFactory {
    arena: Mutex<Arena>,
}

impl TracingSpanFactory {
    /// Create an empty factory.
    pub fn new() -> Self {
        Self::default()
    }

    fn arena(&self) -> MutexGuard<'_, Arena> {
        self.arena.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of spans currently open.
    pub fn open_spans(&self) -> usize {
        self.arena().nodes.len()
    }

    /// Names from the root span down to `handle`.
    pub fn span_path(&self, handle: SpanHandle) -> Vec<String> {
        let arena = self.arena();
        let mut path = Vec::new();
        let mut cursor = Some(handle);
        while let Some(current) = cursor {
            match arena.nodes.get(&current) {
                Some(node) => {
                    path.push(node.name.clone());
                    cursor = node.parent;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    /// Whether an error was recorded on the span.
    pub fn is_errored(&self, handle: SpanHandle) -> bool {
        self.arena()
            .nodes
            .get(&handle)
            .is_some_and(|node| node.errored)
    }

    /// The current span of the event's context.
    pub fn current_span(&self, event: &Event) -> Option<SpanHandle> {
        self.arena().current(event)
    }
}

impl SpanFactory for TracingSpanFactory {
    fn start_span(&self, event: &Event, name: &str) -> Option<SpanHandle> {
        let mut arena = self.arena();
        let parent = arena.current(event);
        let span = match parent.and_then(|handle| arena.nodes.get(&handle)) {
            Some(node) => tracing::info_span!(parent: &node.span, "flowline.span", name = %name),
            None => tracing::info_span!("flowline.span", name = %name),
        };

        let handle = SpanHandle::from_raw(arena.next);
        arena.next += 1;
        arena.nodes.insert(
            handle,
            SpanNode {
                name: name.to_owned(),
                parent,
                span,
                errored: false,
            },
        );
        arena
            .stacks
            .entry(event.context().id())
            .or_default()
            .push(handle);
        Some(handle)
    }

    fn end_current_span(&self, event: &Event) {
        let mut arena = self.arena();
        let id = event.context().id();
        let Some(stack) = arena.stacks.get_mut(&id) else {
            return;
        };
        let handle = stack.pop();
        if stack.is_empty() {
            arena.stacks.remove(&id);
        }
        if let Some(handle) = handle {
            arena.nodes.remove(&handle);
        }
    }

    fn record_error_at_current_span(&self, event: &Event, error: &ProcessingError, propagate: bool) {
        let mut arena = self.arena();
        let mut cursor = arena.current(event);
        while let Some(handle) = cursor {
            let Some(node) = arena.nodes.get_mut(&handle) else {
                break;
            };
            node.errored = true;
            tracing::error!(parent: &node.span, error = %error, "span recorded error");
            cursor = if propagate { node.parent } else { None };
        }
    }
}

/// A span opened on a factory, ended when dropped.
///
/// A step dropped before it finishes, by a timeout or a fail-fast join, still
/// ends its span.
pub(crate) struct OpenSpan {
    factory: BoxSpanFactory,
    event: Event,
}

impl OpenSpan {
    pub(crate) fn start(factory: BoxSpanFactory, event: &Event, name: &str) -> Self {
        factory.start_span(event, name);
        Self {
            factory,
            event: event.clone(),
        }
    }

    pub(crate) fn record_error(&self, error: &ProcessingError) {
        self.factory
            .record_error_at_current_span(&self.event, error, false);
    }
}

impl Drop for OpenSpan {
    fn drop(&mut self) {
        self.factory.end_current_span(&self.event);
    }
}
