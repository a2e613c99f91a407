//! # Event Context
//!
//! Every [`Event`](crate::Event) is owned by exactly one [`EventContext`]. Contexts
//! form a tree: fan-out routers derive one child context per branch, and each child
//! must be completed or errored exactly once.
//!
//! The completion state machine is `Pending -> Completed | Errored`. Only the first
//! transition wins; later attempts return `false` and are logged.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};
use uuid::Uuid;

/// Opaque identifier of an event context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of an event context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContextState {
    /// Still processing.
    Pending = 0,
    /// Completed successfully.
    Completed = 1,
    /// Terminated with an error.
    Errored = 2,
}

impl ContextState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ContextState::Completed,
            2 => ContextState::Errored,
            _ => ContextState::Pending,
        }
    }
}

struct ContextInner {
    id: ContextId,
    root: ContextId,
    parent: Option<ContextId>,
    depth: usize,
    state: AtomicU8,
    transaction_active: bool,
}

/// Completion/error context shared by an event and all its derived copies.
///
/// Cloning is cheap and yields a handle to the same context.
#[derive(Clone)]
pub struct EventContext {
    inner: Arc<ContextInner>,
}

impl EventContext {
    /// Create a new root context.
    pub fn new() -> Self {
        Self::root(false)
    }

    /// Create a root context that runs within an active transaction.
    pub fn transactional() -> Self {
        Self::root(true)
    }

    fn root(transaction_active: bool) -> Self {
        let id = ContextId::generate();
        Self {
            inner: Arc::new(ContextInner {
                id,
                root: id,
                parent: None,
                depth: 0,
                state: AtomicU8::new(ContextState::Pending as u8),
                transaction_active,
            }),
        }
    }

    /// Derive a child context for a fan-out branch.
    ///
    /// The child inherits the root id and the transaction marker.
    pub fn child(&self) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::generate(),
                root: self.inner.root,
                parent: Some(self.inner.id),
                depth: self.inner.depth + 1,
                state: AtomicU8::new(ContextState::Pending as u8),
                transaction_active: self.inner.transaction_active,
            }),
        }
    }

    /// This context's id.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Id of the root of this context tree.
    pub fn root_id(&self) -> ContextId {
        self.inner.root
    }

    /// Id of the parent context, if this is a child.
    pub fn parent_id(&self) -> Option<ContextId> {
        self.inner.parent
    }

    /// Nesting depth; root contexts are at depth 0.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Whether processing happens within an active transaction.
    pub fn is_transaction_active(&self) -> bool {
        self.inner.transaction_active
    }

    /// Current completion state.
    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    /// Whether the context was completed or errored.
    pub fn is_terminated(&self) -> bool {
        self.state() != ContextState::Pending
    }

    /// Mark the context completed. Returns `false` if it was already terminated.
    pub fn complete(&self) -> bool {
        self.transition(ContextState::Completed)
    }

    /// Mark the context errored. Returns `false` if it was already terminated.
    pub fn error(&self) -> bool {
        self.transition(ContextState::Errored)
    }

    fn transition(&self, to: ContextState) -> bool {
        match self.inner.state.compare_exchange(
            ContextState::Pending as u8,
            to as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => {
                tracing::warn!(
                    context = %self.inner.id,
                    current = ?ContextState::from_u8(current),
                    attempted = ?to,
                    "event context already terminated"
                );
                false
            }
        }
    }

    /// Whether both handles refer to the same context.
    pub fn same_as(&self, other: &EventContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent)
            .field("depth", &self.inner.depth)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_links_to_parent_and_root() {
        let root = EventContext::new();
        let child = root.child();
        let grandchild = child.child();

        assert_eq!(child.parent_id(), Some(root.id()));
        assert_eq!(grandchild.root_id(), root.id());
        assert_eq!(grandchild.depth(), 2);
    }

    #[test]
    fn test_terminates_only_once() {
        let ctx = EventContext::new();
        assert!(ctx.complete());
        assert!(!ctx.error());
        assert!(!ctx.complete());
        assert_eq!(ctx.state(), ContextState::Completed);
    }

    #[test]
    fn test_transaction_marker_is_inherited() {
        let ctx = EventContext::transactional();
        assert!(ctx.child().is_transaction_active());
        assert!(!EventContext::new().is_transaction_active());
    }
}
