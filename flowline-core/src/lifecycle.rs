//! # Lifecycle Capability
//!
//! Components that hold resources implement [`Lifecycle`]. Transitions must follow
//! `initialise -> start -> stop -> dispose`; [`LifecycleState`] enforces that order
//! and turns repeated calls into no-ops.

use crate::error::LifecycleError;
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LifecyclePhase {
    /// Constructed, not yet initialised.
    Created = 0,
    /// Initialised, not processing.
    Initialised = 1,
    /// Accepting events.
    Started = 2,
    /// No longer accepting events. Can be started again.
    Stopped = 3,
    /// Resources released. Terminal.
    Disposed = 4,
}

impl LifecyclePhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => LifecyclePhase::Initialised,
            2 => LifecyclePhase::Started,
            3 => LifecyclePhase::Stopped,
            4 => LifecyclePhase::Disposed,
            _ => LifecyclePhase::Created,
        }
    }
}

/// Lifecycle callbacks. All methods default to no-ops.
pub trait Lifecycle: Send + Sync {
    /// Prepare resources. Called once before `start`.
    fn initialise(&self) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// Begin accepting events.
    fn start(&self) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// Stop accepting events. In-flight events are not cancelled.
    fn stop(&self) -> Result<(), LifecycleError> {
        Ok(())
    }

    /// Release resources.
    fn dispose(&self) {}
}

/// Tracks the phase of a component.
#[derive(Debug)]
pub struct LifecycleState {
    name: String,
    phase: AtomicU8,
}

impl LifecycleState {
    /// Track a component named `name`, starting in [`LifecyclePhase::Created`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: AtomicU8::new(LifecyclePhase::Created as u8),
        }
    }

    pub fn phase(&self) -> LifecyclePhase {
        LifecyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_started(&self) -> bool {
        self.phase() == LifecyclePhase::Started
    }

    /// `Created -> Initialised`.
    ///
    /// Returns `Ok(true)` if the transition happened, `Ok(false)` if the component
    /// was already initialised.
    pub fn initialise(&self) -> Result<bool, LifecycleError> {
        self.transition("initialise", LifecyclePhase::Initialised, |phase| match phase {
            LifecyclePhase::Created => Step::Go,
            LifecyclePhase::Disposed => Step::Illegal,
            _ => Step::Skip,
        })
    }

    /// `Initialised | Stopped -> Started`.
    pub fn start(&self) -> Result<bool, LifecycleError> {
        self.transition("start", LifecyclePhase::Started, |phase| match phase {
            LifecyclePhase::Initialised | LifecyclePhase::Stopped => Step::Go,
            LifecyclePhase::Started => Step::Skip,
            LifecyclePhase::Created | LifecyclePhase::Disposed => Step::Illegal,
        })
    }

    /// `Started -> Stopped`. Stopping a component that is not started is a no-op.
    pub fn stop(&self) -> Result<bool, LifecycleError> {
        self.transition("stop", LifecyclePhase::Stopped, |phase| match phase {
            LifecyclePhase::Started => Step::Go,
            _ => Step::Skip,
        })
    }

    /// `* -> Disposed`.
    pub fn dispose(&self) -> Result<bool, LifecycleError> {
        self.transition("dispose", LifecyclePhase::Disposed, |phase| match phase {
            LifecyclePhase::Disposed => Step::Skip,
            _ => Step::Go,
        })
    }

    fn transition(
        &self,
        action: &'static str,
        to: LifecyclePhase,
        decide: impl Fn(LifecyclePhase) -> Step,
    ) -> Result<bool, LifecycleError> {
        let mut current = self.phase.load(Ordering::Acquire);
        loop {
            let phase = LifecyclePhase::from_u8(current);
            match decide(phase) {
                Step::Skip => return Ok(false),
                Step::Illegal => {
                    return Err(LifecycleError::IllegalPhase {
                        component: self.name.clone(),
                        action,
                        phase,
                    });
                }
                Step::Go => {}
            }
            match self.phase.compare_exchange(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!(component = %self.name, from = ?phase, to = ?to, "lifecycle transition");
                    return Ok(true);
                }
                Err(actual) => current = actual,
            }
        }
    }
}

enum Step {
    Go,
    Skip,
    Illegal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_cycle() {
        let state = LifecycleState::new("chain");
        assert_eq!(state.initialise(), Ok(true));
        assert_eq!(state.start(), Ok(true));
        assert!(state.is_started());
        assert_eq!(state.stop(), Ok(true));
        assert_eq!(state.start(), Ok(true));
        assert_eq!(state.stop(), Ok(true));
        assert_eq!(state.dispose(), Ok(true));
        assert_eq!(state.phase(), LifecyclePhase::Disposed);
    }

    #[test]
    fn test_repeated_calls_are_noops() {
        let state = LifecycleState::new("chain");
        assert_eq!(state.initialise(), Ok(true));
        assert_eq!(state.initialise(), Ok(false));
        assert_eq!(state.start(), Ok(true));
        assert_eq!(state.start(), Ok(false));
        assert_eq!(state.dispose(), Ok(true));
        assert_eq!(state.dispose(), Ok(false));
    }

    #[test]
    fn test_start_before_initialise_is_illegal() {
        let state = LifecycleState::new("chain");
        assert!(matches!(
            state.start(),
            Err(LifecycleError::IllegalPhase { action: "start", .. })
        ));
    }
}
