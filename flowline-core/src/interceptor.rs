//! # Interceptors
//!
//! Around-advice applied to every step of a chain. Interceptors are composed with
//! the step into a single [`StepFn`] when the chain is built, so no interceptor list
//! is walked per event.

use crate::{
    component::ComponentLocation,
    event::Event,
    processor::{ProcessingType, StepFn, StepFuture},
};
use std::sync::Arc;

/// Static description of the step an interceptor wraps.
#[derive(Debug, Clone)]
pub struct StepInfo {
    /// Processor path of the step within its chain.
    pub location: ComponentLocation,
    /// Declared processing type of the step's processor.
    pub processing_type: ProcessingType,
}

/// Around-advice for chain steps.
pub trait Interceptor: Send + Sync + 'static {
    /// Whether this interceptor wraps the given step.
    fn applies_to(&self, _step: &StepInfo) -> bool {
        true
    }

    /// Run `next` for `event`, possibly altering the event, the result, or both.
    fn intercept(&self, step: &StepInfo, event: Event, next: StepFn) -> StepFuture;
}

/// Shared, type-erased interceptor.
pub type BoxInterceptor = Arc<dyn Interceptor>;
