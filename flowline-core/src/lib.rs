//! # flowline-core
//!
//! Core traits and data model for the Flowline message-processing engine.
//!
//! This crate has minimal dependencies and is designed to be imported by processor
//! implementations and extensions that don't need the full `flowline-std` runtime.
//!
//! # Data Model
//!
//! - [`Event`] - The unit of work: a [`Message`], flow variables and an owning
//!   [`EventContext`]
//! - [`Value`] - Dynamically typed payloads and variables
//! - [`EventContext`] - Completion/error context, derived per fan-out branch
//!
//! # Capabilities
//!
//! ## [`Processor`]
//!
//! The atomic capability: receive an event, return a new event or a failure.
//! Chains and routers are processors too, so they nest freely. Use
//! [`DynProcessor`] / [`BoxProcessor`] for heterogeneous collections.
//!
//! ## [`Component`] and [`Lifecycle`]
//!
//! Optional capabilities a processor exposes through explicit queries
//! ([`Processor::component`], [`Processor::lifecycle`]). Chains resolve them once,
//! at composition time.
//!
//! ## Collaborators
//!
//! - [`ErrorHandler`] - Recovery point of a chain
//! - [`Scheduler`] / [`ProcessingStrategy`] - Where steps and timers run
//! - [`SpanFactory`] - Optional per-step observability
//! - [`SplittingStrategy`] - How foreach routers split an event
//! - [`Interceptor`] - Around-advice for chain steps
//! - [`ErrorTypeLocator`] / [`ExceptionContextProvider`] - Error resolution inputs
//!
//! # Error Types
//!
//! - [`ProcessingError`] - A failure with the failed event, error type and location
//! - [`FlowError`] - Causes raised by the routing core
//! - [`CompositeRoutingError`] - All branch failures of a delay-errors fork-join
//! - [`ConfigError`] / [`LifecycleError`] - Configuration and lifecycle failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod component;
mod context;
mod error;
mod event;
mod handler;
mod interceptor;
mod lifecycle;
mod locator;
mod message;
mod processor;
mod scheduler;
mod splitter;
mod tracer;

// Re-exports
pub use component::{Component, ComponentLocation, ErrorMapping};
pub use context::{ContextId, ContextState, EventContext};
pub use error::{
    BoxError, CompositeRoutingError, ConfigError, ErrorRecord, ErrorType, FlowError,
    LifecycleError, ProcessingError, RoutingResult, SharedError,
};
pub use event::{Event, EventBuilder, Variables};
pub use handler::{BoxErrorHandler, DynErrorHandler, ErrorHandler};
pub use interceptor::{BoxInterceptor, Interceptor, StepInfo};
pub use lifecycle::{Lifecycle, LifecyclePhase, LifecycleState};
pub use locator::{
    BoxContextProvider, BoxErrorTypeLocator, DefaultErrorTypeLocator, ErrorTypeLocator,
    ExceptionContextProvider,
};
pub use message::{ItemSequenceInfo, Message, StreamPayload, Value};
pub use processor::{
    BoxProcessor, Capabilities, DynProcessor, FnProcessor, ProcessFuture, ProcessResult,
    ProcessingType, Processor, StepFn, StepFuture, processor_fn,
};
pub use scheduler::{BoxProcessingStrategy, BoxScheduler, ProcessingStrategy, Scheduler, Task};
pub use splitter::{BoxSplitter, SplitIter, SplittingStrategy};
pub use tracer::{BoxSpanFactory, NoopSpanFactory, SpanFactory, SpanHandle};
