//! # flowline-std
//!
//! Standard implementations for the Flowline message-processing engine.
//!
//! This crate provides:
//! - **Chains**: [`Chain`], [`ChainBuilder`]
//! - **Routes and routers**: [`route::Route`], round robin, first successful,
//!   scatter-gather, parallel foreach, foreach and until successful
//! - **Fork-join**: [`forkjoin::ForkJoinStrategy`] with pluggable aggregation
//! - **Error handling**: [`resolution::ErrorResolver`], on-error-continue and
//!   on-error-propagate handlers
//! - **Scheduling**: tokio-backed schedulers and processing strategies
//! - **Ambient**: environment configuration, logging setup, tracing spans
//! - **Testing**: Spies and controlled failures in [`testing`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use flowline_core;

// Modules
pub mod chain;
pub mod config;
pub mod error_handlers;
pub mod expr;
pub mod forkjoin;
pub mod interceptors;
pub mod logging;
pub mod resolution;
pub mod route;
pub mod routers;
pub mod scheduling;
pub mod splitters;
pub mod stream;
pub mod testing;
pub mod tracing_spans;

#[cfg(feature = "tower")]
pub mod tower;

pub use chain::{Chain, ChainBuilder};
