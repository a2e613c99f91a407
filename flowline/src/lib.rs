//! # flowline - Integration-Runtime Message Processing
//!
//! `flowline` composes processors into chains and routes events through them:
//! sequentially, by rotation, by first success, by fan-out with a join, per
//! element of a split payload, or with retries.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use flowline::prelude::*;
//!
//! let chain = Chain::builder("orders")
//!     .processor(validate)
//!     .processor(
//!         ScatterGather::builder(ComponentLocation::root("enrich"))
//!             .route(lookup_customer)
//!             .route(lookup_stock)
//!             .build()?,
//!     )
//!     .error_handler(OnErrorContinue::new())
//!     .build();
//!
//! let out = chain.process(Event::of("order-1")).await?;
//! ```
//!
//! ## Crates
//!
//! - [`flowline_core`]: events, messages, errors and the capability traits
//! - [`flowline_std`]: chains, routes, routers, fork-join and their collaborators

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use flowline_core::{
    // Errors
    BoxError,
    // Collaborators
    BoxErrorHandler,
    BoxInterceptor,
    BoxProcessingStrategy,
    // Processor
    BoxProcessor,
    BoxScheduler,
    BoxSpanFactory,
    BoxSplitter,
    Capabilities,
    // Component
    Component,
    ComponentLocation,
    CompositeRoutingError,
    ConfigError,
    // Context
    ContextId,
    ContextState,
    DynErrorHandler,
    DynProcessor,
    ErrorHandler,
    ErrorMapping,
    ErrorRecord,
    ErrorType,
    ErrorTypeLocator,
    // Event
    Event,
    EventBuilder,
    EventContext,
    ExceptionContextProvider,
    FlowError,
    Interceptor,
    ItemSequenceInfo,
    Lifecycle,
    LifecycleError,
    LifecyclePhase,
    // Message
    Message,
    ProcessResult,
    ProcessingError,
    ProcessingStrategy,
    ProcessingType,
    Processor,
    RoutingResult,
    Scheduler,
    SpanFactory,
    SplittingStrategy,
    StepFn,
    StepFuture,
    StepInfo,
    StreamPayload,
    Value,
    Variables,
    processor_fn,
};

// Chains and routes
pub use flowline_std::{
    Chain, ChainBuilder,
    resolution::{ErrorResolver, error_from_record},
    route::Route,
};

/// Fork-join execution and aggregation policies.
pub mod forkjoin {
    pub use flowline_std::forkjoin::{
        Aggregation, CollectList, CollectMap, ForkJoinConfig, ForkJoinStrategy, JoinOnly,
        RoutingPair,
    };
}

/// Routers.
pub mod routers {
    pub use flowline_std::routers::{
        FirstSuccessful, Foreach, ForeachBuilder, ParallelForEach, ParallelForEachBuilder,
        RoundRobin, ScatterGather, ScatterGatherBuilder, UntilSuccessful, UntilSuccessfulBuilder,
    };
}

/// Standard error handlers.
pub mod error_handlers {
    pub use flowline_std::error_handlers::{
        ErrorHandlerChain, ErrorTypeMatcher, OnError, OnErrorContinue, OnErrorPropagate,
    };
}

/// Standard interceptors.
pub mod interceptors {
    pub use flowline_std::interceptors::{LoggingInterceptor, TimeoutInterceptor};
}

/// Splitting strategies.
pub mod splitters {
    pub use flowline_std::splitters::{EntrySetSplitter, PayloadSplitter, VariableSplitter};
}

/// Schedulers and processing strategies.
pub mod scheduling {
    pub use flowline_std::scheduling::{
        DirectProcessingStrategy, TokioScheduler, WorkerPoolProcessingStrategy,
    };
}

/// Runtime configuration and logging setup.
pub mod runtime {
    pub use flowline_std::{
        config::{
            FeatureFlags, ForeachSettings, ForkJoinSettings, RuntimeConfig,
            UntilSuccessfulSettings,
        },
        logging::{LOG_ENV, init_logging},
    };
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use flowline_std::testing::*;
}

/// Tower integration.
#[cfg(feature = "tower")]
pub mod tower {
    pub use flowline_std::tower::{LayeredProcessor, ProcessorService, ServiceProcessor};
}

/// Prelude module - common imports for Flowline.
///
/// # Usage
///
/// ```rust,ignore
/// use flowline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Chain, ChainBuilder, ComponentLocation, ErrorHandler, ErrorType, Event, EventContext,
        FlowError, Lifecycle, Message, ProcessResult, ProcessingError, Processor, Route, Value,
        error_handlers::{OnErrorContinue, OnErrorPropagate},
        routers::{
            FirstSuccessful, Foreach, ParallelForEach, RoundRobin, ScatterGather, UntilSuccessful,
        },
    };
    pub use flowline_std::stream::ProcessorExt;
}
