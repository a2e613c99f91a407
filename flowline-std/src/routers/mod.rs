//! # Routers
//!
//! Processors that route an event to one or more nested routes.
//!
//! | router                | routes | execution                                          |
//! |-----------------------|--------|----------------------------------------------------|
//! | [`RoundRobin`]        | many   | one route per event, rotating                      |
//! | [`FirstSuccessful`]   | many   | in order until one succeeds                        |
//! | [`ScatterGather`]     | many   | all routes in parallel, results keyed by index     |
//! | [`ParallelForEach`]   | one    | one branch per split element, in parallel          |
//! | [`Foreach`]           | one    | one iteration per split element or batch, in order |
//! | [`UntilSuccessful`]   | one    | retried with a delay until it succeeds             |
//!
//! Every router is a [`Component`](flowline_core::Component) located under its own
//! path, with its routes at `<router>/routes/<index>` (or `<router>/route` for single
//! route routers), and cascades [`Lifecycle`](flowline_core::Lifecycle) calls to its
//! routes.

mod first_successful;
mod foreach;
mod parallel_foreach;
mod round_robin;
mod scatter_gather;
mod until_successful;

pub use first_successful::FirstSuccessful;
pub use foreach::{
    DEFAULT_COUNTER_VARIABLE, DEFAULT_ROOT_MESSAGE_VARIABLE, Foreach, ForeachBuilder,
};
pub use parallel_foreach::{ParallelForEach, ParallelForEachBuilder};
pub use round_robin::RoundRobin;
pub use scatter_gather::{ScatterGather, ScatterGatherBuilder};
pub use until_successful::{
    DEFAULT_MAX_RETRIES, DEFAULT_MILLIS_BETWEEN_RETRIES, UntilSuccessful, UntilSuccessfulBuilder,
};

use crate::{resolution::ErrorResolver, route::Route};
use flowline_core::{
    Component, ComponentLocation, Event, FlowError, Lifecycle, LifecycleError, LifecycleState,
    ProcessingError,
};

/// State shared by every router.
pub(crate) struct RouterCore {
    pub(crate) location: ComponentLocation,
    pub(crate) routes: Vec<Route>,
    pub(crate) lifecycle: LifecycleState,
    pub(crate) resolver: ErrorResolver,
}

impl RouterCore {
    pub(crate) fn new(location: ComponentLocation, routes: Vec<Route>) -> Self {
        Self {
            lifecycle: LifecycleState::new(location.path()),
            location,
            routes,
            resolver: ErrorResolver::default(),
        }
    }

    /// Resolve a failure raised by the router itself.
    pub(crate) fn fail(
        &self,
        router: &dyn Component,
        event: &Event,
        cause: impl Into<ProcessingError>,
    ) -> ProcessingError {
        self.resolver.resolve(Some(router), event, cause.into())
    }

    pub(crate) fn could_not_route(&self, router: &dyn Component, event: &Event) -> ProcessingError {
        self.fail(
            router,
            event,
            FlowError::CouldNotRoute(format!("no route available in {}", self.location)),
        )
    }

    pub(crate) fn initialise(&self) -> Result<(), LifecycleError> {
        if self.lifecycle.initialise()? {
            self.routes.iter().try_for_each(|route| route.initialise())?;
        }
        Ok(())
    }

    pub(crate) fn start(&self) -> Result<(), LifecycleError> {
        if self.lifecycle.start()? {
            self.routes.iter().try_for_each(|route| route.start())?;
        }
        Ok(())
    }

    pub(crate) fn stop(&self) -> Result<(), LifecycleError> {
        if self.lifecycle.stop()? {
            self.routes.iter().try_for_each(|route| route.stop())?;
        }
        Ok(())
    }

    pub(crate) fn dispose(&self) {
        if let Ok(true) = self.lifecycle.dispose() {
            self.routes.iter().for_each(|route| route.dispose());
        }
    }
}

/// Implement `Component` and `Lifecycle` for a router holding a `core: RouterCore`.
macro_rules! router_component {
    ($router:ty) => {
        impl flowline_core::Component for $router {
            fn location(&self) -> &flowline_core::ComponentLocation {
                &self.core.location
            }
        }

        impl flowline_core::Lifecycle for $router {
            fn initialise(&self) -> Result<(), flowline_core::LifecycleError> {
                self.core.initialise()
            }

            fn start(&self) -> Result<(), flowline_core::LifecycleError> {
                self.core.start()
            }

            fn stop(&self) -> Result<(), flowline_core::LifecycleError> {
                self.core.stop()
            }

            fn dispose(&self) {
                self.core.dispose()
            }
        }

        impl std::fmt::Debug for $router {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($router))
                    .field("location", &self.core.location)
                    .field("routes", &self.core.routes.len())
                    .finish()
            }
        }
    };
}

pub(crate) use router_component;
