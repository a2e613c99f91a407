//! Round-robin router.

use super::{RouterCore, router_component};
use crate::route::{Route, routes_under};
use flowline_core::{
    BoxProcessor, Component, ComponentLocation, Event, Lifecycle, ProcessResult, Processor,
};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sends each event to the next route in rotation.
///
/// Selection is `0, 1, .., n-1, 0, 1, ..` across all callers. Concurrent callers
/// each get a distinct slot of the rotation, in no particular order.
pub struct RoundRobin {
    core: RouterCore,
    cursor: AtomicUsize,
}

impl RoundRobin {
    /// Rotate over `processors`, each wrapped in a route under `location`.
    pub fn new(
        location: ComponentLocation,
        processors: impl IntoIterator<Item = BoxProcessor>,
    ) -> Self {
        let routes = routes_under(&location, processors);
        Self::from_routes(location, routes)
    }

    /// Rotate over pre-built routes.
    pub fn from_routes(location: ComponentLocation, routes: Vec<Route>) -> Self {
        Self {
            core: RouterCore::new(location, routes),
            cursor: AtomicUsize::new(0),
        }
    }

    /// The routes, in rotation order.
    pub fn routes(&self) -> &[Route] {
        &self.core.routes
    }

    /// Claim the next slot of the rotation.
    fn next_route(&self) -> Option<&Route> {
        let len = self.core.routes.len();
        if len == 0 {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % len;
        self.core.routes.get(index)
    }

    /// Execute `event` on the next route.
    pub async fn route(&self, event: Event) -> ProcessResult {
        let Some(route) = self.next_route() else {
            return Err(self.core.could_not_route(self, &event));
        };
        tracing::trace!(
            router = %self.core.location,
            route = route.id(),
            "round-robin selected route"
        );
        route.execute(event).await
    }

    /// Wait until every execution started by this router has finished.
    pub async fn drain(&self) {
        for route in &self.core.routes {
            route.await_idle().await;
        }
    }
}

impl Processor for RoundRobin {
    async fn process(&self, event: Event) -> ProcessResult {
        self.route(event).await
    }

    fn component(&self) -> Option<&dyn Component> {
        Some(self)
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(self)
    }
}

router_component!(RoundRobin);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InvocationLog, SleepingProcessor, SpyProcessor};
    use flowline_core::{ErrorType, FlowError};
    use std::{sync::Arc, time::Duration};

    fn spies(log: &InvocationLog, n: usize) -> Vec<BoxProcessor> {
        (0..n)
            .map(|i| SpyProcessor::new(format!("r{i}"), log).boxed())
            .collect()
    }

    #[tokio::test]
    async fn test_rotates_in_order() {
        let log = InvocationLog::new();
        let router = RoundRobin::new(ComponentLocation::root("rr"), spies(&log, 3));
        for _ in 0..7 {
            router.route(Event::of(())).await.unwrap();
        }
        assert_eq!(log.names(), vec!["r0", "r1", "r2", "r0", "r1", "r2", "r0"]);
    }

    #[tokio::test]
    async fn test_no_routes_could_not_route() {
        let router = RoundRobin::new(ComponentLocation::root("rr"), Vec::new());
        let err = router.route(Event::of("x")).await.unwrap_err();
        assert!(matches!(err.cause(), FlowError::CouldNotRoute(_)));
        assert_eq!(err.error_type(), Some(&ErrorType::ROUTING));
        assert_eq!(err.failing_component().map(|c| c.path()), Some("rr"));
        assert_eq!(err.event().unwrap().payload().as_str(), Some("x"));
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_rotation() {
        let log = InvocationLog::new();
        let router = Arc::new(RoundRobin::new(ComponentLocation::root("rr"), spies(&log, 2)));
        let calls: Vec<_> = (0..10)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move { router.route(Event::of(())).await })
            })
            .collect();
        for call in calls {
            call.await.unwrap().unwrap();
        }
        let names = log.names();
        assert_eq!(names.iter().filter(|n| *n == "r0").count(), 5);
        assert_eq!(names.iter().filter(|n| *n == "r1").count(), 5);
    }

    #[tokio::test]
    async fn test_drain_waits_for_running_routes() {
        let router = Arc::new(RoundRobin::new(
            ComponentLocation::root("rr"),
            vec![SleepingProcessor::new(Duration::from_millis(30)).boxed()],
        ));
        let running = {
            let router = router.clone();
            tokio::spawn(async move { router.route(Event::of(())).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        router.drain().await;
        assert_eq!(router.routes()[0].in_flight(), 0);
        assert!(running.await.unwrap().is_ok());
    }
}
