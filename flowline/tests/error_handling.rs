mod common;

use common::{FailOnPayload, loc};
use flowline::{
    Chain, ErrorType, Event, Interceptor, ProcessingError, Processor, Route, StepFn, StepFuture,
    StepInfo,
    error_handlers::{ErrorHandlerChain, ErrorTypeMatcher, OnErrorContinue, OnErrorPropagate},
    interceptors::TimeoutInterceptor,
    routers::ScatterGather,
    testing::{FailingProcessor, InvocationLog, SetPayloadProcessor, SleepingProcessor, SpyProcessor},
};
use std::time::Duration;

#[tokio::test]
async fn test_continue_recovers_chain_failure() {
    let log = InvocationLog::new();
    let chain = Chain::builder("flow")
        .processor(FailOnPayload::new("x"))
        .processor(SpyProcessor::new("after", &log))
        .error_handler(OnErrorContinue::new())
        .build();

    let out = chain.process(Event::of("x")).await.unwrap();
    assert_eq!(out.payload().as_str(), Some("x"));
    assert!(!out.has_error());
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_handler_chain_selects_by_error_type() {
    let handlers = || {
        ErrorHandlerChain::new()
            .on_error(OnErrorContinue::new().when(ErrorTypeMatcher::of(ErrorType::COMPOSITE_ROUTING)))
            .on_error(OnErrorPropagate::new())
    };

    let scatter = ScatterGather::builder(loc("sg"))
        .route(SetPayloadProcessor::new(1))
        .route(FailingProcessor::new("down"))
        .build()
        .unwrap();
    let recovered = Chain::builder("sg-flow")
        .processor(scatter)
        .error_handler(handlers())
        .build();
    assert!(recovered.process(Event::of("p")).await.is_ok());

    let failing = Chain::builder("plain-flow")
        .processor(FailingProcessor::new("plain"))
        .error_handler(handlers())
        .build();
    let err = failing.process(Event::of("p")).await.unwrap_err();
    assert_eq!(err.error_type(), Some(&ErrorType::UNKNOWN));
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_step_reaches_handler_as_timeout() {
    let chain = Chain::builder("timed")
        .processor(SleepingProcessor::new(Duration::from_secs(10)))
        .interceptor(TimeoutInterceptor::new(Duration::from_millis(100)))
        .error_handler(
            ErrorHandlerChain::new()
                .on_error(OnErrorContinue::new().when(ErrorTypeMatcher::of(ErrorType::TIMEOUT))),
        )
        .build();

    let out = chain.process(Event::of("slow")).await.unwrap();
    assert_eq!(out.payload().as_str(), Some("slow"));
}

#[tokio::test]
async fn test_failed_event_carries_error_record() {
    let chain = Chain::builder("flow").processor(FailingProcessor::new("boom")).build();
    let err = chain.process(Event::of(1)).await.unwrap_err();
    let record = err.event().and_then(Event::error).unwrap();
    assert_eq!(record.error_type, ErrorType::UNKNOWN);
    assert_eq!(record.description, "boom");
}

/// Rejects every event before the step runs.
struct Gate;

impl Interceptor for Gate {
    fn intercept(&self, _step: &StepInfo, _event: Event, _next: StepFn) -> StepFuture {
        Box::pin(async { Err(ProcessingError::msg("gate closed")) })
    }
}

#[tokio::test]
async fn test_interceptor_failure_reaches_handler_resolved() {
    let log = InvocationLog::new();
    let chain = Chain::builder("gated")
        .interceptor(Gate)
        .processor(SetPayloadProcessor::new("unreachable"))
        .error_handler(
            OnErrorContinue::new()
                .when(ErrorTypeMatcher::of(ErrorType::UNKNOWN))
                .processor(SpyProcessor::new("handler", &log).boxed()),
        )
        .build();

    let out = chain.process(Event::of("in")).await.unwrap();
    assert_eq!(out.payload().as_str(), Some("in"));

    let seen = log.events();
    let record = seen[0].error().unwrap();
    assert_eq!(record.error_type, ErrorType::UNKNOWN);
    assert_eq!(record.description, "gate closed");
    assert_eq!(
        record.failing_component.as_ref().map(|c| c.path()),
        Some("gated/processors/0")
    );
}

#[tokio::test]
async fn test_route_handler_receives_resolved_failure() {
    let log = InvocationLog::new();
    let route = Route::new("lookup", FailOnPayload::new("x").boxed()).with_error_handler(
        OnErrorContinue::new()
            .when(ErrorTypeMatcher::of(ErrorType::UNKNOWN))
            .processor(SpyProcessor::new("handler", &log).boxed()),
    );

    let out = route.execute(Event::of("x")).await.unwrap();
    assert_eq!(out.payload().as_str(), Some("x"));
    assert!(!out.has_error());

    let record = log.events()[0].error().cloned().unwrap();
    assert_eq!(record.error_type, ErrorType::UNKNOWN);
    assert_eq!(record.failing_component.map(|c| c.path().to_owned()), Some("lookup".into()));
}
