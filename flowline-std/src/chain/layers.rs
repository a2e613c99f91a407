//! Composition of one chain step.
//!
//! Each step is built once, when the chain is built, into a single [`StepFn`].
//! Layers from the outside in:
//!
//! 1. context propagation: a `tracing` span carrying the processor path
//! 2. failure resolution for everything below, so failures raised by the
//!    strategy or an interceptor reach the error handler resolved
//! 3. the processing strategy, which may move the step to another scheduler
//! 4. user interceptors, first configured is outermost
//! 5. span factory start before, end after (also when the step is dropped)
//! 6. the processor itself, with failures resolved against its component, or
//!    against the step's location when the processor is not a component

use crate::{
    resolution::{ErrorResolver, LocatedAt},
    tracing_spans::OpenSpan,
};
use flowline_core::{
    BoxInterceptor, BoxProcessingStrategy, BoxProcessor, BoxSpanFactory, Event, StepFn,
    StepFuture, StepInfo,
};
use std::sync::Arc;
use tracing::Instrument;

/// Everything a step needs besides its processor.
pub(crate) struct StepLayers {
    pub(crate) chain_name: Arc<str>,
    pub(crate) resolver: ErrorResolver,
    pub(crate) strategy: Option<BoxProcessingStrategy>,
    pub(crate) interceptors: Vec<BoxInterceptor>,
    pub(crate) span_factory: BoxSpanFactory,
}

/// Compose `processor` and all layers into one step function.
pub(crate) fn compose(processor: BoxProcessor, info: StepInfo, layers: &StepLayers) -> StepFn {
    let resolver = &layers.resolver;
    let step = resolving(&processor, &info, resolver.clone(), invoke(processor.clone()));
    let step = observed(step, info.clone(), layers.span_factory.clone());
    let step = intercepted(step, &info, &layers.interceptors);
    let step = scheduled(step, &info, layers.strategy.clone());
    let step = resolving(&processor, &info, resolver.clone(), step);
    propagating(step, info, layers.chain_name.clone())
}

fn invoke(processor: BoxProcessor) -> StepFn {
    Arc::new(move |event: Event| -> StepFuture {
        let processor = processor.clone();
        Box::pin(async move { processor.process_dyn(event).await })
    })
}

// Resolution is idempotent, so the outer layer leaves failures the inner one
// already resolved untouched.
fn resolving(
    processor: &BoxProcessor,
    info: &StepInfo,
    resolver: ErrorResolver,
    next: StepFn,
) -> StepFn {
    let processor = processor.clone();
    let location = Arc::new(info.location.clone());
    Arc::new(move |event: Event| -> StepFuture {
        let next = next.clone();
        let processor = processor.clone();
        let resolver = resolver.clone();
        let location = location.clone();
        Box::pin(async move {
            let input = event.clone();
            match next(event).await {
                Ok(output) => Ok(output),
                Err(error) => {
                    let fallback = LocatedAt(&location);
                    let component = processor.as_component().unwrap_or(&fallback);
                    Err(resolver.resolve(Some(component), &input, error))
                }
            }
        })
    })
}

fn observed(next: StepFn, info: StepInfo, span_factory: BoxSpanFactory) -> StepFn {
    let name: Arc<str> = Arc::from(info.location.path());
    Arc::new(move |event: Event| -> StepFuture {
        let next = next.clone();
        let span_factory = span_factory.clone();
        let name = name.clone();
        Box::pin(async move {
            let span = OpenSpan::start(span_factory, &event, &name);
            let result = next(event).await;
            if let Err(error) = &result {
                span.record_error(error);
            }
            result
        })
    })
}

fn intercepted(step: StepFn, info: &StepInfo, interceptors: &[BoxInterceptor]) -> StepFn {
    interceptors
        .iter()
        .rev()
        .filter(|interceptor| interceptor.applies_to(info))
        .fold(step, |next, interceptor| -> StepFn {
            let interceptor = interceptor.clone();
            let info = info.clone();
            Arc::new(move |event: Event| -> StepFuture {
                interceptor.intercept(&info, event, next.clone())
            })
        })
}

fn scheduled(next: StepFn, info: &StepInfo, strategy: Option<BoxProcessingStrategy>) -> StepFn {
    let Some(strategy) = strategy else {
        return next;
    };
    let processing_type = info.processing_type;
    Arc::new(move |event: Event| -> StepFuture {
        strategy.on_processor(processing_type, next(event))
    })
}

fn propagating(next: StepFn, info: StepInfo, chain_name: Arc<str>) -> StepFn {
    let path: Arc<str> = Arc::from(info.location.path());
    Arc::new(move |event: Event| -> StepFuture {
        let span = tracing::debug_span!(
            "flowline.step",
            chain = %chain_name,
            processor = %path,
            context = %event.context().id(),
        );
        Box::pin(next(event).instrument(span))
    })
}
