//! Timeout interceptor for time-limited steps.

use flowline_core::{
    ErrorType, Event, FlowError, Interceptor, ProcessingError, StepFn, StepFuture, StepInfo,
};
use std::time::Duration;
use tokio::time::timeout;

/// Fails steps that run longer than a fixed duration with [`FlowError::Timeout`].
///
/// The late step is dropped, which cancels it unless it already moved to another
/// scheduler.
pub struct TimeoutInterceptor {
    duration: Duration,
    only_blocking: bool,
}

impl TimeoutInterceptor {
    /// Limit every step to `duration`.
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            only_blocking: false,
        }
    }

    /// Only limit steps whose processing type may block.
    pub fn only_blocking(mut self) -> Self {
        self.only_blocking = true;
        self
    }
}

impl Interceptor for TimeoutInterceptor {
    fn applies_to(&self, step: &StepInfo) -> bool {
        !self.only_blocking || step.processing_type.is_blocking()
    }

    fn intercept(&self, step: &StepInfo, event: Event, next: StepFn) -> StepFuture {
        let duration = self.duration;
        let location = step.location.clone();
        Box::pin(async move {
            let input = event.clone();
            match timeout(duration, next(event)).await {
                Ok(result) => result,
                Err(_) => Err(ProcessingError::new(FlowError::Timeout(duration))
                    .with_error_type(ErrorType::TIMEOUT)
                    .with_failing_component(location)
                    .with_event(input)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chain::Chain, testing::SleepingProcessor, tracing_spans::TracingSpanFactory};
    use flowline_core::{ProcessingType, Processor, processor_fn};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_slow_step_times_out() {
        let chain = Chain::builder("timed")
            .processor(SleepingProcessor::new(Duration::from_secs(5)))
            .interceptor(TimeoutInterceptor::new(Duration::from_millis(100)))
            .build();
        let err = chain.process(Event::of(1)).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.error_type(), Some(&ErrorType::TIMEOUT));
        assert_eq!(err.failing_component().map(|c| c.path()), Some("timed/processors/0"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_blocking_skips_cpu_lite_steps() {
        let slow_lite = processor_fn(|event: Event| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(event)
        });
        let slow_io = processor_fn(|event: Event| async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(event)
        })
        .with_processing_type(ProcessingType::IoRw);

        let interceptor = || TimeoutInterceptor::new(Duration::from_millis(10)).only_blocking();
        let lite = Chain::builder("lite").processor(slow_lite).interceptor(interceptor()).build();
        let io = Chain::builder("io").processor(slow_io).interceptor(interceptor()).build();

        assert!(lite.process(Event::of(1)).await.is_ok());
        assert!(io.process(Event::of(1)).await.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_steps_close_their_spans() {
        let spans = Arc::new(TracingSpanFactory::new());
        let chain = Chain::builder("timed")
            .processor(SleepingProcessor::new(Duration::from_secs(5)))
            .interceptor(TimeoutInterceptor::new(Duration::from_millis(10)))
            .span_factory(spans.clone())
            .build();

        for _ in 0..3 {
            let err = chain.process(Event::of(1)).await.unwrap_err();
            assert!(err.is_timeout());
            assert!(err.is_resolved());
        }
        assert_eq!(spans.open_spans(), 0);
    }
}
