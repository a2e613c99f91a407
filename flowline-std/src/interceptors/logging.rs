//! Logging interceptor for step observation.

use flowline_core::{Event, Interceptor, StepFn, StepFuture, StepInfo};
use tracing::Level;

/// Logs every step's input and outcome.
pub struct LoggingInterceptor {
    level: Level,
}

impl LoggingInterceptor {
    /// Log at `DEBUG`.
    pub fn new() -> Self {
        Self {
            level: Level::DEBUG,
        }
    }

    /// Log at `INFO`.
    pub fn info() -> Self {
        Self { level: Level::INFO }
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for LoggingInterceptor {
    fn intercept(&self, step: &StepInfo, event: Event, next: StepFn) -> StepFuture {
        let level = self.level;
        let processor = step.location.clone();
        Box::pin(async move {
            let context = event.context().id();
            let payload = event.payload().kind();
            if level == Level::INFO {
                tracing::info!(%processor, %context, payload, "processing event");
            } else {
                tracing::debug!(%processor, %context, payload, "processing event");
            }

            let result = next(event).await;
            match &result {
                Ok(_) => tracing::debug!(%processor, %context, "step completed"),
                Err(error) => tracing::debug!(
                    %processor,
                    %context,
                    error_type = ?error.error_type(),
                    error = %error,
                    "step failed"
                ),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::Chain,
        testing::{FailingProcessor, SetPayloadProcessor},
    };
    use flowline_core::Processor;

    #[tokio::test]
    async fn test_is_transparent() {
        let chain = Chain::builder("logged")
            .processor(SetPayloadProcessor::new("x"))
            .interceptor(LoggingInterceptor::info())
            .build();
        let out = chain.process(Event::of(1)).await.unwrap();
        assert_eq!(out.payload().as_str(), Some("x"));

        let failing = Chain::builder("logged")
            .processor(FailingProcessor::new("nope"))
            .interceptor(LoggingInterceptor::new())
            .build();
        assert_eq!(failing.process(Event::of(1)).await.unwrap_err().message(), "nope");
    }
}
