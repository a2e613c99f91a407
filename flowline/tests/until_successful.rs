mod common;

use common::loc;
use flowline::{
    ErrorType, Event, FlowError, Processor,
    routers::UntilSuccessful,
    runtime::RuntimeConfig,
    testing::FailNTimesProcessor,
};

#[tokio::test(start_paused = true)]
async fn test_always_failing_stops_after_max_retries() {
    for max_retries in 1..=4usize {
        let flaky = FailNTimesProcessor::new(usize::MAX);
        let router = UntilSuccessful::builder(loc("us"), flaky.clone())
            .max_retries(max_retries.to_string())
            .millis_between_retries("10")
            .build()
            .unwrap();

        let err = router.process(Event::of(1)).await.unwrap_err();
        assert_eq!(flaky.attempts(), max_retries);
        assert_eq!(err.error_type(), Some(&ErrorType::RETRY_EXHAUSTED));
        match err.cause() {
            FlowError::RetryExhausted { attempts, last } => {
                assert_eq!(*attempts, max_retries);
                assert_eq!(last.message(), format!("attempt {max_retries} failed"));
            }
            other => panic!("unexpected cause: {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_on_attempt_j_makes_j_attempts() {
    for j in 1..=5usize {
        let flaky = FailNTimesProcessor::new(j - 1);
        let router = UntilSuccessful::builder(loc("us"), flaky.clone())
            .max_retries("5")
            .millis_between_retries("100")
            .build()
            .unwrap();

        router.process(Event::of(1)).await.unwrap();
        assert_eq!(flaky.attempts(), j);
    }
}

#[tokio::test(start_paused = true)]
async fn test_configured_defaults_apply() {
    let mut config = RuntimeConfig::default();
    config.until_successful.max_retries = "2".to_owned();
    config.until_successful.millis_between_retries = "5".to_owned();

    let flaky = FailNTimesProcessor::new(usize::MAX);
    let router = config
        .until_successful(loc("us"), flaky.clone())
        .build()
        .unwrap();
    assert!(router.process(Event::of(1)).await.is_err());
    assert_eq!(flaky.attempts(), 2);
}
