mod common;

use common::loc;
use flowline::{
    Event, Processor,
    prelude::ProcessorExt,
    routers::RoundRobin,
    testing::{InvocationLog, SpyProcessor},
};
use futures::{StreamExt, stream};

#[tokio::test]
async fn test_stream_through_router() {
    let log = InvocationLog::new();
    let router = RoundRobin::new(
        loc("rr"),
        ["a", "b"].map(|name| SpyProcessor::new(name, &log).boxed()),
    );

    let results: Vec<_> = router
        .apply_concurrent(stream::iter((0..4).map(Event::of)), 2)
        .collect()
        .await;

    assert!(results.iter().all(Result::is_ok));
    let payloads: Vec<_> = results
        .into_iter()
        .map(|result| result.unwrap().payload().as_int())
        .collect();
    assert_eq!(payloads, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert_eq!(log.len(), 4);
}
