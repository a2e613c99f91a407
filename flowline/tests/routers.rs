mod common;

use common::loc;
use flowline::{
    ErrorType, Event, FlowError, ItemSequenceInfo, Processor, Value,
    routers::{FirstSuccessful, ParallelForEach, RoundRobin},
    testing::{FailingProcessor, InvocationLog, SetPayloadProcessor, SpyProcessor},
};
use std::sync::Arc;

#[tokio::test]
async fn test_round_robin_is_fair() {
    let log = InvocationLog::new();
    let n = 3;
    let routes = (0..n).map(|index| SpyProcessor::new(index.to_string(), &log).boxed());
    let router = RoundRobin::new(loc("rr"), routes);

    for m in [1, 5, 9, 10] {
        let before = log.len();
        for _ in 0..m {
            router.process(Event::of(())).await.unwrap();
        }
        let names = log.names();
        for index in 0..n {
            let picked = names[before..]
                .iter()
                .filter(|name| **name == index.to_string())
                .count();
            assert!(picked == m / n || picked == m.div_ceil(n), "m = {m}");
        }
    }
}

#[tokio::test]
async fn test_round_robin_selection_order() {
    let log = InvocationLog::new();
    let routes = ["a", "b", "c"].map(|name| SpyProcessor::new(name, &log).boxed());
    let router = RoundRobin::new(loc("rr"), routes);
    for _ in 0..7 {
        router.process(Event::of(())).await.unwrap();
    }
    assert_eq!(log.names(), vec!["a", "b", "c", "a", "b", "c", "a"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_round_robin_concurrent_callers_spread_evenly() {
    let log = InvocationLog::new();
    let routes = ["a", "b"].map(|name| SpyProcessor::new(name, &log).boxed());
    let router = Arc::new(RoundRobin::new(loc("rr"), routes));

    let tasks: Vec<_> = (0..100)
        .map(|_| {
            let router = router.clone();
            tokio::spawn(async move { router.process(Event::of(())).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    let a = log.names().iter().filter(|name| *name == "a").count();
    assert_eq!(a, 50);
}

#[tokio::test]
async fn test_first_successful_short_circuits() {
    for first_ok in 0..4 {
        let log = InvocationLog::new();
        let routes = (0..4).map(|index| {
            let spy = SpyProcessor::new(index.to_string(), &log);
            let chain = flowline::Chain::builder(format!("route-{index}")).processor(spy);
            if index < first_ok {
                chain.processor(FailingProcessor::new("no")).build().boxed()
            } else {
                chain.processor(SetPayloadProcessor::new(index as i64)).build().boxed()
            }
        });
        let router = FirstSuccessful::new(loc("fs"), routes);

        let out = router.process(Event::of(())).await.unwrap();
        assert_eq!(out.payload().as_int(), Some(first_ok as i64));
        let expected: Vec<String> = (0..=first_ok).map(|index| index.to_string()).collect();
        assert_eq!(log.names(), expected);
    }
}

#[tokio::test]
async fn test_first_successful_all_fail() {
    let router = FirstSuccessful::new(
        loc("fs"),
        [FailingProcessor::new("one").boxed(), FailingProcessor::new("two").boxed()],
    );
    let err = router.process(Event::of(())).await.unwrap_err();
    assert_eq!(err.message(), "two");
    assert!(err.event().is_some());
}

#[tokio::test]
async fn test_parallel_foreach_collects_in_element_order() {
    let log = InvocationLog::new();
    let router = ParallelForEach::builder(loc("pfe"), SpyProcessor::new("item", &log))
        .max_concurrency(2)
        .build()
        .unwrap();

    let out = router.process(Event::of(vec![10, 20, 30])).await.unwrap();
    let items = out.payload().as_list().unwrap();
    let payloads: Vec<_> = items
        .iter()
        .map(|item| item.as_message().and_then(|m| m.payload.as_int()))
        .collect();
    assert_eq!(payloads, vec![Some(10), Some(20), Some(30)]);

    let mut positions: Vec<_> = log
        .events()
        .iter()
        .map(|event| event.item_sequence().map(|info| info.position))
        .collect();
    positions.sort();
    assert_eq!(positions, vec![Some(0), Some(1), Some(2)]);
    assert_eq!(out.item_sequence(), None::<ItemSequenceInfo>);
}

#[tokio::test]
async fn test_parallel_foreach_flatten_collects_payloads() {
    let router = ParallelForEach::builder(loc("pfe"), SetPayloadProcessor::new("done"))
        .flatten(true)
        .build()
        .unwrap();
    let out = router.process(Event::of(vec![1, 2])).await.unwrap();
    assert_eq!(
        out.payload(),
        &Value::List(vec![Value::from("done"), Value::from("done")])
    );
}

#[tokio::test]
async fn test_parallel_foreach_element_failure_is_composite() {
    let router = ParallelForEach::builder(loc("pfe"), FailingProcessor::new("bad item"))
        .build()
        .unwrap();
    let err = router.process(Event::of(vec![1, 2])).await.unwrap_err();
    assert_eq!(err.error_type(), Some(&ErrorType::COMPOSITE_ROUTING));
    assert!(matches!(err.cause(), FlowError::CompositeRouting(_)));
    assert_eq!(err.as_composite().unwrap().failures().len(), 2);
}
