//! Aggregation policies for successful fork-joins.

use flowline_core::{Event, Value};
use std::collections::BTreeMap;

/// Combines the results of all branches of a successful fork-join.
///
/// `results` are sorted by route index regardless of completion order.
pub trait Aggregation: Send + Sync + 'static {
    /// The aggregated value, or `None` to keep the original payload.
    fn aggregate(&self, results: &[(usize, Event)]) -> Option<Value>;
}

/// Collects branch results into a list, in route order.
///
/// Each element is the branch's whole message unless `flatten` is set, in which
/// case it is the branch's payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectList {
    flatten: bool,
}

impl CollectList {
    /// Collect whole messages.
    pub fn messages() -> Self {
        Self { flatten: false }
    }

    /// Collect payloads only.
    pub fn payloads() -> Self {
        Self { flatten: true }
    }
}

impl Aggregation for CollectList {
    fn aggregate(&self, results: &[(usize, Event)]) -> Option<Value> {
        let items = results
            .iter()
            .map(|(_, event)| {
                if self.flatten {
                    event.payload().clone()
                } else {
                    Value::from(event.message().clone())
                }
            })
            .collect();
        Some(Value::List(items))
    }
}

/// Collects branch messages into a map keyed by route index (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectMap;

impl Aggregation for CollectMap {
    fn aggregate(&self, results: &[(usize, Event)]) -> Option<Value> {
        let map: BTreeMap<String, Value> = results
            .iter()
            .map(|(index, event)| (index.to_string(), Value::from(event.message().clone())))
            .collect();
        Some(Value::Map(map))
    }
}

/// Keeps the original payload; only branch variables are merged.
#[derive(Debug, Clone, Copy, Default)]
pub struct JoinOnly;

impl Aggregation for JoinOnly {
    fn aggregate(&self, _results: &[(usize, Event)]) -> Option<Value> {
        None
    }
}
