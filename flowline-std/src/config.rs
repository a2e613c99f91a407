//! Runtime configuration.
//!
//! Defaults can be overridden from the environment, with the `FLOWLINE` prefix and
//! `__` between nested keys:
//!
//! ```text
//! FLOWLINE_FORK_JOIN__MAX_CONCURRENCY=8
//! FLOWLINE_UNTIL_SUCCESSFUL__MAX_RETRIES=3
//! FLOWLINE_FEATURES__PARALLEL_FOREACH_FLATTEN_MESSAGE=true
//! ```

use crate::{
    expr::IntExpr,
    forkjoin::ForkJoinConfig,
    routers::{
        DEFAULT_COUNTER_VARIABLE, DEFAULT_MAX_RETRIES, DEFAULT_MILLIS_BETWEEN_RETRIES,
        DEFAULT_ROOT_MESSAGE_VARIABLE, Foreach, ForeachBuilder, ParallelForEach,
        ParallelForEachBuilder, UntilSuccessful, UntilSuccessfulBuilder,
    },
};
use ::config::Environment;
use flowline_core::{ComponentLocation, ConfigError, Processor};
use serde::Deserialize;
use std::time::Duration;

/// Fork-join defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForkJoinSettings {
    /// Maximum branches in flight. `None` is unbounded.
    pub max_concurrency: Option<usize>,
    /// Per-branch deadline in milliseconds. `None` is no deadline.
    pub timeout_ms: Option<u64>,
    /// Run every branch before reporting failures.
    pub delay_errors: bool,
}

impl Default for ForkJoinSettings {
    fn default() -> Self {
        Self {
            max_concurrency: None,
            timeout_ms: None,
            delay_errors: true,
        }
    }
}

/// Until-successful defaults. Both values accept a literal or `#[vars.<name>]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UntilSuccessfulSettings {
    /// Maximum attempts.
    pub max_retries: String,
    /// Delay between attempts in milliseconds.
    pub millis_between_retries: String,
}

impl Default for UntilSuccessfulSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES.to_owned(),
            millis_between_retries: DEFAULT_MILLIS_BETWEEN_RETRIES.to_owned(),
        }
    }
}

/// Foreach defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ForeachSettings {
    /// Elements per iteration.
    pub batch_size: usize,
    /// Name of the iteration counter variable.
    pub counter_variable: String,
    /// Name of the root message variable.
    pub root_message_variable: String,
}

impl Default for ForeachSettings {
    fn default() -> Self {
        Self {
            batch_size: 1,
            counter_variable: DEFAULT_COUNTER_VARIABLE.to_owned(),
            root_message_variable: DEFAULT_ROOT_MESSAGE_VARIABLE.to_owned(),
        }
    }
}

/// Behavior switches.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    /// Foreach's default splitter rejects map payloads.
    pub foreach_reject_map_payload: bool,
    /// Parallel foreach collects payloads instead of whole messages.
    pub parallel_foreach_flatten_message: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            foreach_reject_map_payload: true,
            parallel_foreach_flatten_message: false,
        }
    }
}

/// Configuration of the routing runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fork-join defaults.
    pub fork_join: ForkJoinSettings,
    /// Until-successful defaults.
    pub until_successful: UntilSuccessfulSettings,
    /// Foreach defaults.
    pub foreach: ForeachSettings,
    /// Behavior switches.
    pub features: FeatureFlags,
}

impl RuntimeConfig {
    /// Load defaults overridden by `FLOWLINE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::with_prefix("FLOWLINE"))
    }

    fn from_environment(environment: Environment) -> Result<Self, ConfigError> {
        let environment = environment
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        let config: Self = ::config::Config::builder()
            .add_source(environment)
            .build()
            .and_then(::config::Config::try_deserialize)
            .map_err(|error| ConfigError::Source(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject zero concurrency, zero timeout and zero batch size.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fork_join_config().validate()?;
        if self.foreach.batch_size == 0 {
            return Err(ConfigError::invalid("foreach.batch_size", "must be greater than 0"));
        }
        self.until_successful.max_retries.parse::<IntExpr>()?;
        self.until_successful
            .millis_between_retries
            .parse::<IntExpr>()?;
        Ok(())
    }

    /// The fork-join settings as a [`ForkJoinConfig`].
    pub fn fork_join_config(&self) -> ForkJoinConfig {
        ForkJoinConfig {
            max_concurrency: self.fork_join.max_concurrency,
            timeout: self.fork_join.timeout_ms.map(Duration::from_millis),
            delay_errors: self.fork_join.delay_errors,
        }
    }

    /// A foreach builder preconfigured with these settings.
    pub fn foreach(&self, location: ComponentLocation, nested: impl Processor) -> ForeachBuilder {
        Foreach::builder(location, nested)
            .batch_size(self.foreach.batch_size)
            .counter_variable(self.foreach.counter_variable.clone())
            .root_message_variable(self.foreach.root_message_variable.clone())
            .reject_map_payload(self.features.foreach_reject_map_payload)
    }

    /// A parallel foreach builder preconfigured with these settings.
    pub fn parallel_foreach(
        &self,
        location: ComponentLocation,
        nested: impl Processor,
    ) -> ParallelForEachBuilder {
        let mut builder = ParallelForEach::builder(location, nested)
            .flatten(self.features.parallel_foreach_flatten_message);
        if let Some(max_concurrency) = self.fork_join.max_concurrency {
            builder = builder.max_concurrency(max_concurrency);
        }
        if let Some(timeout_ms) = self.fork_join.timeout_ms {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }
        builder
    }

    /// An until-successful builder preconfigured with these settings.
    pub fn until_successful(
        &self,
        location: ComponentLocation,
        nested: impl Processor,
    ) -> UntilSuccessfulBuilder {
        UntilSuccessful::builder(location, nested)
            .max_retries(self.until_successful.max_retries.clone())
            .millis_between_retries(self.until_successful.millis_between_retries.clone())
    }
}
