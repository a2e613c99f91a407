//! Chain builder.

use super::{Chain, ChainInner, ChainStep, layers};
use crate::resolution::ErrorResolver;
use flowline_core::{
    BoxErrorHandler, BoxInterceptor, BoxProcessingStrategy, BoxProcessor, BoxScheduler,
    BoxSpanFactory, ComponentLocation, ErrorHandler, Interceptor, LifecycleState,
    NoopSpanFactory, ProcessingStrategy, ProcessingType, Processor, StepInfo,
};
use std::sync::{Arc, atomic::AtomicBool};

enum Entry {
    Processor(BoxProcessor),
    Chain(Chain),
    Builder(ChainBuilder),
}

/// Assembles processors, nested chains and nested builders into a [`Chain`].
///
/// A builder holding exactly one already-built chain and nothing else (no error
/// handler, interceptors, processing strategy or error scheduler) builds to that
/// same chain instead of wrapping it.
pub struct ChainBuilder {
    name: String,
    location: Option<ComponentLocation>,
    entries: Vec<Entry>,
    error_handler: Option<BoxErrorHandler>,
    error_scheduler: Option<BoxScheduler>,
    strategy: Option<BoxProcessingStrategy>,
    interceptors: Vec<BoxInterceptor>,
    span_factory: Option<BoxSpanFactory>,
    resolver: Option<ErrorResolver>,
}

impl ChainBuilder {
    /// Create an empty builder for a chain named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: None,
            entries: Vec::new(),
            error_handler: None,
            error_scheduler: None,
            strategy: None,
            interceptors: Vec::new(),
            span_factory: None,
            resolver: None,
        }
    }

    /// Place the chain at `location` instead of a root location named after it.
    pub fn at(mut self, location: ComponentLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Append a processor.
    pub fn processor(mut self, processor: impl Processor) -> Self {
        self.entries.push(Entry::Processor(processor.boxed()));
        self
    }

    /// Append type-erased processors.
    pub fn processors(mut self, processors: impl IntoIterator<Item = BoxProcessor>) -> Self {
        self.entries
            .extend(processors.into_iter().map(Entry::Processor));
        self
    }

    /// Append an already built chain.
    pub fn chain(mut self, chain: Chain) -> Self {
        self.entries.push(Entry::Chain(chain));
        self
    }

    /// Append a nested builder, built together with this one.
    pub fn nested(mut self, builder: ChainBuilder) -> Self {
        self.entries.push(Entry::Builder(builder));
        self
    }

    /// Route step failures to `handler`.
    pub fn error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Run the error handler on `scheduler` when the failing step could deadlock
    /// the current task (blocking step, or an active transaction).
    pub fn error_scheduler(mut self, scheduler: BoxScheduler) -> Self {
        self.error_scheduler = Some(scheduler);
        self
    }

    /// Execution-thread policy for every step.
    pub fn processing_strategy(mut self, strategy: impl ProcessingStrategy) -> Self {
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Add around-advice for every step. The first interceptor added is outermost.
    pub fn interceptor(mut self, interceptor: impl Interceptor) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Open a span around every step.
    pub fn span_factory(mut self, factory: BoxSpanFactory) -> Self {
        self.span_factory = Some(factory);
        self
    }

    /// Resolve step failures with `resolver` instead of the default one.
    pub fn error_resolver(mut self, resolver: ErrorResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    fn is_plain(&self) -> bool {
        self.error_handler.is_none()
            && self.error_scheduler.is_none()
            && self.strategy.is_none()
            && self.interceptors.is_empty()
    }

    /// Build the chain.
    pub fn build(mut self) -> Chain {
        if self.entries.len() == 1 && self.is_plain() {
            match self.entries.pop() {
                Some(Entry::Chain(chain)) => return chain,
                Some(Entry::Builder(builder)) => return builder.build(),
                Some(other) => self.entries.push(other),
                None => {}
            }
        }

        let location = self
            .location
            .take()
            .unwrap_or_else(|| ComponentLocation::root(self.name.clone()));
        let processors_location = location.child("processors");
        let layers = layers::StepLayers {
            chain_name: Arc::from(self.name.as_str()),
            resolver: self.resolver.clone().unwrap_or_default(),
            strategy: self.strategy.clone(),
            interceptors: self.interceptors.clone(),
            span_factory: self
                .span_factory
                .clone()
                .unwrap_or_else(|| Arc::new(NoopSpanFactory)),
        };

        let mut steps = Vec::with_capacity(self.entries.len());
        for (index, entry) in self.entries.into_iter().enumerate() {
            let step_location = processors_location.child(index.to_string());
            let processor: BoxProcessor = match entry {
                Entry::Processor(processor) => processor,
                Entry::Chain(chain) => chain.boxed(),
                Entry::Builder(mut builder) => {
                    if builder.location.is_none() {
                        builder.location = Some(step_location.clone());
                    }
                    builder.build().boxed()
                }
            };
            let info = StepInfo {
                location: processor
                    .as_component()
                    .map(|component| component.location().clone())
                    .unwrap_or(step_location),
                processing_type: processor.processing_type_dyn(),
            };
            let capabilities = processor.capabilities();
            let call = layers::compose(processor.clone(), info.clone(), &layers);
            steps.push(ChainStep {
                processor,
                info,
                capabilities,
                call,
            });
        }

        let processing_type = if steps.iter().any(|step| step.info.processing_type.is_blocking()) {
            ProcessingType::Blocking
        } else {
            ProcessingType::CpuLite
        };

        Chain::from_inner(ChainInner {
            lifecycle: LifecycleState::new(self.name.clone()),
            name: self.name,
            location,
            steps,
            error_handler: self.error_handler,
            error_scheduler: self.error_scheduler,
            resolver: layers.resolver,
            can_process: AtomicBool::new(true),
            processing_type,
        })
    }
}

impl std::fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}
