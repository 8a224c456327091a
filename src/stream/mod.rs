//! Streaming response telemetry.
//!
//! Raw chunks flow one way: parser -> [`Delta`] -> accumulator and timing
//! tracker -> (on stream end) finalizer -> emitter. [`StreamProxy`] is the
//! only piece the caller sees; [`StreamInstrumentor`] builds proxies that
//! share one emitter and price table.

pub mod accumulator;
pub mod context;
pub mod delta;
pub mod finalize;
pub mod parsers;
pub mod proxy;
pub mod timing;
pub mod tool_calls;

use std::sync::Arc;

pub use accumulator::{AccumulatedResponse, ResponseAccumulator};
pub use context::{Operation, RequestContext, RequestDefaults, RequestOptions, format_prompt};
pub use delta::{Delta, DeltaParser, ToolCallFragment, Usage};
pub use finalize::{Finalizer, FinalizedTelemetry, StreamOutcome};
pub use parsers::{AnthropicMessagesParser, MistralChatParser, OpenAiChatParser, Provider};
pub use proxy::{FinalizationGuard, Phase, StreamProxy};
pub use timing::{TimingSummary, TimingTracker};
pub use tool_calls::{ToolCall, ToolCallReassembler};

use crate::pricing::CostLookup;
use crate::telemetry::emit::Emitter;

/// Shared entry point: one per process, cloned freely.
#[derive(Clone)]
pub struct StreamInstrumentor {
    finalizer: Finalizer,
    defaults: RequestDefaults,
}

impl StreamInstrumentor {
    pub fn new(emitter: Arc<dyn Emitter>, pricing: Arc<dyn CostLookup>) -> Self {
        Self {
            finalizer: Finalizer::new(emitter, pricing),
            defaults: RequestDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: RequestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// A request context for `provider`, seeded with this instrumentor's
    /// defaults.
    pub fn context(&self, provider: Provider, request_model: impl Into<String>) -> RequestContext {
        RequestContext::for_provider(provider, request_model).defaults(self.defaults.clone())
    }

    /// Wrap `inner`, parsing its chunks with `parser`.
    pub fn wrap<S, P>(&self, inner: S, parser: P, ctx: RequestContext) -> StreamProxy<S, P> {
        StreamProxy::new(inner, parser, ctx, self.finalizer.clone())
    }
}
