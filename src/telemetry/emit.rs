//! Emission backends: where finalized stream telemetry goes.
//!
//! A backend hands out [`SpanHandle`]s and accepts [`MetricUpdate`]s. The
//! OpenTelemetry backend is [`OtelEmitter`]; [`RecordingEmitter`] keeps
//! everything in memory for tests and dry runs.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer};
use opentelemetry::{KeyValue, Value};

use super::metrics::GenAiInstruments;
use crate::error::{Error, Result};

/// A live span owned by one stream.
pub trait SpanHandle: Send {
    fn set_attribute(&mut self, attribute: KeyValue);
    fn add_event(&mut self, name: &'static str, attributes: Vec<KeyValue>);
    fn set_status(&mut self, status: Status);
    fn end(&mut self);
}

/// Named instruments a finalized stream reports into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    Requests,
    InputTokens,
    OutputTokens,
    TokenUsage,
    Cost,
    OperationDuration,
    TimeToFirstToken,
    TimePerOutputToken,
}

impl Instrument {
    pub fn name(self) -> &'static str {
        match self {
            Instrument::Requests => "gen_ai.requests",
            Instrument::InputTokens => "gen_ai.usage.input_tokens",
            Instrument::OutputTokens => "gen_ai.usage.output_tokens",
            Instrument::TokenUsage => "gen_ai.client.token.usage",
            Instrument::Cost => "gen_ai.usage.cost",
            Instrument::OperationDuration => "gen_ai.client.operation.duration",
            Instrument::TimeToFirstToken => "gen_ai.server.time_to_first_token",
            Instrument::TimePerOutputToken => "gen_ai.server.time_per_output_token",
        }
    }
}

/// One measurement: counters are added to, histograms record a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricUpdate {
    Add { instrument: Instrument, value: u64 },
    Record { instrument: Instrument, value: f64 },
}

impl MetricUpdate {
    pub fn instrument(&self) -> Instrument {
        match self {
            MetricUpdate::Add { instrument, .. } | MetricUpdate::Record { instrument, .. } => {
                *instrument
            }
        }
    }
}

/// A telemetry sink shared by every stream of a process.
pub trait Emitter: Send + Sync {
    /// Start a client span that began at `start_time`.
    fn start_span(&self, name: String, start_time: SystemTime) -> Box<dyn SpanHandle>;

    /// Apply one metric update with the given attributes.
    fn record(&self, update: &MetricUpdate, attributes: &[KeyValue]) -> Result<()>;
}

// ---------------------------------------------------------------------------
// OpenTelemetry
// ---------------------------------------------------------------------------

/// Emitter backed by an OTel tracer and the GenAI instrument set.
pub struct OtelEmitter<T> {
    tracer: T,
    instruments: GenAiInstruments,
}

impl<T> OtelEmitter<T> {
    pub fn new(tracer: T, instruments: GenAiInstruments) -> Self {
        Self {
            tracer,
            instruments,
        }
    }
}

impl OtelEmitter<BoxedTracer> {
    /// Emitter over the globally-registered tracer and meter providers.
    pub fn global() -> Self {
        Self::new(
            opentelemetry::global::tracer("genai-streamtrace"),
            GenAiInstruments::global(),
        )
    }
}

struct OtelSpan<S>(S);

impl<S> SpanHandle for OtelSpan<S>
where
    S: opentelemetry::trace::Span + Send,
{
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.0.set_attribute(attribute);
    }

    fn add_event(&mut self, name: &'static str, attributes: Vec<KeyValue>) {
        self.0.add_event(name, attributes);
    }

    fn set_status(&mut self, status: Status) {
        self.0.set_status(status);
    }

    fn end(&mut self) {
        self.0.end();
    }
}

impl<T> Emitter for OtelEmitter<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + 'static,
{
    fn start_span(&self, name: String, start_time: SystemTime) -> Box<dyn SpanHandle> {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .with_start_time(start_time)
            .start(&self.tracer);
        Box::new(OtelSpan(span))
    }

    fn record(&self, update: &MetricUpdate, attributes: &[KeyValue]) -> Result<()> {
        let i = &self.instruments;
        match *update {
            MetricUpdate::Add { instrument, value } => {
                let counter = match instrument {
                    Instrument::Requests => &i.requests,
                    Instrument::InputTokens => &i.input_tokens,
                    Instrument::OutputTokens => &i.output_tokens,
                    other => {
                        return Err(Error::Telemetry(format!(
                            "{} is not a counter",
                            other.name()
                        )));
                    }
                };
                counter.add(value, attributes);
            }
            MetricUpdate::Record { instrument, value } => {
                let histogram = match instrument {
                    Instrument::TokenUsage => &i.token_usage,
                    Instrument::Cost => &i.cost,
                    Instrument::OperationDuration => &i.operation_duration,
                    Instrument::TimeToFirstToken => &i.time_to_first_token,
                    Instrument::TimePerOutputToken => &i.time_per_output_token,
                    other => {
                        return Err(Error::Telemetry(format!(
                            "{} is not a histogram",
                            other.name()
                        )));
                    }
                };
                histogram.record(value, attributes);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory recording
// ---------------------------------------------------------------------------

/// An event captured on a recorded span.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub name: &'static str,
    pub attributes: Vec<KeyValue>,
}

/// A span captured by [`RecordingEmitter`]. Only ended spans are kept.
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    pub name: String,
    pub start_time: SystemTime,
    pub attributes: Vec<KeyValue>,
    pub events: Vec<RecordedEvent>,
    pub status: Status,
}

impl RecordedSpan {
    /// Last value set for `key`, if any.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    pub fn event(&self, name: &str) -> Option<&RecordedEvent> {
        self.events.iter().find(|e| e.name == name)
    }

    /// JSON rendering for operator output.
    pub fn to_json(&self) -> serde_json::Value {
        let status = match &self.status {
            Status::Ok => "ok".to_string(),
            Status::Error { description } => format!("error: {description}"),
            Status::Unset => "unset".to_string(),
        };
        serde_json::json!({
            "name": self.name,
            "status": status,
            "attributes": attributes_to_json(&self.attributes),
            "events": self.events.iter().map(|e| serde_json::json!({
                "name": e.name,
                "attributes": attributes_to_json(&e.attributes),
            })).collect::<Vec<_>>(),
        })
    }
}

impl RecordedEvent {
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes
            .iter()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }
}

/// A metric update captured by [`RecordingEmitter`].
#[derive(Debug, Clone)]
pub struct RecordedMetric {
    pub update: MetricUpdate,
    pub attributes: Vec<KeyValue>,
}

#[derive(Debug, Default)]
struct Recorded {
    spans: Vec<RecordedSpan>,
    metrics: Vec<RecordedMetric>,
}

/// Emitter that keeps finished spans and metric updates in memory.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct RecordingEmitter {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ended spans, in end order.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.lock().spans.clone()
    }

    pub fn metrics(&self) -> Vec<RecordedMetric> {
        self.lock().metrics.clone()
    }

    /// Updates recorded against one instrument.
    pub fn metrics_for(&self, instrument: Instrument) -> Vec<MetricUpdate> {
        self.lock()
            .metrics
            .iter()
            .filter(|m| m.update.instrument() == instrument)
            .map(|m| m.update)
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct RecordingSpan {
    sink: Arc<Mutex<Recorded>>,
    span: Option<RecordedSpan>,
}

impl SpanHandle for RecordingSpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        if let Some(span) = self.span.as_mut() {
            span.attributes.push(attribute);
        }
    }

    fn add_event(&mut self, name: &'static str, attributes: Vec<KeyValue>) {
        if let Some(span) = self.span.as_mut() {
            span.events.push(RecordedEvent { name, attributes });
        }
    }

    fn set_status(&mut self, status: Status) {
        if let Some(span) = self.span.as_mut() {
            span.status = status;
        }
    }

    fn end(&mut self) {
        if let Some(span) = self.span.take() {
            self.sink
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .spans
                .push(span);
        }
    }
}

impl Emitter for RecordingEmitter {
    fn start_span(&self, name: String, start_time: SystemTime) -> Box<dyn SpanHandle> {
        Box::new(RecordingSpan {
            sink: Arc::clone(&self.inner),
            span: Some(RecordedSpan {
                name,
                start_time,
                attributes: Vec::new(),
                events: Vec::new(),
                status: Status::Unset,
            }),
        })
    }

    fn record(&self, update: &MetricUpdate, attributes: &[KeyValue]) -> Result<()> {
        self.lock().metrics.push(RecordedMetric {
            update: *update,
            attributes: attributes.to_vec(),
        });
        Ok(())
    }
}

fn attributes_to_json(attributes: &[KeyValue]) -> serde_json::Map<String, serde_json::Value> {
    attributes
        .iter()
        .map(|kv| (kv.key.to_string(), value_to_json(&kv.value)))
        .collect()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) => serde_json::Value::from(*b),
        Value::I64(n) => serde_json::Value::from(*n),
        Value::F64(n) => serde_json::Value::from(*n),
        Value::String(s) => serde_json::Value::from(s.as_str()),
        other => serde_json::Value::from(other.to_string()),
    }
}
