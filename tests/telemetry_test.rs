//! Integration tests for telemetry initialization and the OTel emitter.

mod common;

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use common::*;
use genai_streamtrace::stream::{Provider, StreamInstrumentor};
use genai_streamtrace::telemetry::emit::{Emitter, Instrument, MetricUpdate, OtelEmitter, SpanHandle};
use genai_streamtrace::telemetry::genai;
use genai_streamtrace::telemetry::metrics::GenAiInstruments;
use opentelemetry::metrics::MeterProvider as _;
use opentelemetry::trace::{SpanKind, Status, TracerProvider as _};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider};
use serde_json::Value;

type Chunk = Result<Value, String>;

fn otel_emitter() -> (OtelEmitter<opentelemetry_sdk::trace::SdkTracer>, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let tracer_provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    let meter = SdkMeterProvider::builder().build().meter("test");
    let emitter = OtelEmitter::new(
        tracer_provider.tracer("test"),
        GenAiInstruments::new(&meter),
    );
    (emitter, exporter)
}

#[test]
fn telemetry_initializes_without_endpoint() {
    // The tracing subscriber can only be set once per process, so this may
    // return Err if another test got there first.
    let config = genai_streamtrace::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "streamtrace-test".to_string(),
        log_level: "debug".to_string(),
    };
    if let Ok(guard) = genai_streamtrace::telemetry::init_telemetry(config) {
        assert!(!guard.is_exporting());
        guard.force_flush();
    }
}

#[test]
fn span_names_follow_operation_and_model() {
    assert_eq!(genai::span_name(genai::OP_CHAT, "gpt-4o"), "chat gpt-4o");
    assert_eq!(
        genai::span_name(genai::OP_EMBEDDINGS, "text-embedding-3-small"),
        "embeddings text-embedding-3-small"
    );
}

#[test]
fn otel_emitter_exports_a_client_span() {
    let (emitter, exporter) = otel_emitter();
    let inst = StreamInstrumentor::new(Arc::new(emitter), Arc::new(pricing()));

    let input: Vec<Chunk> = vec![
        Ok(text_chunk("Hello")),
        Ok(finish_chunk("stop", 10, 25)),
    ];
    let _: Vec<Chunk> = inst
        .wrap(input.into_iter(), Provider::OpenAi, openai_context(&inst))
        .collect();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "chat gpt-4o");
    assert_eq!(span.span_kind, SpanKind::Client);
    assert_eq!(span.status, Status::Ok);

    let total = span
        .attributes
        .iter()
        .find(|kv| kv.key.as_str() == genai::GEN_AI_USAGE_TOTAL_TOKENS)
        .map(|kv| &kv.value);
    assert_eq!(as_i64(total), Some(35));

    let event_names: Vec<_> = span.events.events.iter().map(|e| e.name.as_ref()).collect();
    assert_eq!(
        event_names,
        vec![
            genai::GEN_AI_CONTENT_PROMPT_EVENT,
            genai::GEN_AI_CONTENT_COMPLETION_EVENT
        ]
    );
}

#[test]
fn otel_span_keeps_the_given_start_time() {
    let (emitter, exporter) = otel_emitter();
    let start = SystemTime::now() - Duration::from_secs(5);

    let mut span = emitter.start_span("chat m".to_string(), start);
    span.end();

    let spans = exporter.get_finished_spans().unwrap();
    assert_eq!(spans[0].start_time, start);
}

#[test]
fn otel_emitter_rejects_instrument_kind_mismatch() {
    let (emitter, _exporter) = otel_emitter();

    assert!(
        emitter
            .record(
                &MetricUpdate::Add {
                    instrument: Instrument::Requests,
                    value: 1
                },
                &[]
            )
            .is_ok()
    );
    assert!(
        emitter
            .record(
                &MetricUpdate::Record {
                    instrument: Instrument::TimeToFirstToken,
                    value: 0.05
                },
                &[]
            )
            .is_ok()
    );
    assert!(
        emitter
            .record(
                &MetricUpdate::Add {
                    instrument: Instrument::Cost,
                    value: 1
                },
                &[]
            )
            .is_err()
    );
    assert!(
        emitter
            .record(
                &MetricUpdate::Record {
                    instrument: Instrument::InputTokens,
                    value: 1.0
                },
                &[]
            )
            .is_err()
    );
}
