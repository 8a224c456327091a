//! The proxy as a `futures::Stream`.

mod common;

use std::time::Duration;

use common::*;
use futures::StreamExt;
use genai_streamtrace::stream::{Phase, Provider};
use genai_streamtrace::telemetry::emit::RecordingEmitter;
use genai_streamtrace::telemetry::genai;
use opentelemetry::trace::Status;
use serde_json::Value;

type Chunk = Result<Value, String>;

#[tokio::test]
async fn async_stream_forwards_and_finalizes_once() {
    let recorder = RecordingEmitter::new();
    let inst = instrumentor(&recorder);
    let input: Vec<Chunk> = vec![
        Ok(text_chunk("Hello")),
        Ok(text_chunk(" async")),
        Ok(finish_chunk("stop", 4, 2)),
    ];

    let mut stream = inst.wrap(
        futures::stream::iter(input.clone()),
        Provider::OpenAi,
        openai_context(&inst),
    );
    let mut output = Vec::new();
    while let Some(item) = stream.next().await {
        output.push(item);
    }
    assert_eq!(output, input);
    assert_eq!(stream.phase(), Phase::Closed);
    assert!(stream.next().await.is_none());
    drop(stream);

    let spans = recorder.spans();
    assert_eq!(spans.len(), 1);
    let completion = spans[0]
        .event(genai::GEN_AI_CONTENT_COMPLETION_EVENT)
        .unwrap();
    assert_eq!(
        as_str(completion.attribute(genai::GEN_AI_CONTENT_COMPLETION)).as_deref(),
        Some("Hello async")
    );
    assert_eq!(as_i64(spans[0].attribute(genai::GEN_AI_USAGE_TOTAL_TOKENS)), Some(6));
}

#[tokio::test]
async fn async_stream_error_sets_error_status() {
    let recorder = RecordingEmitter::new();
    let inst = instrumentor(&recorder);
    let input: Vec<Chunk> = vec![Ok(text_chunk("x")), Err("upstream 500".to_string())];

    let stream = inst.wrap(
        futures::stream::iter(input.clone()),
        Provider::OpenAi,
        openai_context(&inst),
    );
    let output: Vec<Chunk> = stream.collect().await;

    assert_eq!(output, input);
    let spans = recorder.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].status, Status::error("upstream 500"));
}

#[tokio::test]
async fn async_stream_dropped_mid_way_finalizes() {
    let recorder = RecordingEmitter::new();
    let inst = instrumentor(&recorder);
    let input: Vec<Chunk> = vec![Ok(text_chunk("a")), Ok(text_chunk("b"))];

    let mut stream = inst.wrap(
        futures::stream::iter(input),
        Provider::OpenAi,
        openai_context(&inst),
    );
    assert!(stream.next().await.is_some());
    assert!(recorder.spans().is_empty());
    drop(stream);

    assert_eq!(recorder.spans().len(), 1);
    assert_eq!(recorder.spans()[0].status, Status::Ok);
}

#[tokio::test]
async fn time_to_first_token_reflects_upstream_delay() {
    let recorder = RecordingEmitter::new();
    let inst = instrumentor(&recorder);

    let delayed = futures::stream::iter(vec![
        Ok::<_, String>(text_chunk("slow")),
        Ok(finish_chunk("stop", 1, 1)),
    ])
    .then(|chunk| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        chunk
    })
    .boxed();

    let stream = inst.wrap(delayed, Provider::OpenAi, openai_context(&inst));
    let _: Vec<Chunk> = stream.collect().await;

    let span = &recorder.spans()[0];
    let ttft = as_f64(span.attribute(genai::GEN_AI_SERVER_TTFT)).unwrap();
    let tbt = as_f64(span.attribute(genai::GEN_AI_SERVER_TBT)).unwrap();
    assert!(ttft >= 0.020, "ttft {ttft}");
    assert!(tbt >= 0.020, "tbt {tbt}");
}
