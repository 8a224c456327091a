//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use genai_streamtrace::pricing::{ChatPrice, PricingTable};
use genai_streamtrace::stream::{Provider, RequestContext, StreamInstrumentor};
use genai_streamtrace::telemetry::emit::RecordingEmitter;
use opentelemetry::Value;
use serde_json::{Value as Json, json};

pub fn pricing() -> PricingTable {
    PricingTable::empty().with_chat_price(
        "gpt-4o",
        ChatPrice {
            prompt_price: 0.0025,
            completion_price: 0.01,
        },
    )
}

pub fn instrumentor(recorder: &RecordingEmitter) -> StreamInstrumentor {
    StreamInstrumentor::new(Arc::new(recorder.clone()), Arc::new(pricing()))
}

pub fn openai_context(instrumentor: &StreamInstrumentor) -> RequestContext {
    instrumentor
        .context(Provider::OpenAi, "gpt-4o")
        .prompt("user: say hello")
}

pub fn text_chunk(text: &str) -> Json {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-2024-08-06",
        "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
    })
}

pub fn finish_chunk(reason: &str, input: u64, output: u64) -> Json {
    json!({
        "id": "chatcmpl-1",
        "model": "gpt-4o-2024-08-06",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}],
        "usage": {"prompt_tokens": input, "completion_tokens": output}
    })
}

pub fn tool_open_chunk(index: u32, id: &str, name: &str) -> Json {
    json!({
        "choices": [{"delta": {"tool_calls": [{
            "index": index, "id": id, "type": "function",
            "function": {"name": name, "arguments": ""}
        }]}}]
    })
}

pub fn tool_args_chunk(index: u32, args: &str) -> Json {
    json!({
        "choices": [{"delta": {"tool_calls": [{
            "index": index, "function": {"arguments": args}
        }]}}]
    })
}

pub fn as_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.as_str().to_string()),
        _ => None,
    }
}

pub fn as_i64(value: Option<&Value>) -> Option<i64> {
    match value {
        Some(Value::I64(n)) => Some(*n),
        _ => None,
    }
}

pub fn as_f64(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::F64(n)) => Some(*n),
        _ => None,
    }
}

pub fn as_bool(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        _ => None,
    }
}

pub fn as_str_array(value: Option<&Value>) -> Option<Vec<String>> {
    match value {
        Some(Value::Array(opentelemetry::Array::String(items))) => {
            Some(items.iter().map(|s| s.as_str().to_string()).collect())
        }
        _ => None,
    }
}
