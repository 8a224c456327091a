//! Built-in chunk parsers for decoded provider SSE payloads.
//!
//! Each parser reads a `serde_json::Value` chunk and never fails: fields
//! with an unexpected type are treated as absent, and a chunk that is not a
//! JSON object yields an empty [`Delta`].

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use super::delta::{Delta, DeltaParser, ToolCallFragment, Usage};
use crate::error::Error;
use crate::telemetry::genai;

/// OpenAI chat-completions chunks (`chat.completion.chunk`).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiChatParser;

/// Anthropic messages stream events.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicMessagesParser;

/// Mistral chat chunks: the OpenAI shape nested under `data`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MistralChatParser;

impl DeltaParser<Value> for OpenAiChatParser {
    fn parse(&self, chunk: &Value) -> Delta {
        parse_openai_shape(chunk)
    }
}

impl DeltaParser<Value> for MistralChatParser {
    fn parse(&self, chunk: &Value) -> Delta {
        match chunk.get("data") {
            Some(data) => parse_openai_shape(data),
            None => Delta::default(),
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn parse_openai_shape(chunk: &Value) -> Delta {
    if !chunk.is_object() {
        return Delta::default();
    }

    let mut delta = Delta {
        response_id: str_field(chunk, "id"),
        response_model: str_field(chunk, "model"),
        ..Delta::default()
    };

    if let Some(usage) = chunk.get("usage").filter(|u| u.is_object()) {
        delta.usage = Some(Usage {
            input_tokens: usage.get("prompt_tokens").and_then(Value::as_u64),
            output_tokens: usage.get("completion_tokens").and_then(Value::as_u64),
        });
    }

    let Some(choice) = chunk
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return delta;
    };

    delta.finish_reason = str_field(choice, "finish_reason");

    if let Some(body) = choice.get("delta") {
        delta.text_fragment = str_field(body, "content").filter(|s| !s.is_empty());
        delta.tool_call_fragments = body
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| calls.iter().filter_map(parse_openai_tool_call).collect())
            .unwrap_or_default();
    }

    delta
}

fn parse_openai_tool_call(call: &Value) -> Option<ToolCallFragment> {
    let index = call.get("index").and_then(Value::as_u64).unwrap_or(0);
    let function = call.get("function");
    Some(ToolCallFragment {
        index: u32::try_from(index).ok()?,
        id: str_field(call, "id"),
        name: function.and_then(|f| str_field(f, "name")),
        arguments_fragment: function
            .and_then(|f| str_field(f, "arguments"))
            .filter(|s| !s.is_empty()),
    })
}

impl DeltaParser<Value> for AnthropicMessagesParser {
    fn parse(&self, chunk: &Value) -> Delta {
        let Some(kind) = chunk.get("type").and_then(Value::as_str) else {
            return Delta::default();
        };
        let index = chunk
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|i| u32::try_from(i).ok());

        match kind {
            "message_start" => {
                let Some(message) = chunk.get("message") else {
                    return Delta::default();
                };
                Delta {
                    response_id: str_field(message, "id"),
                    response_model: str_field(message, "model"),
                    usage: message.get("usage").map(anthropic_usage),
                    ..Delta::default()
                }
            }
            "content_block_start" => {
                let Some(block) = chunk.get("content_block") else {
                    return Delta::default();
                };
                match block.get("type").and_then(Value::as_str) {
                    Some("tool_use") => Delta {
                        tool_call_fragments: index
                            .map(|index| ToolCallFragment {
                                index,
                                id: str_field(block, "id"),
                                name: str_field(block, "name"),
                                arguments_fragment: None,
                            })
                            .into_iter()
                            .collect(),
                        ..Delta::default()
                    },
                    Some("text") => Delta {
                        text_fragment: str_field(block, "text").filter(|s| !s.is_empty()),
                        ..Delta::default()
                    },
                    _ => Delta::default(),
                }
            }
            "content_block_delta" => {
                let Some(body) = chunk.get("delta") else {
                    return Delta::default();
                };
                match body.get("type").and_then(Value::as_str) {
                    Some("text_delta") => Delta {
                        text_fragment: str_field(body, "text"),
                        ..Delta::default()
                    },
                    Some("input_json_delta") => Delta {
                        tool_call_fragments: index
                            .and_then(|index| {
                                str_field(body, "partial_json")
                                    .filter(|s| !s.is_empty())
                                    .map(|json| ToolCallFragment::arguments(index, json))
                            })
                            .into_iter()
                            .collect(),
                        ..Delta::default()
                    },
                    _ => Delta::default(),
                }
            }
            "message_delta" => Delta {
                finish_reason: chunk.get("delta").and_then(|d| str_field(d, "stop_reason")),
                usage: chunk.get("usage").map(anthropic_usage),
                ..Delta::default()
            },
            _ => Delta::default(),
        }
    }
}

fn anthropic_usage(usage: &Value) -> Usage {
    Usage {
        input_tokens: usage.get("input_tokens").and_then(Value::as_u64),
        output_tokens: usage.get("output_tokens").and_then(Value::as_u64),
    }
}

// ---------------------------------------------------------------------------
// Provider selection
// ---------------------------------------------------------------------------

/// A provider wire format, usable directly as its own parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Mistral,
}

impl Provider {
    /// Value for `gen_ai.system`.
    pub fn system(self) -> &'static str {
        match self {
            Provider::OpenAi => genai::SYSTEM_OPENAI,
            Provider::Anthropic => genai::SYSTEM_ANTHROPIC,
            Provider::Mistral => genai::SYSTEM_MISTRAL,
        }
    }

    /// Default API host and port.
    pub fn default_server(self) -> (&'static str, u16) {
        match self {
            Provider::OpenAi => ("api.openai.com", 443),
            Provider::Anthropic => ("api.anthropic.com", 443),
            Provider::Mistral => ("api.mistral.ai", 443),
        }
    }
}

impl DeltaParser<Value> for Provider {
    fn parse(&self, chunk: &Value) -> Delta {
        match self {
            Provider::OpenAi => OpenAiChatParser.parse(chunk),
            Provider::Anthropic => AnthropicMessagesParser.parse(chunk),
            Provider::Mistral => MistralChatParser.parse(chunk),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.system())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "anthropic" => Ok(Provider::Anthropic),
            "mistral" => Ok(Provider::Mistral),
            other => Err(Error::Config(format!("unknown provider: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_text_chunk() {
        let delta = OpenAiChatParser.parse(&json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o-2024-08-06",
            "choices": [{"index": 0, "delta": {"content": "Hel"}, "finish_reason": null}]
        }));
        assert_eq!(delta.text_fragment.as_deref(), Some("Hel"));
        assert_eq!(delta.response_id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(delta.finish_reason, None);
        assert_eq!(delta.usage, None);
    }

    #[test]
    fn openai_tool_call_open_and_continue() {
        let open = OpenAiChatParser.parse(&json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0, "id": "call_1", "type": "function",
                "function": {"name": "get_weather", "arguments": ""}
            }]}}]
        }));
        assert_eq!(
            open.tool_call_fragments,
            vec![ToolCallFragment::open(0, "call_1", "get_weather")]
        );

        let cont = OpenAiChatParser.parse(&json!({
            "choices": [{"delta": {"tool_calls": [{
                "index": 0, "function": {"arguments": "{\"city\":"}
            }]}}]
        }));
        assert_eq!(
            cont.tool_call_fragments,
            vec![ToolCallFragment::arguments(0, "{\"city\":")]
        );
    }

    #[test]
    fn openai_parallel_tool_calls_in_one_chunk() {
        let delta = OpenAiChatParser.parse(&json!({
            "choices": [{"delta": {"tool_calls": [
                {"index": 0, "id": "a", "type": "function",
                 "function": {"name": "f", "arguments": "{}"}},
                {"index": 1, "id": "b", "type": "function",
                 "function": {"name": "g", "arguments": ""}}
            ]}}]
        }));
        assert_eq!(
            delta.tool_call_fragments,
            vec![
                ToolCallFragment::open(0, "a", "f").with_arguments("{}"),
                ToolCallFragment::open(1, "b", "g"),
            ]
        );
    }

    #[test]
    fn mistral_chunk_nested_under_data() {
        let delta = MistralChatParser.parse(&json!({
            "data": {
                "id": "cmpl-9",
                "model": "mistral-small-latest",
                "choices": [{"index": 0, "delta": {"content": "x"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
            }
        }));
        assert_eq!(delta.text_fragment.as_deref(), Some("x"));
        assert_eq!(delta.finish_reason.as_deref(), Some("stop"));
        assert_eq!(delta.usage, Some(Usage::new(7, 3)));
        assert_eq!(delta.response_id.as_deref(), Some("cmpl-9"));
        assert_eq!(delta.response_model.as_deref(), Some("mistral-small-latest"));
    }

    #[test]
    fn openai_usage_only_chunk() {
        let delta = OpenAiChatParser.parse(&json!({
            "id": "chatcmpl-1",
            "choices": [],
            "usage": {"prompt_tokens": 10, "completion_tokens": 25, "total_tokens": 35}
        }));
        assert_eq!(delta.usage, Some(Usage::new(10, 25)));
    }

    #[test]
    fn non_object_chunks_are_empty() {
        assert!(OpenAiChatParser.parse(&json!("[DONE]")).is_empty());
        assert!(AnthropicMessagesParser.parse(&json!(42)).is_empty());
        assert!(MistralChatParser.parse(&json!({"choices": []})).is_empty());
    }

    #[test]
    fn anthropic_event_sequence() {
        let p = AnthropicMessagesParser;
        let start = p.parse(&json!({
            "type": "message_start",
            "message": {"id": "msg_1", "model": "claude-3-5-sonnet-20241022",
                        "usage": {"input_tokens": 12, "output_tokens": 1}}
        }));
        assert_eq!(start.response_id.as_deref(), Some("msg_1"));
        assert_eq!(start.usage, Some(Usage::new(12, 1)));

        let tool = p.parse(&json!({
            "type": "content_block_start", "index": 1,
            "content_block": {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {}}
        }));
        assert_eq!(
            tool.tool_call_fragments,
            vec![ToolCallFragment::open(1, "toolu_1", "lookup")]
        );

        let args = p.parse(&json!({
            "type": "content_block_delta", "index": 1,
            "delta": {"type": "input_json_delta", "partial_json": "{\"q\":1}"}
        }));
        assert_eq!(
            args.tool_call_fragments,
            vec![ToolCallFragment::arguments(1, "{\"q\":1}")]
        );

        let end = p.parse(&json!({
            "type": "message_delta",
            "delta": {"stop_reason": "tool_use"},
            "usage": {"output_tokens": 30}
        }));
        assert_eq!(end.finish_reason.as_deref(), Some("tool_use"));
        assert_eq!(
            end.usage,
            Some(Usage {
                input_tokens: None,
                output_tokens: Some(30)
            })
        );

        assert!(p.parse(&json!({"type": "ping"})).is_empty());
    }

    #[test]
    fn provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("cohere".parse::<Provider>().is_err());
    }
}
