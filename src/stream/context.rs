//! Request context supplied by the caller when a stream is wrapped.

use serde_json::Value;

use super::parsers::Provider;
use crate::telemetry::genai;

/// Kind of GenAI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Chat,
    Embeddings,
    Image,
    Audio,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Chat => genai::OP_CHAT,
            Operation::Embeddings => genai::OP_EMBEDDINGS,
            Operation::Image => genai::OP_IMAGE,
            Operation::Audio => genai::OP_AUDIO,
        }
    }
}

/// Sampling options the caller requested. Only set options are reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<u64>,
    pub seed: Option<i64>,
    pub frequency_penalty: Option<f64>,
    pub presence_penalty: Option<f64>,
    pub stop_sequences: Vec<String>,
}

impl RequestOptions {
    /// Pick the recognized options out of a request body.
    pub fn from_request_body(body: &Value) -> Self {
        let f = |key: &str| body.get(key).and_then(Value::as_f64);
        let stop_sequences = match body.get("stop").or_else(|| body.get("stop_sequences")) {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        };
        Self {
            temperature: f("temperature"),
            top_p: f("top_p"),
            max_tokens: body.get("max_tokens").and_then(Value::as_u64),
            seed: body.get("seed").and_then(Value::as_i64),
            frequency_penalty: f("frequency_penalty"),
            presence_penalty: f("presence_penalty"),
            stop_sequences,
        }
    }
}

/// Process-wide defaults, usually from [`Config`](crate::config::Config).
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub application_name: String,
    pub environment: String,
    pub capture_content: bool,
    pub disable_metrics: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            application_name: "default".to_string(),
            environment: "default".to_string(),
            capture_content: true,
            disable_metrics: false,
        }
    }
}

/// Everything the finalizer needs to know about the originating request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub operation: Operation,
    /// `gen_ai.system` value, e.g. `"openai"`.
    pub system: String,
    pub request_model: String,
    pub server_address: String,
    pub server_port: u16,
    pub capture_content: bool,
    pub disable_metrics: bool,
    pub application_name: String,
    pub environment: String,
    pub sdk_version: String,
    pub prompt_text: String,
    pub options: RequestOptions,
}

impl RequestContext {
    pub fn new(system: impl Into<String>, request_model: impl Into<String>) -> Self {
        let defaults = RequestDefaults::default();
        Self {
            operation: Operation::Chat,
            system: system.into(),
            request_model: request_model.into(),
            server_address: String::new(),
            server_port: 0,
            capture_content: defaults.capture_content,
            disable_metrics: defaults.disable_metrics,
            application_name: defaults.application_name,
            environment: defaults.environment,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            prompt_text: String::new(),
            options: RequestOptions::default(),
        }
    }

    /// Context for a built-in provider, with its default server.
    pub fn for_provider(provider: Provider, request_model: impl Into<String>) -> Self {
        let (address, port) = provider.default_server();
        Self::new(provider.system(), request_model).server(address, port)
    }

    pub fn defaults(mut self, defaults: RequestDefaults) -> Self {
        self.application_name = defaults.application_name;
        self.environment = defaults.environment;
        self.capture_content = defaults.capture_content;
        self.disable_metrics = defaults.disable_metrics;
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn server(mut self, address: impl Into<String>, port: u16) -> Self {
        self.server_address = address.into();
        self.server_port = port;
        self
    }

    pub fn capture_content(mut self, capture: bool) -> Self {
        self.capture_content = capture;
        self
    }

    pub fn disable_metrics(mut self, disable: bool) -> Self {
        self.disable_metrics = disable;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn sdk_version(mut self, version: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self
    }

    pub fn prompt(mut self, prompt_text: impl Into<String>) -> Self {
        self.prompt_text = prompt_text.into();
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Span name, `"{operation} {request_model}"`.
    pub fn span_name(&self) -> String {
        genai::span_name(self.operation.as_str(), &self.request_model)
    }
}

/// Render a chat message list as `role: content` lines.
///
/// Multi-part content is joined with `", "`; text parts render as
/// `text: ...` and image parts as `image_url: ...`. Inline `data:` images
/// are left out.
pub fn format_prompt(messages: &Value) -> String {
    let Some(messages) = messages.as_array() else {
        return String::new();
    };

    messages
        .iter()
        .filter_map(|message| {
            let role = message.get("role").and_then(Value::as_str)?;
            let content = match message.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Array(parts)) => parts
                    .iter()
                    .filter_map(format_part)
                    .collect::<Vec<_>>()
                    .join(", "),
                _ => String::new(),
            };
            Some(format!("{role}: {content}"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_part(part: &Value) -> Option<String> {
    match part.get("type").and_then(Value::as_str) {
        Some("text") => part
            .get("text")
            .and_then(Value::as_str)
            .map(|t| format!("text: {t}")),
        Some("image_url") => {
            let url = match part.get("image_url") {
                Some(Value::String(url)) => url.as_str(),
                Some(obj) => obj.get("url").and_then(Value::as_str)?,
                None => return None,
            };
            (!url.starts_with("data:")).then(|| format!("image_url: {url}"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn formats_plain_and_multipart_messages() {
        let messages = json!([
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": [
                {"type": "text", "text": "What is this?"},
                {"type": "image_url", "image_url": {"url": "https://example.com/cat.png"}},
                {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAAA"}}
            ]}
        ]);
        assert_eq!(
            format_prompt(&messages),
            "system: Be brief.\nuser: text: What is this?, image_url: https://example.com/cat.png"
        );
    }

    #[test]
    fn options_from_request_body() {
        let options = RequestOptions::from_request_body(&json!({
            "model": "gpt-4o",
            "temperature": 0.2,
            "max_tokens": 256,
            "stop": "\n\n"
        }));
        assert_eq!(options.temperature, Some(0.2));
        assert_eq!(options.max_tokens, Some(256));
        assert_eq!(options.stop_sequences, vec!["\n\n".to_string()]);
        assert_eq!(options.top_p, None);
    }
}
