//! GenAI semantic convention keys for LLM call telemetry.
//!
//! Follows the OpenTelemetry GenAI semantic conventions where they exist
//! (`gen_ai.operation.name`, `gen_ai.request.model`, `gen_ai.usage.*`, ...)
//! and adds the streaming extras this crate reports (`gen_ai.usage.cost`,
//! `gen_ai.server.time_to_first_token`, `gen_ai.server.time_per_output_token`).
//!
//! Span naming convention: `"{operation} {model}"` (e.g. `"chat gpt-4o"`).

pub use opentelemetry_semantic_conventions::attribute::{SERVER_ADDRESS, SERVER_PORT};
pub use opentelemetry_semantic_conventions::resource::{SERVICE_NAME, TELEMETRY_SDK_NAME};

/// Value reported under `telemetry.sdk.name`.
pub const SDK_NAME: &str = "genai-streamtrace";

pub const DEPLOYMENT_ENVIRONMENT: &str = "deployment.environment";

// --- Request ---

pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";
pub const GEN_AI_SYSTEM: &str = "gen_ai.system";
pub const GEN_AI_REQUEST_MODEL: &str = "gen_ai.request.model";
pub const GEN_AI_REQUEST_IS_STREAM: &str = "gen_ai.request.is_stream";
pub const GEN_AI_REQUEST_TEMPERATURE: &str = "gen_ai.request.temperature";
pub const GEN_AI_REQUEST_TOP_P: &str = "gen_ai.request.top_p";
pub const GEN_AI_REQUEST_MAX_TOKENS: &str = "gen_ai.request.max_tokens";
pub const GEN_AI_REQUEST_SEED: &str = "gen_ai.request.seed";
pub const GEN_AI_REQUEST_FREQUENCY_PENALTY: &str = "gen_ai.request.frequency_penalty";
pub const GEN_AI_REQUEST_PRESENCE_PENALTY: &str = "gen_ai.request.presence_penalty";
pub const GEN_AI_REQUEST_STOP_SEQUENCES: &str = "gen_ai.request.stop_sequences";
pub const GEN_AI_SDK_VERSION: &str = "gen_ai.sdk.version";

// --- Response ---

pub const GEN_AI_RESPONSE_ID: &str = "gen_ai.response.id";
pub const GEN_AI_RESPONSE_MODEL: &str = "gen_ai.response.model";
pub const GEN_AI_RESPONSE_FINISH_REASONS: &str = "gen_ai.response.finish_reasons";
pub const GEN_AI_OUTPUT_TYPE: &str = "gen_ai.output.type";

// --- Usage and timing ---

pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";
pub const GEN_AI_USAGE_TOTAL_TOKENS: &str = "gen_ai.usage.total_tokens";
/// Dollar cost of the call, from the pricing table.
pub const GEN_AI_USAGE_COST: &str = "gen_ai.usage.cost";
/// Seconds from request start to the first streamed chunk.
pub const GEN_AI_SERVER_TTFT: &str = "gen_ai.server.time_to_first_token";
/// Mean seconds between consecutive streamed chunks.
pub const GEN_AI_SERVER_TBT: &str = "gen_ai.server.time_per_output_token";

// --- Tool calls ---

pub const GEN_AI_TOOL_NAME: &str = "gen_ai.tool.name";
pub const GEN_AI_TOOL_CALL_ID: &str = "gen_ai.tool.call.id";
pub const GEN_AI_TOOL_ARGS: &str = "gen_ai.tool.args";

// --- Content events ---

pub const GEN_AI_CONTENT_PROMPT_EVENT: &str = "gen_ai.content.prompt";
pub const GEN_AI_CONTENT_PROMPT: &str = "gen_ai.prompt";
pub const GEN_AI_CONTENT_COMPLETION_EVENT: &str = "gen_ai.content.completion";
pub const GEN_AI_CONTENT_COMPLETION: &str = "gen_ai.completion";
pub const GEN_AI_CONTENT_TOOL_CALLS: &str = "gen_ai.completion.tool_calls";

// --- Operation and system values ---

pub const OP_CHAT: &str = "chat";
pub const OP_EMBEDDINGS: &str = "embeddings";
pub const OP_IMAGE: &str = "image";
pub const OP_AUDIO: &str = "audio";

pub const SYSTEM_OPENAI: &str = "openai";
pub const SYSTEM_ANTHROPIC: &str = "anthropic";
pub const SYSTEM_MISTRAL: &str = "mistral";

pub const OUTPUT_TYPE_TEXT: &str = "text";
pub const OUTPUT_TYPE_TOOL_CALLS: &str = "tool_calls";

/// Span name for a GenAI operation against a model.
pub fn span_name(operation: &str, model: &str) -> String {
    format!("{operation} {model}")
}
