//! Incremental reconstruction of one logical response from its deltas.

use super::delta::Delta;
use super::tool_calls::{ToolCall, ToolCallReassembler};

/// The reconstructed response, as seen by the finalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccumulatedResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
    pub response_id: Option<String>,
    pub response_model: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl AccumulatedResponse {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Running state for one stream.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    text: String,
    tool_calls: ToolCallReassembler,
    finish_reason: Option<String>,
    response_id: Option<String>,
    response_model: Option<String>,
    input_tokens: u64,
    output_tokens: u64,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta in. Present scalar fields overwrite (last writer wins),
    /// text appends, tool-call fragments go to the reassembler.
    pub fn apply(&mut self, delta: Delta) {
        if let Some(text) = delta.text_fragment {
            self.text.push_str(&text);
        }
        for fragment in delta.tool_call_fragments {
            self.tool_calls.apply(fragment);
        }
        if let Some(reason) = delta.finish_reason {
            self.finish_reason = Some(reason);
        }
        if let Some(id) = delta.response_id {
            self.response_id = Some(id);
        }
        if let Some(model) = delta.response_model {
            self.response_model = Some(model);
        }
        if let Some(usage) = delta.usage {
            if let Some(n) = usage.input_tokens {
                self.input_tokens = n;
            }
            if let Some(n) = usage.output_tokens {
                self.output_tokens = n;
            }
        }
    }

    pub fn snapshot(&self) -> AccumulatedResponse {
        AccumulatedResponse {
            text: self.text.clone(),
            tool_calls: self.tool_calls.snapshot(),
            finish_reason: self.finish_reason.clone(),
            response_id: self.response_id.clone(),
            response_model: self.response_model.clone(),
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}
