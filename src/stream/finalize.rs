//! Turning an accumulated stream into span attributes and metric updates.

use std::sync::Arc;

use opentelemetry::trace::Status;
use opentelemetry::{Array, KeyValue, StringValue, Value};

use super::accumulator::AccumulatedResponse;
use super::context::RequestContext;
use super::timing::TimingSummary;
use crate::error::Result;
use crate::pricing::CostLookup;
use crate::telemetry::emit::{Emitter, Instrument, MetricUpdate, SpanHandle};
use crate::telemetry::genai;

/// How the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The wrapped stream reached its end.
    Completed,
    /// The caller closed or dropped the proxy before the end.
    Abandoned,
    /// The wrapped stream yielded an error; carries its display text.
    Failed(String),
}

impl StreamOutcome {
    fn status(&self) -> Status {
        match self {
            StreamOutcome::Completed | StreamOutcome::Abandoned => Status::Ok,
            StreamOutcome::Failed(description) => Status::error(description.clone()),
        }
    }
}

/// Everything one stream reports, before it is handed to an emitter.
#[derive(Debug, Clone)]
pub struct FinalizedTelemetry {
    pub attributes: Vec<KeyValue>,
    pub events: Vec<(&'static str, Vec<KeyValue>)>,
    pub metric_attributes: Vec<KeyValue>,
    pub metrics: Vec<MetricUpdate>,
}

/// Builds and submits a stream's telemetry. Shared by every stream that
/// reports into the same emitter.
#[derive(Clone)]
pub struct Finalizer {
    emitter: Arc<dyn Emitter>,
    pricing: Arc<dyn CostLookup>,
}

impl Finalizer {
    pub fn new(emitter: Arc<dyn Emitter>, pricing: Arc<dyn CostLookup>) -> Self {
        Self { emitter, pricing }
    }

    pub fn emitter(&self) -> &dyn Emitter {
        self.emitter.as_ref()
    }

    /// Compute attributes, content events and metric updates.
    pub fn build(
        &self,
        response: &AccumulatedResponse,
        timing: &TimingSummary,
        ctx: &RequestContext,
    ) -> Result<FinalizedTelemetry> {
        let model = response
            .response_model
            .as_deref()
            .unwrap_or(ctx.request_model.as_str());

        let cost = self
            .pricing
            .cost(model, response.input_tokens, response.output_tokens)
            .unwrap_or_else(|e| {
                tracing::warn!(model, error = %e, "cost lookup failed, reporting zero cost");
                0.0
            });

        let ttft = timing.ttft.as_secs_f64();
        let tbt = timing.tbt.as_secs_f64();

        let mut attributes = vec![
            KeyValue::new(genai::TELEMETRY_SDK_NAME, genai::SDK_NAME),
            KeyValue::new(genai::GEN_AI_OPERATION_NAME, ctx.operation.as_str()),
            KeyValue::new(genai::GEN_AI_SYSTEM, ctx.system.clone()),
            KeyValue::new(genai::GEN_AI_REQUEST_MODEL, ctx.request_model.clone()),
            KeyValue::new(genai::GEN_AI_RESPONSE_MODEL, model.to_string()),
            KeyValue::new(genai::SERVER_ADDRESS, ctx.server_address.clone()),
            KeyValue::new(genai::SERVER_PORT, i64::from(ctx.server_port)),
            KeyValue::new(genai::GEN_AI_USAGE_INPUT_TOKENS, tokens(response.input_tokens)),
            KeyValue::new(genai::GEN_AI_USAGE_OUTPUT_TOKENS, tokens(response.output_tokens)),
            KeyValue::new(genai::GEN_AI_USAGE_TOTAL_TOKENS, tokens(response.total_tokens())),
            KeyValue::new(genai::GEN_AI_USAGE_COST, cost),
            KeyValue::new(genai::GEN_AI_SERVER_TTFT, ttft),
            KeyValue::new(genai::GEN_AI_SERVER_TBT, tbt),
            KeyValue::new(genai::GEN_AI_REQUEST_IS_STREAM, true),
            KeyValue::new(genai::GEN_AI_SDK_VERSION, ctx.sdk_version.clone()),
            KeyValue::new(genai::DEPLOYMENT_ENVIRONMENT, ctx.environment.clone()),
            KeyValue::new(genai::SERVICE_NAME, ctx.application_name.clone()),
        ];

        if let Some(id) = &response.response_id {
            attributes.push(KeyValue::new(genai::GEN_AI_RESPONSE_ID, id.clone()));
        }
        if let Some(reason) = &response.finish_reason {
            attributes.push(KeyValue::new(
                genai::GEN_AI_RESPONSE_FINISH_REASONS,
                string_array([reason.clone()]),
            ));
        }
        let output_type = if response.text.is_empty() && !response.tool_calls.is_empty() {
            genai::OUTPUT_TYPE_TOOL_CALLS
        } else {
            genai::OUTPUT_TYPE_TEXT
        };
        attributes.push(KeyValue::new(genai::GEN_AI_OUTPUT_TYPE, output_type));
        push_request_options(&mut attributes, ctx);

        let mut events = Vec::new();
        if ctx.capture_content {
            events.push((
                genai::GEN_AI_CONTENT_PROMPT_EVENT,
                vec![KeyValue::new(genai::GEN_AI_CONTENT_PROMPT, ctx.prompt_text.clone())],
            ));

            let mut completion = vec![KeyValue::new(
                genai::GEN_AI_CONTENT_COMPLETION,
                response.text.clone(),
            )];
            if !response.tool_calls.is_empty() {
                let calls = &response.tool_calls;
                attributes.push(KeyValue::new(
                    genai::GEN_AI_TOOL_NAME,
                    string_array(calls.iter().map(|c| c.name.clone())),
                ));
                attributes.push(KeyValue::new(
                    genai::GEN_AI_TOOL_CALL_ID,
                    string_array(calls.iter().map(|c| c.id.clone())),
                ));
                attributes.push(KeyValue::new(
                    genai::GEN_AI_TOOL_ARGS,
                    string_array(calls.iter().map(|c| c.arguments.clone())),
                ));
                completion.push(KeyValue::new(
                    genai::GEN_AI_CONTENT_TOOL_CALLS,
                    serde_json::to_string(calls)?,
                ));
            }
            events.push((genai::GEN_AI_CONTENT_COMPLETION_EVENT, completion));
        }

        let metric_attributes = vec![
            KeyValue::new(genai::SERVICE_NAME, ctx.application_name.clone()),
            KeyValue::new(genai::DEPLOYMENT_ENVIRONMENT, ctx.environment.clone()),
            KeyValue::new(genai::GEN_AI_OPERATION_NAME, ctx.operation.as_str()),
            KeyValue::new(genai::GEN_AI_SYSTEM, ctx.system.clone()),
            KeyValue::new(genai::GEN_AI_REQUEST_MODEL, ctx.request_model.clone()),
            KeyValue::new(genai::GEN_AI_RESPONSE_MODEL, model.to_string()),
            KeyValue::new(genai::SERVER_ADDRESS, ctx.server_address.clone()),
            KeyValue::new(genai::SERVER_PORT, i64::from(ctx.server_port)),
        ];

        let metrics = if ctx.disable_metrics {
            Vec::new()
        } else {
            vec![
                MetricUpdate::Add {
                    instrument: Instrument::Requests,
                    value: 1,
                },
                MetricUpdate::Add {
                    instrument: Instrument::InputTokens,
                    value: response.input_tokens,
                },
                MetricUpdate::Add {
                    instrument: Instrument::OutputTokens,
                    value: response.output_tokens,
                },
                MetricUpdate::Record {
                    instrument: Instrument::TokenUsage,
                    value: response.total_tokens() as f64,
                },
                MetricUpdate::Record {
                    instrument: Instrument::Cost,
                    value: cost,
                },
                MetricUpdate::Record {
                    instrument: Instrument::OperationDuration,
                    value: timing.duration.as_secs_f64(),
                },
                MetricUpdate::Record {
                    instrument: Instrument::TimeToFirstToken,
                    value: ttft,
                },
                MetricUpdate::Record {
                    instrument: Instrument::TimePerOutputToken,
                    value: tbt,
                },
            ]
        };

        Ok(FinalizedTelemetry {
            attributes,
            events,
            metric_attributes,
            metrics,
        })
    }

    /// Build, submit and close the span. Never fails: telemetry errors are
    /// logged and the span is still ended.
    pub fn finalize(
        &self,
        span: &mut dyn SpanHandle,
        response: &AccumulatedResponse,
        timing: &TimingSummary,
        ctx: &RequestContext,
        outcome: &StreamOutcome,
    ) {
        match self.build(response, timing, ctx) {
            Ok(telemetry) => self.submit(span, telemetry),
            Err(e) => {
                tracing::warn!(model = %ctx.request_model, error = %e, "failed to build stream telemetry");
            }
        }
        span.set_status(outcome.status());
        span.end();
    }

    fn submit(&self, span: &mut dyn SpanHandle, telemetry: FinalizedTelemetry) {
        for attribute in telemetry.attributes {
            span.set_attribute(attribute);
        }
        for (name, attributes) in telemetry.events {
            span.add_event(name, attributes);
        }
        for update in &telemetry.metrics {
            if let Err(e) = self.emitter.record(update, &telemetry.metric_attributes) {
                tracing::warn!(
                    instrument = update.instrument().name(),
                    error = %e,
                    "failed to record stream metric"
                );
            }
        }
    }
}

fn tokens(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn string_array(items: impl IntoIterator<Item = String>) -> Value {
    Value::Array(Array::String(
        items.into_iter().map(StringValue::from).collect(),
    ))
}

fn push_request_options(attributes: &mut Vec<KeyValue>, ctx: &RequestContext) {
    let o = &ctx.options;
    if let Some(v) = o.temperature {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_TEMPERATURE, v));
    }
    if let Some(v) = o.top_p {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_TOP_P, v));
    }
    if let Some(v) = o.max_tokens {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_MAX_TOKENS, tokens(v)));
    }
    if let Some(v) = o.seed {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_SEED, v));
    }
    if let Some(v) = o.frequency_penalty {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_FREQUENCY_PENALTY, v));
    }
    if let Some(v) = o.presence_penalty {
        attributes.push(KeyValue::new(genai::GEN_AI_REQUEST_PRESENCE_PENALTY, v));
    }
    if !o.stop_sequences.is_empty() {
        attributes.push(KeyValue::new(
            genai::GEN_AI_REQUEST_STOP_SEQUENCES,
            string_array(o.stop_sequences.iter().cloned()),
        ));
    }
}
