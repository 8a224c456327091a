//! Metric instrument factories for genai-streamtrace.
//!
//! Uses the OTel Meter API. [`GenAiInstruments::global`] builds every
//! instrument from the `"genai-streamtrace"` meter of the globally-registered
//! `MeterProvider`.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for genai-streamtrace instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("genai-streamtrace")
}

/// Counter: number of GenAI requests.
pub fn requests(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("gen_ai.requests")
        .with_description("Number of requests to GenAI providers")
        .build()
}

/// Counter: prompt tokens consumed.
pub fn input_tokens(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("gen_ai.usage.input_tokens")
        .with_description("Number of prompt tokens processed")
        .build()
}

/// Counter: completion tokens produced.
pub fn output_tokens(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter("gen_ai.usage.output_tokens")
        .with_description("Number of completion tokens processed")
        .build()
}

/// Histogram: total tokens per request.
pub fn token_usage(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Measures number of input and output tokens used")
        .with_unit("{token}")
        .build()
}

/// Histogram: dollar cost per request.
pub fn cost(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("gen_ai.usage.cost")
        .with_description("The distribution of GenAI request costs")
        .with_unit("USD")
        .build()
}

/// Histogram: end-to-end request duration in seconds.
pub fn operation_duration(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("GenAI operation duration")
        .with_unit("s")
        .build()
}

/// Histogram: time to first streamed chunk in seconds.
pub fn time_to_first_token(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("gen_ai.server.time_to_first_token")
        .with_description("Time to generate first token for successful responses")
        .with_unit("s")
        .build()
}

/// Histogram: mean time between streamed chunks in seconds.
pub fn time_per_output_token(meter: &Meter) -> Histogram<f64> {
    meter
        .f64_histogram("gen_ai.server.time_per_output_token")
        .with_description("Time per output token generated after the first token")
        .with_unit("s")
        .build()
}

/// The full instrument set a finalized stream reports into.
#[derive(Clone)]
pub struct GenAiInstruments {
    pub requests: Counter<u64>,
    pub input_tokens: Counter<u64>,
    pub output_tokens: Counter<u64>,
    pub token_usage: Histogram<f64>,
    pub cost: Histogram<f64>,
    pub operation_duration: Histogram<f64>,
    pub time_to_first_token: Histogram<f64>,
    pub time_per_output_token: Histogram<f64>,
}

impl GenAiInstruments {
    /// Build all instruments from the given meter.
    pub fn new(meter: &Meter) -> Self {
        Self {
            requests: requests(meter),
            input_tokens: input_tokens(meter),
            output_tokens: output_tokens(meter),
            token_usage: token_usage(meter),
            cost: cost(meter),
            operation_duration: operation_duration(meter),
            time_to_first_token: time_to_first_token(meter),
            time_per_output_token: time_per_output_token(meter),
        }
    }

    /// Build all instruments from the global meter provider.
    pub fn global() -> Self {
        Self::new(&meter())
    }
}
