//! # genai-streamtrace
//!
//! Telemetry for streamed generative-AI provider responses.
//!
//! Wraps a chunk-by-chunk provider stream so every chunk reaches the caller
//! unchanged while the response is reconstructed on the side, then reports
//! one span and one set of metrics per call: token usage, cost, time to
//! first token, time between tokens and (optionally) the captured content.

pub mod config;
pub mod error;
pub mod pricing;
pub mod stream;
pub mod telemetry;
