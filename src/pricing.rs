//! Cost lookup from a per-model price table.
//!
//! The table uses the common pricing JSON layout, prices in dollars per
//! 1000 tokens:
//!
//! ```json
//! { "chat": { "gpt-4o": { "promptPrice": 0.0025, "completionPrice": 0.01 } } }
//! ```
//!
//! Sections other than `chat` are ignored. Tables are loaded from local
//! files only; there is no built-in default table, so an unconfigured
//! process reports zero cost.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Computes the dollar cost of a call.
pub trait CostLookup: Send + Sync {
    /// Cost of `input_tokens` prompt and `output_tokens` completion tokens on
    /// `model`. An unknown model costs `0.0`.
    fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> Result<f64>;
}

/// Prices for one chat model, per 1000 tokens.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPrice {
    pub prompt_price: f64,
    pub completion_price: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PricingTable {
    #[serde(default)]
    chat: HashMap<String, ChatPrice>,
}

impl PricingTable {
    /// A table with no prices: every lookup costs zero.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(json)
            .map_err(|e| Error::Pricing(format!("invalid pricing json: {e}")))?;
        table.validate()?;
        Ok(table)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = path.to_string_lossy();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Err(Error::Pricing(format!(
                "{raw}: remote pricing sources are not supported, download the file first"
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
            .map_err(|e| Error::Pricing(format!("{}: {e}", path.display())))
    }

    pub fn with_chat_price(mut self, model: impl Into<String>, price: ChatPrice) -> Self {
        self.chat.insert(model.into(), price);
        self
    }

    pub fn chat_price(&self, model: &str) -> Option<ChatPrice> {
        self.chat.get(model).copied()
    }

    fn validate(&self) -> Result<()> {
        for (model, price) in &self.chat {
            let ok = |p: f64| p.is_finite() && p >= 0.0;
            if !ok(price.prompt_price) || !ok(price.completion_price) {
                return Err(Error::Pricing(format!("negative or non-finite price for {model}")));
            }
        }
        Ok(())
    }
}

impl CostLookup for PricingTable {
    fn cost(&self, model: &str, input_tokens: u64, output_tokens: u64) -> Result<f64> {
        let Some(price) = self.chat_price(model) else {
            tracing::debug!(model, "no price entry, reporting zero cost");
            return Ok(0.0);
        };
        Ok((input_tokens as f64 / 1000.0) * price.prompt_price
            + (output_tokens as f64 / 1000.0) * price.completion_price)
    }
}
