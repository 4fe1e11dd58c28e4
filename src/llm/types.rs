//! Identification response types.

use serde::Serialize;

/// Raw text returned by the vision model, plus request bookkeeping.
///
/// Immutable once created; held only long enough to parse and render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentificationResult {
    pub text: String,
    pub provider: String,
    pub model: String,
    pub latency_ms: u128,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Estimated request cost in dollars given per-million token prices.
    pub fn estimated_cost(&self, input_per_million: f64, output_per_million: f64) -> f64 {
        (self.input_tokens as f64 * input_per_million
            + self.output_tokens as f64 * output_per_million)
            / 1_000_000.0
    }

    pub(crate) fn log(&self, input_per_million: f64, output_per_million: f64) {
        log::info!("[LLM] Input tokens: {}", self.input_tokens);
        log::info!("[LLM] Output tokens: {}", self.output_tokens);
        log::info!(
            "[LLM] Estimated cost: ${:.6}",
            self.estimated_cost(input_per_million, output_per_million)
        );
    }
}
