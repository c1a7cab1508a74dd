//! Per-model token pricing used when a backend does not report cost.

use crate::domain::models::Usage;

/// Pricing per million tokens for a specific model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Cost per million input tokens (USD).
    pub input: f64,
    /// Cost per million output tokens (USD).
    pub output: f64,
    /// Cost per million cache read tokens (USD).
    pub cache_read: f64,
    /// Cost per million cache write tokens (USD).
    pub cache_write: f64,
}

/// Known model pricing, matched by substring. More specific names come first.
const PRICING_TABLE: &[(&str, ModelPricing)] = &[
    (
        "opus",
        ModelPricing { input: 15.0, output: 75.0, cache_read: 1.5, cache_write: 18.75 },
    ),
    (
        "sonnet",
        ModelPricing { input: 3.0, output: 15.0, cache_read: 0.3, cache_write: 3.75 },
    ),
    (
        "haiku",
        ModelPricing { input: 0.80, output: 4.0, cache_read: 0.08, cache_write: 1.0 },
    ),
    (
        "gpt-4o-mini",
        ModelPricing { input: 0.15, output: 0.60, cache_read: 0.075, cache_write: 0.15 },
    ),
    (
        "gpt-4o",
        ModelPricing { input: 2.50, output: 10.0, cache_read: 1.25, cache_write: 2.50 },
    ),
];

/// Get pricing for a model by name or alias.
///
/// Matches against known model name substrings (e.g. "sonnet" matches
/// "claude-sonnet-4-5-20250929").
pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
    let model_lower = model.to_lowercase();
    PRICING_TABLE
        .iter()
        .find(|(name, _)| model_lower.contains(name))
        .map(|(_, pricing)| *pricing)
}

/// Estimate cost in USD for the reported token usage.
#[allow(clippy::cast_precision_loss)]
pub fn estimate_cost(model: &str, usage: &Usage) -> Option<f64> {
    let pricing = get_model_pricing(model)?;

    let cost = (usage.input_tokens as f64 * pricing.input
        + usage.output_tokens as f64 * pricing.output
        + usage.cache_read_tokens as f64 * pricing.cache_read
        + usage.cache_write_tokens as f64 * pricing.cache_write)
        / 1_000_000.0;

    Some(cost)
}
