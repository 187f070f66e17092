use std::collections::{BTreeMap, HashMap};

use super::models::{Session, TokenUsage};
use crate::shared::config::{Config, PricingConfig};

const TOKENS_PER_MILLION: f64 = 1_000_000.0;

/// USD per million tokens for each priced category. Thinking tokens are never billed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_write_per_million: f64,
    pub cache_read_per_million: f64,
}

impl ModelPricing {
    pub const fn new(input: f64, output: f64, cache_write: f64, cache_read: f64) -> Self {
        Self {
            input_per_million: input,
            output_per_million: output,
            cache_write_per_million: cache_write,
            cache_read_per_million: cache_read,
        }
    }

    /// Cost in USD for the given usage
    pub fn calculate_cost(&self, tokens: &TokenUsage) -> f64 {
        (tokens.input_tokens as f64 / TOKENS_PER_MILLION) * self.input_per_million
            + (tokens.output_tokens as f64 / TOKENS_PER_MILLION) * self.output_per_million
            + (tokens.cache_creation_tokens as f64 / TOKENS_PER_MILLION)
                * self.cache_write_per_million
            + (tokens.cache_read_tokens as f64 / TOKENS_PER_MILLION) * self.cache_read_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        DEFAULT_PRICING
    }
}

impl From<&PricingConfig> for ModelPricing {
    fn from(p: &PricingConfig) -> Self {
        Self::new(
            p.input_per_million,
            p.output_per_million,
            p.cache_write_per_million,
            p.cache_read_per_million,
        )
    }
}

/// Used for any model missing from the table (Sonnet rates)
pub const DEFAULT_PRICING: ModelPricing = ModelPricing::new(3.0, 15.0, 3.75, 0.30);

/// Built-in rates keyed by exact model id
pub struct PricingConstants;

impl PricingConstants {
    pub fn get_model_pricing(model: &str) -> Option<ModelPricing> {
        match model {
            "claude-opus-4-5-20251101" => Some(ModelPricing::new(15.0, 75.0, 18.75, 1.50)),
            "claude-sonnet-4-20250514" => Some(ModelPricing::new(3.0, 15.0, 3.75, 0.30)),
            "claude-3-5-sonnet-20241022" => Some(ModelPricing::new(3.0, 15.0, 3.75, 0.30)),
            "claude-3-opus-20240229" => Some(ModelPricing::new(15.0, 75.0, 18.75, 1.50)),
            "claude-3-haiku-20240307" => Some(ModelPricing::new(0.25, 1.25, 0.30, 0.03)),
            _ => None,
        }
    }
}

/// Estimates session costs from model and token usage
#[derive(Debug, Clone)]
pub struct CostEstimator {
    overrides: HashMap<String, ModelPricing>,
    default_pricing: ModelPricing,
}

impl Default for CostEstimator {
    fn default() -> Self {
        Self::new(HashMap::new(), DEFAULT_PRICING)
    }
}

impl CostEstimator {
    /// `overrides` take precedence over the built-in table;
    /// `default_pricing` covers everything else.
    pub fn new(overrides: HashMap<String, ModelPricing>, default_pricing: ModelPricing) -> Self {
        Self {
            overrides,
            default_pricing,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let overrides = config
            .resolved_model_pricing()
            .iter()
            .map(|(model, p)| (model.clone(), ModelPricing::from(p)))
            .collect();
        Self::new(overrides, ModelPricing::from(&config.default_pricing))
    }

    pub fn get_pricing(&self, model: &str) -> ModelPricing {
        self.overrides
            .get(model)
            .copied()
            .or_else(|| PricingConstants::get_model_pricing(model))
            .unwrap_or(self.default_pricing)
    }

    pub fn calculate_cost(&self, tokens: &TokenUsage, model: &str) -> f64 {
        self.get_pricing(model).calculate_cost(tokens)
    }

    pub fn estimate_session_cost(&self, session: &Session) -> f64 {
        self.calculate_cost(&session.tokens, &session.model)
    }

    pub fn estimate_total_cost<'a>(&self, sessions: impl IntoIterator<Item = &'a Session>) -> f64 {
        sessions
            .into_iter()
            .map(|s| self.estimate_session_cost(s))
            .sum()
    }

    pub fn estimate_cost_by_model<'a>(
        &self,
        sessions: impl IntoIterator<Item = &'a Session>,
    ) -> BTreeMap<String, f64> {
        let mut by_model: BTreeMap<String, f64> = BTreeMap::new();
        for session in sessions {
            *by_model.entry(session.model.clone()).or_insert(0.0) +=
                self.estimate_session_cost(session);
        }
        by_model
    }
}
