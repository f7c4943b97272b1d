//! Model pricing registry.
//!
//! Maps Anthropic model identifiers to pricing tiers and tiers to per-million-token
//! rates. The built-in table has to be kept current with upstream pricing by hand;
//! [`PricingTable::register_model`] and [`PricingTable::set_rates`] cover models and
//! price changes the built-in table does not know about yet.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Pricing classification a model identifier resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Opus,
    Sonnet,
    Haiku3,
    Haiku35,
}

/// USD per million tokens, positionally aligned with the usage counters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenRates {
    pub input: f64,
    pub output: f64,
    pub cache_write: f64,
    pub cache_read: f64,
}

impl TokenRates {
    pub const fn new(input: f64, output: f64, cache_write: f64, cache_read: f64) -> Self {
        Self {
            input,
            output,
            cache_write,
            cache_read,
        }
    }
}

/// Lookup table from model identifier to tier, and from tier to rates.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelTier>,
    rates: HashMap<ModelTier, TokenRates>,
}

impl PricingTable {
    /// Create an empty table with no models and no rates.
    pub fn empty() -> Self {
        Self {
            models: HashMap::new(),
            rates: HashMap::new(),
        }
    }

    /// Create a table with the built-in models and rates.
    pub fn new() -> Self {
        let mut table = Self::empty();
        table.initialize_defaults();
        table
    }

    fn initialize_defaults(&mut self) {
        let models = [
            ("claude-3-opus-20240229", ModelTier::Opus),
            ("claude-3-opus-latest", ModelTier::Opus),
            ("claude-3-5-sonnet-20240620", ModelTier::Sonnet),
            ("claude-3-5-sonnet-20241022", ModelTier::Sonnet),
            ("claude-3-5-sonnet-latest", ModelTier::Sonnet),
            ("claude-3-haiku-20240307", ModelTier::Haiku3),
            ("claude-3-5-haiku-20241022", ModelTier::Haiku35),
            ("claude-3-5-haiku-latest", ModelTier::Haiku35),
        ];
        for (model, tier) in models {
            self.register_model(model, tier);
        }

        self.set_rates(ModelTier::Opus, TokenRates::new(15.0, 75.0, 18.75, 1.5));
        self.set_rates(ModelTier::Sonnet, TokenRates::new(3.0, 15.0, 3.75, 0.3));
        self.set_rates(ModelTier::Haiku3, TokenRates::new(0.25, 1.25, 0.3, 0.03));
        self.set_rates(ModelTier::Haiku35, TokenRates::new(1.0, 3.0, 1.25, 0.1));
    }

    /// Register (or re-map) a model identifier to a tier.
    pub fn register_model(&mut self, model: impl Into<String>, tier: ModelTier) {
        self.models.insert(model.into(), tier);
    }

    /// Set the rates charged for a tier.
    pub fn set_rates(&mut self, tier: ModelTier, rates: TokenRates) {
        self.rates.insert(tier, rates);
    }

    /// Resolve the tier of a model identifier.
    pub fn tier(&self, model: &str) -> Option<ModelTier> {
        self.models.get(model).copied()
    }

    /// Resolve the rates charged for a model identifier.
    pub fn rates_for(&self, model: &str) -> Option<TokenRates> {
        self.tier(model).and_then(|tier| self.rates.get(&tier).copied())
    }

    /// Whether the model identifier resolves to priced rates.
    pub fn is_registered(&self, model: &str) -> bool {
        self.rates_for(model).is_some()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        DEFAULT_PRICING.clone()
    }
}

static DEFAULT_PRICING: LazyLock<PricingTable> = LazyLock::new(PricingTable::new);

/// Get the built-in pricing table.
pub fn default_pricing() -> &'static PricingTable {
    &DEFAULT_PRICING
}
