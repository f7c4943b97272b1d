//! Token usage accounting.

use crate::error::{Result, TooloopError};
use crate::llm::models::Usage;
use crate::llm::pricing::PricingTable;

/// Running token totals for one client, priced with a [`PricingTable`].
///
/// Totals only ever grow; there is no reset.
#[derive(Debug, Clone, Default)]
pub struct UsageLedger {
    totals: Usage,
    pricing: PricingTable,
}

impl UsageLedger {
    /// Create a ledger that prices usage with the given table
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            totals: Usage::default(),
            pricing,
        }
    }

    /// Add one usage report to the running totals. A missing report counts as zero.
    pub fn record(&mut self, usage: Option<&Usage>) {
        let Some(usage) = usage else {
            return;
        };
        self.totals.input_tokens += usage.input_tokens;
        self.totals.output_tokens += usage.output_tokens;
        self.totals.cache_creation_input_tokens += usage.cache_creation_input_tokens;
        self.totals.cache_read_input_tokens += usage.cache_read_input_tokens;
    }

    /// Accumulated totals
    pub fn totals(&self) -> Usage {
        self.totals
    }

    /// The pricing table in use
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Mutable access to the pricing table, for registering models
    pub fn pricing_mut(&mut self) -> &mut PricingTable {
        &mut self.pricing
    }

    /// Cost in USD of the accumulated usage when billed as `model`.
    ///
    /// Fails with [`TooloopError::ModelNotSupported`] if `model` resolves to no priced tier.
    pub fn cost(&self, model: &str) -> Result<f64> {
        let rates = self
            .pricing
            .rates_for(model)
            .ok_or_else(|| TooloopError::ModelNotSupported(model.to_string()))?;

        let t = &self.totals;
        Ok((t.input_tokens as f64 * rates.input
            + t.output_tokens as f64 * rates.output
            + t.cache_creation_input_tokens as f64 * rates.cache_write
            + t.cache_read_input_tokens as f64 * rates.cache_read)
            / 1_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::pricing::{ModelTier, TokenRates};

    const SONNET: &str = "claude-3-5-sonnet-20241022";

    fn usage(input: u64, output: u64, write: u64, read: u64) -> Usage {
        Usage {
            input_tokens: input,
            output_tokens: output,
            cache_creation_input_tokens: write,
            cache_read_input_tokens: read,
        }
    }

    #[test]
    fn test_record_accumulates() {
        let mut ledger = UsageLedger::default();
        ledger.record(Some(&usage(10, 5, 0, 0)));
        ledger.record(Some(&usage(3, 2, 7, 11)));

        assert_eq!(ledger.totals(), usage(13, 7, 7, 11));
    }

    #[test]
    fn test_record_missing_report() {
        let mut ledger = UsageLedger::default();
        ledger.record(Some(&usage(1, 1, 1, 1)));
        ledger.record(None);
        assert_eq!(ledger.totals(), usage(1, 1, 1, 1));
    }

    #[test]
    fn test_cost_empty_ledger() {
        let ledger = UsageLedger::default();
        assert_eq!(ledger.cost(SONNET).unwrap(), 0.0);
    }

    #[test]
    fn test_cost_all_counters() {
        let mut ledger = UsageLedger::default();
        ledger.record(Some(&usage(1_000_000, 1_000_000, 1_000_000, 1_000_000)));
        let cost = ledger.cost(SONNET).unwrap();
        assert!((cost - (3.0 + 15.0 + 3.75 + 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_cost_input_output() {
        let mut ledger = UsageLedger::default();
        ledger.record(Some(&usage(10, 5, 0, 0)));
        let cost = ledger.cost(SONNET).unwrap();
        assert!((cost - (10.0 * 3.0 + 5.0 * 15.0) / 1e6).abs() < 1e-15);
    }

    #[test]
    fn test_cost_is_idempotent() {
        let mut ledger = UsageLedger::default();
        ledger.record(Some(&usage(120, 40, 0, 0)));
        assert_eq!(ledger.cost(SONNET).unwrap(), ledger.cost(SONNET).unwrap());
    }

    #[test]
    fn test_cost_unknown_model() {
        let ledger = UsageLedger::default();
        match ledger.cost("gpt-4o") {
            Err(TooloopError::ModelNotSupported(model)) => assert_eq!(model, "gpt-4o"),
            other => panic!("Expected ModelNotSupported, got {:?}", other),
        }
    }

    #[test]
    fn test_cost_with_custom_pricing() {
        let mut pricing = PricingTable::empty();
        pricing.register_model("my-model", ModelTier::Opus);
        pricing.set_rates(ModelTier::Opus, TokenRates::new(2.0, 0.0, 0.0, 0.0));

        let mut ledger = UsageLedger::new(pricing);
        ledger.record(Some(&usage(500_000, 100, 100, 100)));
        assert!((ledger.cost("my-model").unwrap() - 1.0).abs() < 1e-12);
    }
}
