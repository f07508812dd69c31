//! Seam to the cross-chain rule evaluator

use async_trait::async_trait;
use chainauth_core::{Address, Result, RuleDataV1, RuleDataV2};

/// Evaluates rule entitlements against a set of wallets.
///
/// Rule trees can reference contracts on other chains, so evaluation lives
/// outside this crate.
#[async_trait]
pub trait RuleEvaluator: Send + Sync {
    /// Whether any of `wallets` satisfies `rule`
    async fn evaluate_rule_data(&self, wallets: &[Address], rule: &RuleDataV2) -> Result<bool>;

    /// Upgrade a legacy rule to the current layout
    fn convert_v1(&self, rule: &RuleDataV1) -> Result<RuleDataV2>;
}
