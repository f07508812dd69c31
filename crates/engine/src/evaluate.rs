//! Evaluation of owner and entitlement modules against resolved wallets

use crate::args::QueryDescriptor;
use crate::evaluator::RuleEvaluator;
use chainauth_core::{Address, Entitlement, EntitlementData, Permission, Result};

/// Whether the resolved wallets of `query` are granted its permission by `data`.
///
/// The owner holds every permission. An `Ownership` query is decided by the
/// owner check alone.
pub async fn evaluate_with_entitlements(
    evaluator: &dyn RuleEvaluator,
    query: &QueryDescriptor,
    data: &EntitlementData,
) -> Result<bool> {
    let wallets = query.linked_wallets();

    if let Some(owner) = wallets.iter().find(|wallet| **wallet == data.owner) {
        tracing::debug!(
            owner = %owner,
            principal = %query.principal(),
            "Owner is entitled"
        );
        return Ok(true);
    }

    if query.permission() == Permission::Ownership {
        return Ok(false);
    }

    evaluate_entitlement_data(evaluator, &data.entitlements, wallets).await
}

/// True as soon as any entitlement module admits any of `wallets`
pub async fn evaluate_entitlement_data(
    evaluator: &dyn RuleEvaluator,
    entitlements: &[Entitlement],
    wallets: &[Address],
) -> Result<bool> {
    for entitlement in entitlements {
        match entitlement {
            Entitlement::Rule(rule) => {
                let rule = evaluator.convert_v1(rule)?;
                if evaluator.evaluate_rule_data(wallets, &rule).await? {
                    tracing::debug!("Rule entitlement is true");
                    return Ok(true);
                }
            }
            Entitlement::RuleV2(rule) => {
                if evaluator.evaluate_rule_data(wallets, rule).await? {
                    tracing::debug!("Rule entitlement v2 is true");
                    return Ok(true);
                }
            }
            Entitlement::User(users) => {
                if users.contains(&Address::EVERYONE) {
                    tracing::debug!("User entitlement: everyone is entitled");
                    return Ok(true);
                }
                if let Some(wallet) = wallets.iter().find(|wallet| users.contains(wallet)) {
                    tracing::debug!(wallet = %wallet, "User entitlement: wallet is entitled");
                    return Ok(true);
                }
            }
            Entitlement::Unknown { module_type } => {
                tracing::warn!(module_type = %module_type, "Invalid entitlement type");
            }
        }
    }
    Ok(false)
}
