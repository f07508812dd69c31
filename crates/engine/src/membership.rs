//! Parallel membership checks across linked wallets
//!
//! Each linked wallet is looked up in its own task. The first wallet holding
//! an unexpired membership settles the check and the remaining lookups are
//! aborted. Lookup errors only matter when no wallet turned out to be a
//! member at all.

use crate::args::QueryDescriptor;
use crate::cache_value::CachedResult;
use crate::chain_auth::Inner;
use crate::metrics::CacheFunction;
use chainauth_core::{
    Address, EntitlementResultReason, Error, MembershipStatus, Result, StreamId, TokenId,
};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Outcome of the membership stage
#[derive(Debug)]
pub(crate) enum MembershipCheck {
    /// At least one wallet holds an unexpired membership
    Member { token_ids: Vec<TokenId> },
    Denied(EntitlementResultReason),
}

impl Inner {
    pub(crate) async fn check_membership(
        self: &Arc<Self>,
        query: &QueryDescriptor,
        space_id: &StreamId,
    ) -> Result<MembershipCheck> {
        let mut lookups = JoinSet::new();
        for wallet in query.linked_wallets().iter().copied() {
            let inner = Arc::clone(self);
            let space_id = space_id.clone();
            lookups.spawn(
                async move {
                    let status = inner.wallet_membership(&space_id, wallet).await;
                    (wallet, status)
                }
                .in_current_span(),
            );
        }

        let mut is_member = false;
        let mut is_active = false;
        let mut token_ids = Vec::new();
        let mut errors = Vec::new();

        while let Some(joined) = lookups.join_next().await {
            match joined {
                Ok((_, Ok(status))) => {
                    if status.is_member {
                        is_member = true;
                        token_ids.extend(status.token_ids.iter().cloned());
                        if !status.is_expired {
                            is_active = true;
                            lookups.abort_all();
                            break;
                        }
                    }
                }
                Ok((wallet, Err(e))) => {
                    tracing::info!(
                        wallet = %wallet,
                        space_id = %space_id,
                        error = %e,
                        "Error checking membership"
                    );
                    errors.push(e);
                }
                Err(e) if e.is_panic() => {
                    errors.push(Error::internal(format!("membership lookup panicked: {e}")));
                }
                Err(_) => {}
            }
        }

        if !is_member {
            if errors.is_empty() {
                tracing::debug!(
                    principal = %query.principal(),
                    space_id = %space_id,
                    wallets = query.linked_wallets().len(),
                    "User is not a member of the space"
                );
                return Ok(MembershipCheck::Denied(EntitlementResultReason::Membership));
            }

            let error = Error::CannotCheckEntitlements {
                principal: query.principal(),
                space_id: space_id.clone(),
                sources: errors,
            };
            tracing::error!(
                principal = %query.principal(),
                space_id = %space_id,
                wallets = query.linked_wallets().len(),
                error = %error,
                "User membership could not be evaluated"
            );
            return Err(error);
        }

        if !is_active {
            tracing::debug!(
                principal = %query.principal(),
                space_id = %space_id,
                "Membership expired"
            );
            return Ok(MembershipCheck::Denied(
                EntitlementResultReason::MembershipExpired,
            ));
        }

        Ok(MembershipCheck::Member { token_ids })
    }

    async fn wallet_membership(&self, space_id: &StreamId, wallet: Address) -> Result<MembershipStatus> {
        let key = QueryDescriptor::wallet_membership(space_id, wallet);
        let (result, hit) = self
            .membership_cache
            .execute_using_cache(&key, || async {
                let status = self.space.get_membership_status(space_id, wallet).await?;
                Ok(CachedResult::MembershipStatus { status })
            })
            .await?;
        self.metrics.record(CacheFunction::Membership, hit);
        result.into_membership_status()
    }
}
