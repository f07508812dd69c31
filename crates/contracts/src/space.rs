//! Space contract adapter
//!
//! A space stream id embeds the address of the space diamond, so every read
//! here first resolves that address and then issues facet calls against it.

use crate::marshal::marshal_entitlements;
use crate::reader::{ChainReader, ContractCall};
use async_trait::async_trait;
use chainauth_core::{
    Address, EntitlementData, MembershipStatus, Permission, Result, StreamId, TokenId,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Reads of space and channel state needed for entitlement checks
#[async_trait]
pub trait SpaceContract: Send + Sync {
    async fn is_space_disabled(&self, space_id: &StreamId) -> Result<bool>;

    async fn is_channel_disabled(&self, space_id: &StreamId, channel_id: &StreamId)
        -> Result<bool>;

    /// Space owner plus the entitlement modules granting `permission` on the space
    async fn get_space_entitlements_for_permission(
        &self,
        space_id: &StreamId,
        permission: Permission,
    ) -> Result<EntitlementData>;

    /// Space owner plus the entitlement modules granting `permission` on the channel
    async fn get_channel_entitlements_for_permission(
        &self,
        space_id: &StreamId,
        channel_id: &StreamId,
        permission: Permission,
    ) -> Result<EntitlementData>;

    async fn get_membership_status(
        &self,
        space_id: &StreamId,
        wallet: Address,
    ) -> Result<MembershipStatus>;

    async fn banned_token_ids(&self, space_id: &StreamId) -> Result<HashSet<TokenId>>;

    async fn is_app_entitled(
        &self,
        space_id: &StreamId,
        client: Address,
        app: Address,
        permission: Permission,
    ) -> Result<bool>;

    async fn is_app_installed(&self, space_id: &StreamId, app: Address) -> Result<bool>;
}

/// [`SpaceContract`] backed by a [`ChainReader`]
pub struct ChainSpaceContract {
    reader: Arc<dyn ChainReader>,
}

impl ChainSpaceContract {
    #[must_use]
    pub fn new(reader: Arc<dyn ChainReader>) -> Self {
        Self { reader }
    }

    async fn owner(&self, space: Address) -> Result<Address> {
        let call = ContractCall::Owner;
        let method = call.method();
        self.reader.call(space, call).await?.into_address(method)
    }

    async fn entitlement_data(&self, space: Address, call: ContractCall) -> Result<EntitlementData> {
        let owner = self.owner(space).await?;
        let method = call.method();
        let raw = self.reader.call(space, call).await?.into_entitlements(method)?;
        let entitlements = marshal_entitlements(&raw)?;

        tracing::debug!(
            space = %space,
            owner = %owner,
            entitlements = entitlements.len(),
            method,
            "Got entitlement data"
        );

        Ok(EntitlementData {
            owner,
            entitlements,
        })
    }
}

#[async_trait]
impl SpaceContract for ChainSpaceContract {
    async fn is_space_disabled(&self, space_id: &StreamId) -> Result<bool> {
        let space = space_id.contract_address()?;
        let call = ContractCall::Paused;
        let method = call.method();
        self.reader.call(space, call).await?.into_bool(method)
    }

    async fn is_channel_disabled(
        &self,
        space_id: &StreamId,
        channel_id: &StreamId,
    ) -> Result<bool> {
        let space = space_id.contract_address()?;
        let call = ContractCall::GetChannel {
            channel_id: channel_id.clone(),
        };
        let method = call.method();
        let channel = self.reader.call(space, call).await?.into_channel(method)?;
        Ok(channel.disabled)
    }

    async fn get_space_entitlements_for_permission(
        &self,
        space_id: &StreamId,
        permission: Permission,
    ) -> Result<EntitlementData> {
        let space = space_id.contract_address()?;
        self.entitlement_data(space, ContractCall::GetEntitlementDataByPermission { permission })
            .await
    }

    async fn get_channel_entitlements_for_permission(
        &self,
        space_id: &StreamId,
        channel_id: &StreamId,
        permission: Permission,
    ) -> Result<EntitlementData> {
        let space = space_id.contract_address()?;
        self.entitlement_data(
            space,
            ContractCall::GetChannelEntitlementDataByPermission {
                channel_id: channel_id.clone(),
                permission,
            },
        )
        .await
    }

    async fn get_membership_status(
        &self,
        space_id: &StreamId,
        wallet: Address,
    ) -> Result<MembershipStatus> {
        let space = space_id.contract_address()?;
        let call = ContractCall::TokensOfOwner { owner: wallet };
        let method = call.method();
        let token_ids = self.reader.call(space, call).await?.into_token_ids(method)?;

        if token_ids.is_empty() {
            return Ok(MembershipStatus::not_member());
        }

        let mut expiries = Vec::with_capacity(token_ids.len());
        for token_id in &token_ids {
            let call = ContractCall::ExpiresAt {
                token_id: token_id.clone(),
            };
            let method = call.method();
            let expires_at = self
                .reader
                .call(space, call)
                .await
                .and_then(|output| output.into_uint(method))
                .inspect_err(|e| {
                    tracing::warn!(token_id = %token_id, error = %e, "Failed to get expiration for token");
                })?;
            expiries.push(expires_at);
        }

        Ok(membership_from_expiries(token_ids, &expiries, unix_now()))
    }

    async fn banned_token_ids(&self, space_id: &StreamId) -> Result<HashSet<TokenId>> {
        let space = space_id.contract_address()?;
        let call = ContractCall::BannedTokenIds;
        let method = call.method();
        let banned = self.reader.call(space, call).await?.into_token_ids(method)?;
        Ok(banned.into_iter().collect())
    }

    async fn is_app_entitled(
        &self,
        space_id: &StreamId,
        client: Address,
        app: Address,
        permission: Permission,
    ) -> Result<bool> {
        let space = space_id.contract_address()?;
        let call = ContractCall::IsAppEntitled {
            app,
            client,
            permission: permission.as_bytes32(),
        };
        let method = call.method();
        self.reader.call(space, call).await?.into_bool(method)
    }

    async fn is_app_installed(&self, space_id: &StreamId, app: Address) -> Result<bool> {
        let space = space_id.contract_address()?;
        let call = ContractCall::IsAppInstalled { app };
        let method = call.method();
        self.reader.call(space, call).await?.into_bool(method)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Fold per-token expiries into a membership status.
///
/// An expiry of zero never expires. Otherwise a token is active while its
/// expiry lies after `now`.
pub(crate) fn membership_from_expiries(
    token_ids: Vec<TokenId>,
    expiries: &[u64],
    now: u64,
) -> MembershipStatus {
    let mut has_active = false;
    let mut furthest: Option<u64> = None;
    let mut most_recent_expiry: Option<u64> = None;

    for &expires_at in expiries {
        if expires_at == 0 {
            has_active = true;
            furthest = Some(0);
        } else if expires_at > now {
            has_active = true;
            if furthest.map_or(true, |f| f != 0 && expires_at > f) {
                furthest = Some(expires_at);
            }
        } else if most_recent_expiry.map_or(true, |m| expires_at > m) {
            most_recent_expiry = Some(expires_at);
        }
    }

    MembershipStatus {
        is_member: true,
        is_expired: !has_active,
        token_ids,
        expiry_time: furthest,
        expired_at: if has_active { None } else { most_recent_expiry },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeChain;

    fn space() -> (Address, StreamId) {
        let address = Address::from_low_u64(0x5ace);
        (address, StreamId::space(address))
    }

    #[test]
    fn test_permanent_token_wins_over_expiring_ones() {
        let tokens = vec![TokenId::from(1), TokenId::from(2)];
        let status = membership_from_expiries(tokens, &[2_000, 0], 1_000);
        assert!(status.is_active());
        assert_eq!(status.expiry_time, Some(0));
        assert_eq!(status.expired_at, None);
    }

    #[test]
    fn test_all_expired_reports_most_recent_expiry() {
        let tokens = vec![TokenId::from(1), TokenId::from(2)];
        let status = membership_from_expiries(tokens, &[10, 900], 1_000);
        assert!(status.is_member);
        assert!(status.is_expired);
        assert_eq!(status.expired_at, Some(900));
        assert_eq!(status.expiry_time, None);
    }

    #[tokio::test]
    async fn test_membership_status_reads_tokens_and_expiries() {
        let (address, space_id) = space();
        let chain = Arc::new(FakeChain::new());
        let wallet = Address::from_low_u64(0xaaa);
        chain.set_tokens(address, wallet, vec![(TokenId::from(7), 0)]);

        let contract = ChainSpaceContract::new(chain.clone());
        let status = contract.get_membership_status(&space_id, wallet).await.unwrap();

        assert!(status.is_active());
        assert_eq!(status.token_ids, vec![TokenId::from(7)]);
        assert_eq!(chain.calls("tokensOfOwner"), 1);
        assert_eq!(chain.calls("expiresAt"), 1);
    }

    #[tokio::test]
    async fn test_non_member_skips_expiry_reads() {
        let (_, space_id) = space();
        let chain = Arc::new(FakeChain::new());
        let contract = ChainSpaceContract::new(chain.clone());

        let status = contract
            .get_membership_status(&space_id, Address::from_low_u64(1))
            .await
            .unwrap();

        assert_eq!(status, MembershipStatus::not_member());
        assert_eq!(chain.calls("expiresAt"), 0);
    }

    #[tokio::test]
    async fn test_entitlement_data_includes_owner() {
        let (address, space_id) = space();
        let chain = Arc::new(FakeChain::new());
        let owner = Address::from_low_u64(0xaaa);
        chain.set_owner(address, owner);
        chain.set_user_entitlement(address, Permission::Read, vec![Address::EVERYONE]);

        let contract = ChainSpaceContract::new(chain);
        let data = contract
            .get_space_entitlements_for_permission(&space_id, Permission::Read)
            .await
            .unwrap();

        assert_eq!(data.owner, owner);
        assert_eq!(
            data.entitlements,
            vec![chainauth_core::Entitlement::User(vec![Address::EVERYONE])]
        );
    }

    #[tokio::test]
    async fn test_call_failures_propagate() {
        let (address, space_id) = space();
        let chain = Arc::new(FakeChain::new());
        chain.fail(address, ContractCall::Paused, "execution reverted");

        let contract = ChainSpaceContract::new(chain);
        let err = contract.is_space_disabled(&space_id).await.unwrap_err();
        assert!(matches!(err, chainauth_core::Error::ContractCall { .. }));
    }
}
