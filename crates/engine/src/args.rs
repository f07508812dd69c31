//! Query descriptors: the immutable input to an entitlement check and the
//! key under which its results are cached.
//!
//! Two descriptors are cache-equal exactly when every field is equal. The
//! internal kinds name the sub-queries the engine caches on its own.

use chainauth_core::{Address, Permission, StreamId, TokenId};
use std::fmt::{self, Display};

/// What a [`QueryDescriptor`] asks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    SpaceEntitlement,
    ChannelEntitlement,
    IsSpaceMember,
    IsWalletLinked,
    IsApp,
    IsNotApp,
    IsBotOwner,
    // Internal sub-queries
    SpaceEnabled,
    ChannelEnabled,
    LinkedWallets,
    WalletMembership,
    AppMembership,
    UserIsApp,
    EntitlementData,
}

impl QueryKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::SpaceEntitlement => "space",
            QueryKind::ChannelEntitlement => "channel",
            QueryKind::IsSpaceMember => "isSpaceMember",
            QueryKind::IsWalletLinked => "isWalletLinked",
            QueryKind::IsApp => "isApp",
            QueryKind::IsNotApp => "isNotApp",
            QueryKind::IsBotOwner => "isBotOwner",
            QueryKind::SpaceEnabled => "spaceEnabled",
            QueryKind::ChannelEnabled => "channelEnabled",
            QueryKind::LinkedWallets => "linkedWallets",
            QueryKind::WalletMembership => "walletMembership",
            QueryKind::AppMembership => "appMembership",
            QueryKind::UserIsApp => "userIsApp",
            QueryKind::EntitlementData => "entitlementData",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    kind: QueryKind,
    space_id: Option<StreamId>,
    channel_id: Option<StreamId>,
    principal: Address,
    permission: Permission,
    app_address: Option<Address>,
    bot_client_address: Option<Address>,
    wallet_address: Option<Address>,
    linked_wallets: Vec<Address>,
    token_ids: Vec<TokenId>,
}

impl QueryDescriptor {
    fn new(kind: QueryKind, principal: Address) -> Self {
        Self {
            kind,
            space_id: None,
            channel_id: None,
            principal,
            permission: Permission::Undefined,
            app_address: None,
            bot_client_address: None,
            wallet_address: None,
            linked_wallets: Vec::new(),
            token_ids: Vec::new(),
        }
    }

    /// Is `principal` granted `permission` on the space?
    ///
    /// `app_address` is the app contract when the principal is an app
    /// client; a zero address is treated as none.
    #[must_use]
    pub fn for_space(
        space_id: StreamId,
        principal: Address,
        permission: Permission,
        app_address: Option<Address>,
    ) -> Self {
        Self {
            space_id: Some(space_id),
            permission,
            app_address: app_address.and_then(Address::non_zero),
            ..Self::new(QueryKind::SpaceEntitlement, principal)
        }
    }

    /// Is `principal` granted `permission` on the channel?
    #[must_use]
    pub fn for_channel(
        space_id: StreamId,
        channel_id: StreamId,
        principal: Address,
        permission: Permission,
        app_address: Option<Address>,
    ) -> Self {
        Self {
            space_id: Some(space_id),
            channel_id: Some(channel_id),
            permission,
            app_address: app_address.and_then(Address::non_zero),
            ..Self::new(QueryKind::ChannelEntitlement, principal)
        }
    }

    /// Does `principal`, or a wallet linked to it, hold an unexpired membership?
    #[must_use]
    pub fn for_is_space_member(
        space_id: StreamId,
        principal: Address,
        app_address: Option<Address>,
    ) -> Self {
        Self {
            space_id: Some(space_id),
            app_address: app_address.and_then(Address::non_zero),
            ..Self::new(QueryKind::IsSpaceMember, principal)
        }
    }

    /// Is `wallet` linked to `principal`'s root key?
    #[must_use]
    pub fn for_is_wallet_linked(principal: Address, wallet: Address) -> Self {
        Self {
            wallet_address: Some(wallet),
            ..Self::new(QueryKind::IsWalletLinked, principal)
        }
    }

    /// Is `principal` registered as the client of `app_address`?
    #[must_use]
    pub fn for_is_app(principal: Address, app_address: Address) -> Self {
        Self {
            app_address: app_address.non_zero(),
            ..Self::new(QueryKind::IsApp, principal)
        }
    }

    #[must_use]
    pub fn for_is_not_app(principal: Address) -> Self {
        Self::new(QueryKind::IsNotApp, principal)
    }

    /// Does `principal` own the app whose client is `bot_client_address`?
    #[must_use]
    pub fn for_is_bot_owner(principal: Address, bot_client_address: Address) -> Self {
        Self {
            bot_client_address: Some(bot_client_address),
            ..Self::new(QueryKind::IsBotOwner, principal)
        }
    }

    pub(crate) fn space_enabled(space_id: &StreamId) -> Self {
        Self {
            space_id: Some(space_id.clone()),
            ..Self::new(QueryKind::SpaceEnabled, Address::ZERO)
        }
    }

    pub(crate) fn channel_enabled(space_id: &StreamId, channel_id: &StreamId) -> Self {
        Self {
            space_id: Some(space_id.clone()),
            channel_id: Some(channel_id.clone()),
            ..Self::new(QueryKind::ChannelEnabled, Address::ZERO)
        }
    }

    pub(crate) fn linked_wallets_of(principal: Address) -> Self {
        Self::new(QueryKind::LinkedWallets, principal)
    }

    pub(crate) fn wallet_membership(space_id: &StreamId, wallet: Address) -> Self {
        Self {
            space_id: Some(space_id.clone()),
            ..Self::new(QueryKind::WalletMembership, wallet)
        }
    }

    pub(crate) fn app_membership(space_id: &StreamId, app: Address) -> Self {
        Self {
            space_id: Some(space_id.clone()),
            app_address: Some(app),
            ..Self::new(QueryKind::AppMembership, Address::ZERO)
        }
    }

    pub(crate) fn user_is_app(principal: Address) -> Self {
        Self::new(QueryKind::UserIsApp, principal)
    }

    /// Key for the owner and entitlement modules this query is evaluated against
    pub(crate) fn entitlement_data(&self) -> Self {
        Self {
            space_id: self.space_id.clone(),
            channel_id: self.channel_id.clone(),
            permission: self.permission,
            ..Self::new(QueryKind::EntitlementData, Address::ZERO)
        }
    }

    /// Copy of this query with resolved linked wallets attached
    #[must_use]
    pub fn with_linked_wallets(&self, wallets: Vec<Address>) -> Self {
        Self {
            linked_wallets: wallets,
            ..self.clone()
        }
    }

    /// Copy of this query with `token_ids` appended
    #[must_use]
    pub fn append_token_ids(&self, token_ids: impl IntoIterator<Item = TokenId>) -> Self {
        let mut next = self.clone();
        next.token_ids.extend(token_ids);
        next
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn space_id(&self) -> Option<&StreamId> {
        self.space_id.as_ref()
    }

    pub fn channel_id(&self) -> Option<&StreamId> {
        self.channel_id.as_ref()
    }

    pub fn principal(&self) -> Address {
        self.principal
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn app_address(&self) -> Option<Address> {
        self.app_address
    }

    pub fn bot_client_address(&self) -> Option<Address> {
        self.bot_client_address
    }

    pub fn wallet_address(&self) -> Option<Address> {
        self.wallet_address
    }

    pub fn linked_wallets(&self) -> &[Address] {
        &self.linked_wallets
    }

    pub fn token_ids(&self) -> &[TokenId] {
        &self.token_ids
    }
}

impl Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(principal={}, permission={}",
            self.kind.as_str(),
            self.principal,
            self.permission
        )?;
        if let Some(space_id) = &self.space_id {
            write!(f, ", space={space_id}")?;
        }
        if let Some(channel_id) = &self.channel_id {
            write!(f, ", channel={channel_id}")?;
        }
        if let Some(app) = self.app_address {
            write!(f, ", app={app}")?;
        }
        if !self.linked_wallets.is_empty() {
            write!(f, ", wallets={}", self.linked_wallets.len())?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_zero_app_address_is_none() {
        let space_id = StreamId::space(Address::from_low_u64(1));
        let query = QueryDescriptor::for_space(
            space_id,
            Address::from_low_u64(2),
            Permission::Read,
            Some(Address::ZERO),
        );
        assert_eq!(query.app_address(), None);
    }

    #[test]
    fn test_resolution_produces_distinct_keys() {
        let space_id = StreamId::space(Address::from_low_u64(1));
        let query = QueryDescriptor::for_space(
            space_id,
            Address::from_low_u64(2),
            Permission::Write,
            None,
        );
        let resolved = query
            .with_linked_wallets(vec![Address::from_low_u64(2)])
            .append_token_ids([TokenId::from(7)]);

        assert!(query.linked_wallets().is_empty());
        assert_eq!(resolved.token_ids(), &[TokenId::from(7)]);

        let keys: HashSet<_> = [query.clone(), resolved, query].into_iter().collect();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_entitlement_data_key_ignores_principal() {
        let space_id = StreamId::space(Address::from_low_u64(1));
        let a = QueryDescriptor::for_space(
            space_id.clone(),
            Address::from_low_u64(2),
            Permission::Read,
            None,
        );
        let b = QueryDescriptor::for_space(space_id, Address::from_low_u64(3), Permission::Read, None)
            .with_linked_wallets(vec![Address::from_low_u64(3)]);

        assert_eq!(a.entitlement_data(), b.entitlement_data());
    }
}
