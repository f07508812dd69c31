//! Wallet-link adapter: resolves every wallet linked to a principal's root key

use crate::reader::{ChainReader, ContractCall};
use async_trait::async_trait;
use chainauth_core::{Address, Result};
use std::sync::Arc;

#[async_trait]
pub trait WalletLinkContract: Send + Sync {
    /// Root key a wallet is linked to; zero when the wallet is not linked
    async fn get_root_key_for_wallet(&self, wallet: Address) -> Result<Address>;

    async fn get_wallets_by_root_key(&self, root_key: Address) -> Result<Vec<Address>>;

    /// Root key followed by every wallet linked to it.
    ///
    /// A principal that is not linked to anything is its own root key.
    async fn linked_wallets(&self, principal: Address) -> Result<Vec<Address>> {
        let root_key = self
            .get_root_key_for_wallet(principal)
            .await?
            .non_zero()
            .unwrap_or(principal);

        let linked = self.get_wallets_by_root_key(root_key).await?;

        let mut wallets = Vec::with_capacity(linked.len() + 1);
        wallets.push(root_key);
        wallets.extend(linked.into_iter().filter(|wallet| *wallet != root_key));
        Ok(wallets)
    }
}

/// [`WalletLinkContract`] backed by a [`ChainReader`]
pub struct ChainWalletLink {
    reader: Arc<dyn ChainReader>,
    contract: Address,
}

impl ChainWalletLink {
    /// `contract` is the diamond hosting the wallet-link facet
    #[must_use]
    pub fn new(reader: Arc<dyn ChainReader>, contract: Address) -> Self {
        Self { reader, contract }
    }
}

#[async_trait]
impl WalletLinkContract for ChainWalletLink {
    async fn get_root_key_for_wallet(&self, wallet: Address) -> Result<Address> {
        let call = ContractCall::GetRootKeyForWallet { wallet };
        let method = call.method();
        self.reader
            .call(self.contract, call)
            .await?
            .into_address(method)
    }

    async fn get_wallets_by_root_key(&self, root_key: Address) -> Result<Vec<Address>> {
        let call = ContractCall::GetWalletsByRootKey { root_key };
        let method = call.method();
        self.reader
            .call(self.contract, call)
            .await?
            .into_addresses(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeChain;

    #[tokio::test]
    async fn test_unlinked_principal_is_its_own_root() {
        let architect = Address::from_low_u64(0xa7c);
        let chain = Arc::new(FakeChain::new());
        let link = ChainWalletLink::new(chain, architect);

        let principal = Address::from_low_u64(1);
        assert_eq!(link.linked_wallets(principal).await.unwrap(), vec![principal]);
    }

    #[tokio::test]
    async fn test_linked_wallet_resolves_through_root_key() {
        let architect = Address::from_low_u64(0xa7c);
        let chain = Arc::new(FakeChain::new());
        let root = Address::from_low_u64(0x100);
        let a = Address::from_low_u64(0x101);
        let b = Address::from_low_u64(0x102);
        chain.link_wallets(architect, root, vec![a, b]);

        let link = ChainWalletLink::new(chain.clone(), architect);
        assert_eq!(link.linked_wallets(b).await.unwrap(), vec![root, a, b]);
        assert_eq!(chain.calls("getRootKeyForWallet"), 1);
        assert_eq!(chain.calls("getWalletsByRootKey"), 1);
    }
}
