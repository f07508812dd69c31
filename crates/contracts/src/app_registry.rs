//! App registry adapter

use crate::reader::{ChainReader, ContractCall};
use async_trait::async_trait;
use chainauth_core::{Address, Result};
use std::sync::Arc;

#[async_trait]
pub trait AppRegistryContract: Send + Sync {
    /// App contract registered for `client`, if the client is an app
    async fn app_for_client(&self, client: Address) -> Result<Option<Address>>;

    /// Owner of the app registered for `client`, if any
    async fn app_owner_for_client(&self, client: Address) -> Result<Option<Address>>;
}

/// [`AppRegistryContract`] backed by a [`ChainReader`]
pub struct ChainAppRegistry {
    reader: Arc<dyn ChainReader>,
    contract: Address,
}

impl ChainAppRegistry {
    #[must_use]
    pub fn new(reader: Arc<dyn ChainReader>, contract: Address) -> Self {
        Self { reader, contract }
    }
}

#[async_trait]
impl AppRegistryContract for ChainAppRegistry {
    async fn app_for_client(&self, client: Address) -> Result<Option<Address>> {
        let call = ContractCall::GetAppByClient { client };
        let method = call.method();
        let app = self
            .reader
            .call(self.contract, call)
            .await?
            .into_address(method)?;
        Ok(app.non_zero())
    }

    async fn app_owner_for_client(&self, client: Address) -> Result<Option<Address>> {
        let Some(app) = self.app_for_client(client).await? else {
            return Ok(None);
        };
        let call = ContractCall::GetAppOwner { app };
        let method = call.method();
        let owner = self
            .reader
            .call(self.contract, call)
            .await?
            .into_address(method)?;
        Ok(owner.non_zero())
    }
}

/// Registry used when the chain has no app registry: nobody is an app
pub struct NoAppRegistry;

#[async_trait]
impl AppRegistryContract for NoAppRegistry {
    async fn app_for_client(&self, _client: Address) -> Result<Option<Address>> {
        Ok(None)
    }

    async fn app_owner_for_client(&self, _client: Address) -> Result<Option<Address>> {
        Ok(None)
    }
}
