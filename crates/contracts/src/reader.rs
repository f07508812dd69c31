//! The chain read seam: one async call per contract view method

use async_trait::async_trait;
use chainauth_core::{Address, Error, Permission, Result, StreamId, TokenId};

/// A contract view call this crate knows how to issue
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContractCall {
    /// Space pausable facet
    Paused,
    /// Space ERC-5313 owner
    Owner,
    /// Space channels facet
    GetChannel { channel_id: StreamId },
    /// Space membership NFT
    TokensOfOwner { owner: Address },
    ExpiresAt { token_id: TokenId },
    /// Space entitlement-data facet
    GetEntitlementDataByPermission { permission: Permission },
    GetChannelEntitlementDataByPermission {
        channel_id: StreamId,
        permission: Permission,
    },
    /// Space banning facet
    BannedTokenIds,
    /// Space app-account facet
    IsAppEntitled {
        app: Address,
        client: Address,
        permission: [u8; 32],
    },
    IsAppInstalled { app: Address },
    /// Wallet-link facet of the architect diamond
    GetRootKeyForWallet { wallet: Address },
    GetWalletsByRootKey { root_key: Address },
    /// App registry
    GetAppByClient { client: Address },
    GetAppOwner { app: Address },
}

impl ContractCall {
    /// Solidity method name, used in errors and logs
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::Paused => "paused",
            ContractCall::Owner => "owner",
            ContractCall::GetChannel { .. } => "getChannel",
            ContractCall::TokensOfOwner { .. } => "tokensOfOwner",
            ContractCall::ExpiresAt { .. } => "expiresAt",
            ContractCall::GetEntitlementDataByPermission { .. } => {
                "getEntitlementDataByPermission"
            }
            ContractCall::GetChannelEntitlementDataByPermission { .. } => {
                "getChannelEntitlementDataByPermission"
            }
            ContractCall::BannedTokenIds => "banned",
            ContractCall::IsAppEntitled { .. } => "isAppEntitled",
            ContractCall::IsAppInstalled { .. } => "isAppInstalled",
            ContractCall::GetRootKeyForWallet { .. } => "getRootKeyForWallet",
            ContractCall::GetWalletsByRootKey { .. } => "getWalletsByRootKey",
            ContractCall::GetAppByClient { .. } => "getAppByClient",
            ContractCall::GetAppOwner { .. } => "getAppById",
        }
    }
}

/// One entitlement module as returned by the entitlement-data facet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawEntitlement {
    pub module_type: String,
    /// ABI-encoded module data
    pub data: Vec<u8>,
}

/// Decoded channel record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub disabled: bool,
}

/// Decoded return value of a [`ContractCall`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Bool(bool),
    Address(Address),
    Addresses(Vec<Address>),
    TokenIds(Vec<TokenId>),
    Uint(u64),
    Channel(ChannelInfo),
    Entitlements(Vec<RawEntitlement>),
}

impl CallOutput {
    pub fn into_bool(self, method: &'static str) -> Result<bool> {
        match self {
            CallOutput::Bool(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "bool")),
        }
    }

    pub fn into_address(self, method: &'static str) -> Result<Address> {
        match self {
            CallOutput::Address(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "address")),
        }
    }

    pub fn into_addresses(self, method: &'static str) -> Result<Vec<Address>> {
        match self {
            CallOutput::Addresses(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "address[]")),
        }
    }

    pub fn into_token_ids(self, method: &'static str) -> Result<Vec<TokenId>> {
        match self {
            CallOutput::TokenIds(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "uint256[]")),
        }
    }

    pub fn into_uint(self, method: &'static str) -> Result<u64> {
        match self {
            CallOutput::Uint(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "uint256")),
        }
    }

    pub fn into_channel(self, method: &'static str) -> Result<ChannelInfo> {
        match self {
            CallOutput::Channel(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "Channel")),
        }
    }

    pub fn into_entitlements(self, method: &'static str) -> Result<Vec<RawEntitlement>> {
        match self {
            CallOutput::Entitlements(value) => Ok(value),
            _ => Err(Error::malformed_response(method, "EntitlementData[]")),
        }
    }
}

/// Read-only access to contract state.
///
/// Implementations report a missing contract or record as
/// [`Error::NotFound`] and any other failure as [`Error::ContractCall`].
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn call(&self, contract: Address, call: ContractCall) -> Result<CallOutput>;
}
