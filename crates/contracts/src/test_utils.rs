//! In-memory chain for tests
//!
//! [`FakeChain`] answers [`ContractCall`]s from a table keyed by contract and
//! call. Calls with no entry get the value an empty, freshly deployed
//! contract would return. Every call is counted by method name, and entries
//! can be delayed or made to fail.

use crate::marshal::{encode_address_array, MODULE_TYPE_USER};
use crate::reader::{CallOutput, ChainReader, ChannelInfo, ContractCall, RawEntitlement};
use async_trait::async_trait;
use chainauth_core::{Address, Error, Permission, Result, StreamId, TokenId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Output(CallOutput),
    Fail(String),
    NotFound,
}

#[derive(Clone)]
struct Entry {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Default)]
pub struct FakeChain {
    entries: Mutex<HashMap<(Address, ContractCall), Entry>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls issued for a Solidity method name
    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    pub fn set(&self, contract: Address, call: ContractCall, output: CallOutput) {
        self.insert(contract, call, Reply::Output(output), None);
    }

    pub fn set_delayed(
        &self,
        contract: Address,
        call: ContractCall,
        output: CallOutput,
        delay: Duration,
    ) {
        self.insert(contract, call, Reply::Output(output), Some(delay));
    }

    pub fn fail(&self, contract: Address, call: ContractCall, message: &str) {
        self.insert(contract, call, Reply::Fail(message.to_string()), None);
    }

    pub fn fail_after(&self, contract: Address, call: ContractCall, message: &str, delay: Duration) {
        self.insert(contract, call, Reply::Fail(message.to_string()), Some(delay));
    }

    pub fn not_found(&self, contract: Address, call: ContractCall) {
        self.insert(contract, call, Reply::NotFound, None);
    }

    fn insert(&self, contract: Address, call: ContractCall, reply: Reply, delay: Option<Duration>) {
        self.entries
            .lock()
            .insert((contract, call), Entry { reply, delay });
    }

    pub fn set_paused(&self, space: Address, paused: bool) {
        self.set(space, ContractCall::Paused, CallOutput::Bool(paused));
    }

    pub fn set_channel_disabled(&self, space: Address, channel_id: &StreamId, disabled: bool) {
        self.set(
            space,
            ContractCall::GetChannel {
                channel_id: channel_id.clone(),
            },
            CallOutput::Channel(ChannelInfo { disabled }),
        );
    }

    pub fn set_owner(&self, space: Address, owner: Address) {
        self.set(space, ContractCall::Owner, CallOutput::Address(owner));
    }

    /// Give `wallet` membership tokens with the given expiries (zero never expires)
    pub fn set_tokens(&self, space: Address, wallet: Address, tokens: Vec<(TokenId, u64)>) {
        self.set(
            space,
            ContractCall::TokensOfOwner { owner: wallet },
            CallOutput::TokenIds(tokens.iter().map(|(id, _)| id.clone()).collect()),
        );
        for (token_id, expires_at) in tokens {
            self.set(
                space,
                ContractCall::ExpiresAt { token_id },
                CallOutput::Uint(expires_at),
            );
        }
    }

    pub fn set_space_entitlements(
        &self,
        space: Address,
        permission: Permission,
        entitlements: Vec<RawEntitlement>,
    ) {
        self.set(
            space,
            ContractCall::GetEntitlementDataByPermission { permission },
            CallOutput::Entitlements(entitlements),
        );
    }

    pub fn set_channel_entitlements(
        &self,
        space: Address,
        channel_id: &StreamId,
        permission: Permission,
        entitlements: Vec<RawEntitlement>,
    ) {
        self.set(
            space,
            ContractCall::GetChannelEntitlementDataByPermission {
                channel_id: channel_id.clone(),
                permission,
            },
            CallOutput::Entitlements(entitlements),
        );
    }

    /// Grant `permission` on the space to an explicit user list
    pub fn set_user_entitlement(&self, space: Address, permission: Permission, users: Vec<Address>) {
        self.set_space_entitlements(space, permission, vec![user_entitlement(&users)]);
    }

    pub fn set_banned(&self, space: Address, token_ids: Vec<TokenId>) {
        self.set(space, ContractCall::BannedTokenIds, CallOutput::TokenIds(token_ids));
    }

    /// Link `wallets` to `root` on the wallet-link contract
    pub fn link_wallets(&self, contract: Address, root: Address, wallets: Vec<Address>) {
        for wallet in &wallets {
            self.set(
                contract,
                ContractCall::GetRootKeyForWallet { wallet: *wallet },
                CallOutput::Address(root),
            );
        }
        self.set(
            contract,
            ContractCall::GetWalletsByRootKey { root_key: root },
            CallOutput::Addresses(wallets),
        );
    }

    pub fn register_app(&self, registry: Address, client: Address, app: Address, owner: Address) {
        self.set(
            registry,
            ContractCall::GetAppByClient { client },
            CallOutput::Address(app),
        );
        self.set(registry, ContractCall::GetAppOwner { app }, CallOutput::Address(owner));
    }

    pub fn install_app(&self, space: Address, app: Address) {
        self.set(space, ContractCall::IsAppInstalled { app }, CallOutput::Bool(true));
    }

    pub fn set_app_entitled(
        &self,
        space: Address,
        app: Address,
        client: Address,
        permission: Permission,
        entitled: bool,
    ) {
        self.set(
            space,
            ContractCall::IsAppEntitled {
                app,
                client,
                permission: permission.as_bytes32(),
            },
            CallOutput::Bool(entitled),
        );
    }
}

/// A user entitlement module listing `users`
#[must_use]
pub fn user_entitlement(users: &[Address]) -> RawEntitlement {
    RawEntitlement {
        module_type: MODULE_TYPE_USER.to_string(),
        data: encode_address_array(users),
    }
}

fn default_output(call: &ContractCall) -> CallOutput {
    match call {
        ContractCall::Paused
        | ContractCall::IsAppEntitled { .. }
        | ContractCall::IsAppInstalled { .. } => CallOutput::Bool(false),
        ContractCall::Owner
        | ContractCall::GetRootKeyForWallet { .. }
        | ContractCall::GetAppByClient { .. }
        | ContractCall::GetAppOwner { .. } => CallOutput::Address(Address::ZERO),
        ContractCall::GetChannel { .. } => CallOutput::Channel(ChannelInfo { disabled: false }),
        ContractCall::TokensOfOwner { .. } | ContractCall::BannedTokenIds => {
            CallOutput::TokenIds(Vec::new())
        }
        ContractCall::ExpiresAt { .. } => CallOutput::Uint(0),
        ContractCall::GetEntitlementDataByPermission { .. }
        | ContractCall::GetChannelEntitlementDataByPermission { .. } => {
            CallOutput::Entitlements(Vec::new())
        }
        ContractCall::GetWalletsByRootKey { .. } => CallOutput::Addresses(Vec::new()),
    }
}

#[async_trait]
impl ChainReader for FakeChain {
    async fn call(&self, contract: Address, call: ContractCall) -> Result<CallOutput> {
        let method = call.method();
        *self.calls.lock().entry(method).or_default() += 1;

        let entry = self.entries.lock().get(&(contract, call.clone())).cloned();
        let Some(entry) = entry else {
            return Ok(default_output(&call));
        };

        if let Some(delay) = entry.delay {
            tokio::time::sleep(delay).await;
        }

        match entry.reply {
            Reply::Output(output) => Ok(output),
            Reply::Fail(message) => Err(Error::contract_call(contract, method, message)),
            Reply::NotFound => Err(Error::not_found(contract, method)),
        }
    }
}
