//! The authorization engine
//!
//! [`ChainAuth::is_entitled`] runs a fixed pipeline and stops at the first
//! conclusive answer:
//!
//! 1. test bypass
//! 2. space and channel enablement
//! 3. app identity queries (`IsApp`, `IsNotApp`, `IsBotOwner`)
//! 4. membership: app installation for app principals, otherwise linked
//!    wallet resolution followed by a parallel per-wallet membership check
//! 5. banned membership tokens
//! 6. owner, rule and user entitlements (or app entitlements for apps)
//!
//! Every stage reads through a two-tier cache so repeated checks cost no
//! chain calls until their entries expire. The whole pipeline runs under one
//! deadline.

use crate::args::{QueryDescriptor, QueryKind};
use crate::bypass;
use crate::cache_value::CachedResult;
use crate::evaluate::evaluate_with_entitlements;
use crate::evaluator::RuleEvaluator;
use crate::membership::MembershipCheck;
use crate::metrics::{CacheFunction, EngineMetrics};
use async_trait::async_trait;
use chainauth_cache::{ArcMap, BannedTokenCache, CacheResult, QueryCache};
use chainauth_config::ChainAuthConfig;
use chainauth_contracts::{
    AppRegistryContract, ChainAppRegistry, ChainReader, ChainSpaceContract, ChainWalletLink,
    NoAppRegistry, SpaceContract, WalletLinkContract,
};
use chainauth_core::{
    Address, EntitlementResultReason, Error, Permission, Result, StreamId,
    DEFAULT_BANNED_SPACES_CACHE_SIZE,
};
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

/// Final answer of an entitlement check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsEntitledResult {
    pub allowed: bool,
    /// `None` when allowed
    pub reason: EntitlementResultReason,
}

impl IsEntitledResult {
    fn from_cached(result: &CachedResult) -> Self {
        Self {
            allowed: result.is_allowed(),
            reason: result.reason(),
        }
    }
}

/// Anything that can decide entitlement queries
#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    /// Decide `query`. Errors mean no conclusive answer could be reached and
    /// must be treated as a denial by the caller.
    async fn is_entitled(&self, query: &QueryDescriptor) -> Result<IsEntitledResult>;
}

pub(crate) struct Inner {
    pub(crate) space: Arc<dyn SpaceContract>,
    wallet_link: Option<Arc<dyn WalletLinkContract>>,
    app_registry: Arc<dyn AppRegistryContract>,
    evaluator: Arc<dyn RuleEvaluator>,

    entitlement_cache: QueryCache<QueryDescriptor, CachedResult>,
    pub(crate) membership_cache: QueryCache<QueryDescriptor, CachedResult>,
    entitlement_manager_cache: QueryCache<QueryDescriptor, CachedResult>,
    linked_wallet_cache: QueryCache<QueryDescriptor, CachedResult>,
    user_is_app_cache: QueryCache<QueryDescriptor, CachedResult>,
    /// Per-space banned token sets, bounded to the most active spaces
    banned: ArcMap<StreamId, Arc<BannedTokenCache>>,
    banned_tokens_ttl: Duration,

    max_linked_wallets: usize,
    contract_calls_timeout: Duration,
    test_bypass_secret: String,
    pub(crate) metrics: EngineMetrics,
}

/// Cheaply clonable handle to one engine instance
#[derive(Clone)]
pub struct ChainAuth {
    inner: Arc<Inner>,
}

/// Builder for [`ChainAuth`]
pub struct ChainAuthBuilder {
    config: ChainAuthConfig,
    space: Option<Arc<dyn SpaceContract>>,
    wallet_link: Option<Arc<dyn WalletLinkContract>>,
    app_registry: Option<Arc<dyn AppRegistryContract>>,
    evaluator: Option<Arc<dyn RuleEvaluator>>,
    registry: Option<Registry>,
}

impl ChainAuthBuilder {
    #[must_use]
    pub fn space_contract(mut self, space: Arc<dyn SpaceContract>) -> Self {
        self.space = Some(space);
        self
    }

    /// Without a wallet-link contract every principal resolves to itself only
    #[must_use]
    pub fn wallet_link(mut self, wallet_link: Arc<dyn WalletLinkContract>) -> Self {
        self.wallet_link = Some(wallet_link);
        self
    }

    #[must_use]
    pub fn app_registry(mut self, app_registry: Arc<dyn AppRegistryContract>) -> Self {
        self.app_registry = Some(app_registry);
        self
    }

    #[must_use]
    pub fn rule_evaluator(mut self, evaluator: Arc<dyn RuleEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Registry the engine's counters are registered on
    #[must_use]
    pub fn registry(mut self, registry: &Registry) -> Self {
        self.registry = Some(registry.clone());
        self
    }

    pub fn build(self) -> Result<ChainAuth> {
        let space = self
            .space
            .ok_or_else(|| Error::configuration("a space contract is required"))?;
        let evaluator = self
            .evaluator
            .ok_or_else(|| Error::configuration("a rule evaluator is required"))?;
        let registry = self
            .registry
            .ok_or_else(|| Error::configuration("a metrics registry is required"))?;
        let metrics = EngineMetrics::new(&registry)?;
        let config = self.config;

        tracing::debug!(
            max_linked_wallets = config.max_linked_wallets(),
            timeout_ms = config.contract_calls_timeout().as_millis() as u64,
            wallet_link = self.wallet_link.is_some(),
            "Building chain auth"
        );

        Ok(ChainAuth {
            inner: Arc::new(Inner {
                space,
                wallet_link: self.wallet_link,
                app_registry: self.app_registry.unwrap_or_else(|| Arc::new(NoAppRegistry)),
                evaluator,
                entitlement_cache: QueryCache::new(config.entitlement_cache_settings()),
                membership_cache: QueryCache::new(config.entitlement_cache_settings()),
                entitlement_manager_cache: QueryCache::new(
                    config.entitlement_manager_cache_settings(),
                ),
                linked_wallet_cache: QueryCache::new(config.linked_wallet_cache_settings()),
                user_is_app_cache: QueryCache::new(config.user_is_app_cache_settings()),
                banned: ArcMap::new(DEFAULT_BANNED_SPACES_CACHE_SIZE),
                banned_tokens_ttl: config.banned_tokens_ttl(),
                max_linked_wallets: config.max_linked_wallets(),
                contract_calls_timeout: config.contract_calls_timeout(),
                test_bypass_secret: config.test_bypass_secret.clone(),
                metrics,
            }),
        })
    }
}

impl ChainAuth {
    #[must_use]
    pub fn builder(config: ChainAuthConfig) -> ChainAuthBuilder {
        ChainAuthBuilder {
            config,
            space: None,
            wallet_link: None,
            app_registry: None,
            evaluator: None,
            registry: None,
        }
    }

    /// Engine wired to contracts read through `reader`.
    ///
    /// The wallet-link facet lives on the architect contract. Fails when the
    /// configured contract addresses are malformed.
    pub fn from_chain(
        config: ChainAuthConfig,
        reader: Arc<dyn ChainReader>,
        evaluator: Arc<dyn RuleEvaluator>,
        registry: &Registry,
    ) -> Result<Self> {
        config.validate()?;
        let architect = config.architect_address()?;

        let mut builder = Self::builder(config.clone())
            .space_contract(Arc::new(ChainSpaceContract::new(Arc::clone(&reader))))
            .wallet_link(Arc::new(ChainWalletLink::new(Arc::clone(&reader), architect)))
            .rule_evaluator(evaluator)
            .registry(registry);

        if let Some(app_registry) = config.app_registry_address()? {
            builder = builder.app_registry(Arc::new(ChainAppRegistry::new(reader, app_registry)));
        }

        builder.build()
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.inner.metrics
    }

    /// Decide `query`, serving repeated queries from cache
    pub async fn is_entitled(&self, query: &QueryDescriptor) -> Result<IsEntitledResult> {
        if !self.inner.test_bypass_secret.is_empty() && bypass::bypass_requested() {
            tracing::debug!(query = %query, "Test entitlement bypass");
            return Ok(IsEntitledResult::from_cached(&CachedResult::allow()));
        }

        let inner = &self.inner;
        let (result, hit) = inner
            .entitlement_cache
            .execute_using_cache(query, || async {
                let timeout = inner.contract_calls_timeout;
                let check = inner
                    .check_entitlement(query)
                    .instrument(chainauth_utils::tracing::check_span(query));
                match tokio::time::timeout(timeout, check).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::timeout(format!("is_entitled {query}"), timeout)),
                }
            })
            .await?;
        inner.metrics.record(CacheFunction::IsEntitled, hit);

        let result = IsEntitledResult::from_cached(&result);
        tracing::debug!(
            query = %query,
            allowed = result.allowed,
            reason = %result.reason,
            cache_hit = hit,
            "Entitlement decided"
        );
        Ok(result)
    }
}

#[async_trait]
impl EntitlementChecker for ChainAuth {
    async fn is_entitled(&self, query: &QueryDescriptor) -> Result<IsEntitledResult> {
        ChainAuth::is_entitled(self, query).await
    }
}

fn required_space(query: &QueryDescriptor) -> Result<&StreamId> {
    query
        .space_id()
        .ok_or_else(|| Error::internal(format!("{query} has no space id")))
}

fn required_channel(query: &QueryDescriptor) -> Result<&StreamId> {
    query
        .channel_id()
        .ok_or_else(|| Error::internal(format!("{query} has no channel id")))
}

impl Inner {
    async fn check_entitlement(self: &Arc<Self>, query: &QueryDescriptor) -> Result<CachedResult> {
        if let Some(denied) = self.check_stream_is_enabled(query).await? {
            return Ok(denied);
        }

        if let Some(result) = self.check_is_app(query).await? {
            return Ok(result);
        }

        if let Some(app) = query.app_address() {
            let installed = self.check_app_membership(query, app).await?;
            if !installed.is_allowed() {
                return Ok(installed);
            }
            return self.is_app_entitled(query, app).await;
        }

        let resolved = match self.link_wallets(query).await? {
            Ok(resolved) => resolved,
            Err(result) => return Ok(result),
        };

        let space_id = required_space(&resolved)?;
        let resolved = match self.check_membership(&resolved, space_id).await? {
            MembershipCheck::Member { token_ids } => resolved.append_token_ids(token_ids),
            MembershipCheck::Denied(reason) => return Ok(CachedResult::deny(reason)),
        };

        if self.is_banned(&resolved).await? {
            tracing::warn!(
                principal = %resolved.principal(),
                space_id = %space_id,
                wallets = resolved.linked_wallets().len(),
                "Evaluating entitlements for a user who is banned from the space"
            );
            return Ok(CachedResult::deny(EntitlementResultReason::Membership));
        }

        self.are_linked_wallets_entitled(&resolved).await
    }

    /// Denial when the space or channel is disabled, `None` when enabled
    async fn check_stream_is_enabled(&self, query: &QueryDescriptor) -> Result<Option<CachedResult>> {
        match query.kind() {
            QueryKind::SpaceEntitlement | QueryKind::IsSpaceMember => {
                let space_id = required_space(query)?;
                let enabled = self.check_space_enabled(space_id).await?;
                Ok((!enabled.is_allowed()).then_some(enabled))
            }
            QueryKind::ChannelEntitlement => {
                let space_id = required_space(query)?;
                let enabled = self.check_space_enabled(space_id).await?;
                if !enabled.is_allowed() {
                    return Ok(Some(enabled));
                }
                let channel_id = required_channel(query)?;
                let enabled = self.check_channel_enabled(space_id, channel_id).await?;
                Ok((!enabled.is_allowed()).then_some(enabled))
            }
            QueryKind::IsWalletLinked
            | QueryKind::IsApp
            | QueryKind::IsNotApp
            | QueryKind::IsBotOwner => Ok(None),
            other => Err(Error::internal(format!(
                "unexpected query kind {}",
                other.as_str()
            ))),
        }
    }

    async fn check_space_enabled(&self, space_id: &StreamId) -> Result<CachedResult> {
        let key = QueryDescriptor::space_enabled(space_id);
        let (result, hit) = self
            .entitlement_cache
            .execute_using_cache(&key, || async {
                let disabled = self.space.is_space_disabled(space_id).await?;
                Ok(CachedResult::from_bool(
                    !disabled,
                    EntitlementResultReason::SpaceDisabled,
                ))
            })
            .await?;
        self.metrics.record(CacheFunction::IsSpaceEnabled, hit);
        Ok(result)
    }

    async fn check_channel_enabled(
        &self,
        space_id: &StreamId,
        channel_id: &StreamId,
    ) -> Result<CachedResult> {
        let key = QueryDescriptor::channel_enabled(space_id, channel_id);
        let (result, hit) = self
            .entitlement_cache
            .execute_using_cache(&key, || async {
                let disabled = self.space.is_channel_disabled(space_id, channel_id).await?;
                Ok(CachedResult::from_bool(
                    !disabled,
                    EntitlementResultReason::ChannelDisabled,
                ))
            })
            .await?;
        self.metrics.record(CacheFunction::IsChannelEnabled, hit);
        Ok(result)
    }

    /// App registered for `principal`, cached for a long time
    async fn user_is_app(&self, principal: Address) -> Result<Option<Address>> {
        let key = QueryDescriptor::user_is_app(principal);
        let (result, hit) = self
            .user_is_app_cache
            .execute_using_cache(&key, || async {
                let app_address = self.app_registry.app_for_client(principal).await?;
                Ok(CachedResult::UserIsApp { app_address })
            })
            .await?;
        self.metrics.record(CacheFunction::UserIsApp, hit);
        result.into_user_is_app()
    }

    /// Answer for app identity queries, `None` for every other kind
    async fn check_is_app(&self, query: &QueryDescriptor) -> Result<Option<CachedResult>> {
        match query.kind() {
            QueryKind::IsApp => {
                let found = self.user_is_app(query.principal()).await?;
                tracing::debug!(
                    principal = %query.principal(),
                    found = ?found,
                    expected = ?query.app_address(),
                    "checkIsApp"
                );
                Ok(Some(match found {
                    Some(app) if Some(app) == query.app_address() => CachedResult::allow(),
                    Some(_) => CachedResult::deny(EntitlementResultReason::MismatchedAppAddress),
                    None => CachedResult::deny(EntitlementResultReason::IsNotApp),
                }))
            }
            QueryKind::IsNotApp => {
                let found = self.user_is_app(query.principal()).await?;
                Ok(Some(match found {
                    Some(_) => CachedResult::deny(EntitlementResultReason::IsApp),
                    None => CachedResult::allow(),
                }))
            }
            QueryKind::IsBotOwner => {
                let client = query
                    .bot_client_address()
                    .ok_or_else(|| Error::internal(format!("{query} has no bot client")))?;
                let Some(owner) = self.app_registry.app_owner_for_client(client).await? else {
                    return Ok(Some(CachedResult::deny(
                        EntitlementResultReason::IsNotBotOwner,
                    )));
                };

                let wallets = self.linked_wallets(query).await?;
                tracing::debug!(
                    principal = %query.principal(),
                    bot_client = %client,
                    app_owner = %owner,
                    wallets = wallets.len(),
                    "checkIsBotOwner"
                );
                Ok(Some(if wallets.contains(&owner) {
                    CachedResult::allow()
                } else {
                    CachedResult::deny(EntitlementResultReason::IsNotBotOwner)
                }))
            }
            _ => Ok(None),
        }
    }

    async fn check_app_membership(&self, query: &QueryDescriptor, app: Address) -> Result<CachedResult> {
        let space_id = required_space(query)?;
        let key = QueryDescriptor::app_membership(space_id, app);
        let (result, hit) = self
            .membership_cache
            .execute_using_cache(&key, || async {
                let installed = self.space.is_app_installed(space_id, app).await?;
                Ok(CachedResult::from_bool(
                    installed,
                    EntitlementResultReason::Membership,
                ))
            })
            .await?;
        self.metrics.record(CacheFunction::Membership, hit);
        Ok(result)
    }

    async fn is_app_entitled(&self, query: &QueryDescriptor, app: Address) -> Result<CachedResult> {
        let function = match query.kind() {
            QueryKind::IsSpaceMember => return Ok(CachedResult::allow()),
            QueryKind::SpaceEntitlement => CacheFunction::IsEntitledToSpace,
            QueryKind::ChannelEntitlement => CacheFunction::IsEntitledToChannel,
            other => {
                return Err(Error::internal(format!(
                    "unexpected query kind {} for app entitlement",
                    other.as_str()
                )))
            }
        };
        let space_id = required_space(query)?;

        let (result, hit) = self
            .entitlement_cache
            .execute_using_cache(query, || async {
                let entitled = self
                    .space
                    .is_app_entitled(space_id, query.principal(), app, query.permission())
                    .await?;
                Ok(CachedResult::from_bool(
                    entitled,
                    EntitlementResultReason::AppEntitlements,
                ))
            })
            .await?;
        self.metrics.record(function, hit);
        Ok(result)
    }

    /// Every wallet linked to the principal, root key first
    async fn linked_wallets(&self, query: &QueryDescriptor) -> Result<Arc<Vec<Address>>> {
        let principal = query.principal();
        let Some(wallet_link) = &self.wallet_link else {
            tracing::warn!("Wallet link contract is not setup properly, returning root key only");
            return Ok(Arc::new(vec![principal]));
        };

        let key = QueryDescriptor::linked_wallets_of(principal);
        // Joins, key solicitations, scrubs and link checks need fresh links
        if query.permission() == Permission::Read
            || matches!(
                query.kind(),
                QueryKind::IsSpaceMember | QueryKind::IsWalletLinked
            )
        {
            self.linked_wallet_cache.bust(&key);
            self.metrics.record_bust(CacheFunction::LinkedWallet);
        }

        let (result, hit) = self
            .linked_wallet_cache
            .execute_using_cache(&key, || async {
                let wallets = wallet_link
                    .linked_wallets(principal)
                    .await
                    .inspect_err(|e| {
                        tracing::error!(wallet = %principal, error = %e, "Failed to get linked wallets");
                    })?;
                Ok(CachedResult::LinkedWallets {
                    wallets: Arc::new(wallets),
                })
            })
            .await?;
        self.metrics.record(CacheFunction::LinkedWallet, hit);
        result.into_linked_wallets()
    }

    /// The query with linked wallets attached, or the final answer for
    /// `IsWalletLinked`
    async fn link_wallets(
        &self,
        query: &QueryDescriptor,
    ) -> Result<std::result::Result<QueryDescriptor, CachedResult>> {
        let wallets = self.linked_wallets(query).await?;

        if query.kind() == QueryKind::IsWalletLinked {
            let target = query
                .wallet_address()
                .ok_or_else(|| Error::internal(format!("{query} has no wallet address")))?;
            if wallets.contains(&target) {
                return Ok(Err(CachedResult::allow()));
            }
            // An app's own contract counts as linked to its client
            if self.user_is_app(query.principal()).await? == Some(target) {
                return Ok(Err(CachedResult::allow()));
            }
            return Ok(Err(CachedResult::deny(
                EntitlementResultReason::WalletNotLinked,
            )));
        }

        if wallets.len() > self.max_linked_wallets {
            let root_key = wallets.first().copied().unwrap_or(query.principal());
            tracing::error!(
                root_key = %root_key,
                wallets = wallets.len(),
                limit = self.max_linked_wallets,
                "Too many wallets linked to the root key"
            );
            return Err(Error::ResourceExhausted {
                root_key,
                wallets: wallets.len(),
                limit: self.max_linked_wallets,
            });
        }

        Ok(Ok(query.with_linked_wallets(wallets.as_ref().clone())))
    }

    async fn is_banned(&self, query: &QueryDescriptor) -> Result<bool> {
        if query.token_ids().is_empty() {
            return Ok(false);
        }
        let space_id = required_space(query)?;
        let cache = self.banned.get_or_insert_with(space_id.clone(), || {
            Arc::new(BannedTokenCache::new(self.banned_tokens_ttl))
        });

        cache
            .is_banned(query.token_ids(), || self.space.banned_token_ids(space_id))
            .await
    }

    async fn are_linked_wallets_entitled(&self, query: &QueryDescriptor) -> Result<CachedResult> {
        let (function, reason) = match query.kind() {
            QueryKind::IsSpaceMember => return Ok(CachedResult::allow()),
            QueryKind::SpaceEntitlement => (
                CacheFunction::IsEntitledToSpace,
                EntitlementResultReason::SpaceEntitlements,
            ),
            QueryKind::ChannelEntitlement => (
                CacheFunction::IsEntitledToChannel,
                EntitlementResultReason::ChannelEntitlements,
            ),
            other => {
                return Err(Error::internal(format!(
                    "unexpected query kind {}",
                    other.as_str()
                )))
            }
        };

        let (result, hit) = self
            .entitlement_cache
            .execute_using_cache(query, || async {
                let data = self.entitlement_data(query).await?;
                let allowed =
                    evaluate_with_entitlements(self.evaluator.as_ref(), query, &data).await?;
                Ok(CachedResult::from_bool(allowed, reason))
            })
            .await?;
        self.metrics.record(function, hit);
        Ok(result)
    }

    async fn entitlement_data(
        &self,
        query: &QueryDescriptor,
    ) -> Result<Arc<chainauth_core::EntitlementData>> {
        let space_id = required_space(query)?;
        let key = query.entitlement_data();
        let (result, hit) = self
            .entitlement_manager_cache
            .execute_using_cache(&key, || async {
                let data = match query.channel_id() {
                    Some(channel_id) => {
                        self.space
                            .get_channel_entitlements_for_permission(
                                space_id,
                                channel_id,
                                query.permission(),
                            )
                            .await?
                    }
                    None => {
                        self.space
                            .get_space_entitlements_for_permission(space_id, query.permission())
                            .await?
                    }
                };
                Ok(CachedResult::EntitlementData {
                    data: Arc::new(data),
                })
            })
            .await?;
        self.metrics.record(CacheFunction::Entitlement, hit);
        result.into_entitlement_data()
    }
}
