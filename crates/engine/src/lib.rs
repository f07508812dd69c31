//! Entitlement decisions over on-chain space state.
//!
//! [`ChainAuth`] answers whether a principal may act in a space or channel,
//! whether it is a member, and a handful of identity questions about linked
//! wallets and apps. Answers are cached in two tiers: allowed results for
//! long, denials briefly.
//!
//! ```ignore
//! let auth = ChainAuth::from_chain(config, reader, evaluator, &registry)?;
//! let query = QueryDescriptor::for_space(space_id, user, Permission::Write, None);
//! let result = auth.is_entitled(&query).await?;
//! if !result.allowed {
//!     tracing::info!(reason = %result.reason, "Denied");
//! }
//! ```

pub mod args;
pub mod bypass;
pub mod cache_value;
pub mod chain_auth;
pub mod evaluate;
pub mod evaluator;
mod membership;
pub mod metrics;

pub use args::{QueryDescriptor, QueryKind};
pub use bypass::{header_grants_bypass, with_test_bypass, TEST_BYPASS_HEADER};
pub use cache_value::CachedResult;
pub use chain_auth::{ChainAuth, ChainAuthBuilder, EntitlementChecker, IsEntitledResult};
pub use evaluate::{evaluate_entitlement_data, evaluate_with_entitlements};
pub use evaluator::RuleEvaluator;
pub use metrics::{CacheFunction, EngineMetrics};
