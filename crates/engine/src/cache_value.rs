//! The single value type stored in the engine's query caches

use chainauth_cache::CacheResult;
use chainauth_core::{Address, EntitlementData, EntitlementResultReason, Error, MembershipStatus, Result};
use std::sync::Arc;

/// Result of one cached sub-query.
///
/// `is_allowed` picks the cache tier: allowed values use the positive TTL,
/// everything else the negative TTL.
#[derive(Debug, Clone)]
pub enum CachedResult {
    Bool {
        allowed: bool,
        reason: EntitlementResultReason,
    },
    EntitlementData {
        data: Arc<EntitlementData>,
    },
    MembershipStatus {
        status: MembershipStatus,
    },
    LinkedWallets {
        wallets: Arc<Vec<Address>>,
    },
    UserIsApp {
        app_address: Option<Address>,
    },
}

impl CachedResult {
    #[must_use]
    pub fn allow() -> Self {
        CachedResult::Bool {
            allowed: true,
            reason: EntitlementResultReason::None,
        }
    }

    #[must_use]
    pub fn deny(reason: EntitlementResultReason) -> Self {
        CachedResult::Bool {
            allowed: false,
            reason,
        }
    }

    /// `allowed` with `reason` reported only on denial
    #[must_use]
    pub fn from_bool(allowed: bool, reason: EntitlementResultReason) -> Self {
        CachedResult::Bool { allowed, reason }
    }

    /// Reason reported to callers; always `None` for allowed values
    #[must_use]
    pub fn reason(&self) -> EntitlementResultReason {
        match self {
            CachedResult::Bool { allowed: false, reason } => *reason,
            CachedResult::MembershipStatus { status } if !status.is_member => {
                EntitlementResultReason::Membership
            }
            CachedResult::MembershipStatus { status } if status.is_expired => {
                EntitlementResultReason::MembershipExpired
            }
            _ => EntitlementResultReason::None,
        }
    }

    pub(crate) fn into_entitlement_data(self) -> Result<Arc<EntitlementData>> {
        match self {
            CachedResult::EntitlementData { data } => Ok(data),
            other => Err(unexpected("entitlement data", &other)),
        }
    }

    pub(crate) fn into_membership_status(self) -> Result<MembershipStatus> {
        match self {
            CachedResult::MembershipStatus { status } => Ok(status),
            other => Err(unexpected("membership status", &other)),
        }
    }

    pub(crate) fn into_linked_wallets(self) -> Result<Arc<Vec<Address>>> {
        match self {
            CachedResult::LinkedWallets { wallets } => Ok(wallets),
            other => Err(unexpected("linked wallets", &other)),
        }
    }

    pub(crate) fn into_user_is_app(self) -> Result<Option<Address>> {
        match self {
            CachedResult::UserIsApp { app_address } => Ok(app_address),
            other => Err(unexpected("user-is-app", &other)),
        }
    }
}

fn unexpected(expected: &str, found: &CachedResult) -> Error {
    Error::internal(format!("cache held {found:?} where {expected} was expected"))
}

impl CacheResult for CachedResult {
    fn is_allowed(&self) -> bool {
        match self {
            CachedResult::Bool { allowed, .. } => *allowed,
            CachedResult::MembershipStatus { status } => status.is_active(),
            // Only successful reads are stored, and they are always worth keeping
            CachedResult::EntitlementData { .. }
            | CachedResult::LinkedWallets { .. }
            | CachedResult::UserIsApp { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainauth_core::TokenId;

    #[test]
    fn test_allowed_bool_hides_reason() {
        let value = CachedResult::from_bool(true, EntitlementResultReason::SpaceDisabled);
        assert!(value.is_allowed());
        assert_eq!(value.reason(), EntitlementResultReason::None);

        let value = CachedResult::from_bool(false, EntitlementResultReason::SpaceDisabled);
        assert!(!value.is_allowed());
        assert_eq!(value.reason(), EntitlementResultReason::SpaceDisabled);
    }

    #[test]
    fn test_membership_status_tier_and_reason() {
        let expired = CachedResult::MembershipStatus {
            status: MembershipStatus {
                is_member: true,
                is_expired: true,
                token_ids: vec![TokenId::from(1)],
                expiry_time: None,
                expired_at: Some(10),
            },
        };
        assert!(!expired.is_allowed());
        assert_eq!(expired.reason(), EntitlementResultReason::MembershipExpired);

        let none = CachedResult::MembershipStatus {
            status: MembershipStatus::not_member(),
        };
        assert_eq!(none.reason(), EntitlementResultReason::Membership);
    }
}
