//! Machine-readable reasons attached to entitlement decisions

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Why an entitlement check came out the way it did.
///
/// `None` accompanies allowed results. Every other variant names a conclusive
/// denial; none of them are errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitlementResultReason {
    #[default]
    None,
    Membership,
    MembershipExpired,
    SpaceEntitlements,
    ChannelEntitlements,
    SpaceDisabled,
    ChannelDisabled,
    WalletNotLinked,
    IsApp,
    IsNotApp,
    MismatchedAppAddress,
    AppEntitlements,
    IsNotBotOwner,
}

impl EntitlementResultReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::Membership => "MEMBERSHIP",
            Self::MembershipExpired => "MEMBERSHIP_EXPIRED",
            Self::SpaceEntitlements => "SPACE_ENTITLEMENTS",
            Self::ChannelEntitlements => "CHANNEL_ENTITLEMENTS",
            Self::SpaceDisabled => "SPACE_DISABLED",
            Self::ChannelDisabled => "CHANNEL_DISABLED",
            Self::WalletNotLinked => "WALLET_NOT_LINKED",
            Self::IsApp => "USER_IS_APP",
            Self::IsNotApp => "USER_IS_NOT_APP",
            Self::MismatchedAppAddress => "MISMATCHED_APP_ADDRESS",
            Self::AppEntitlements => "APP_ENTITLEMENTS",
            Self::IsNotBotOwner => "IS_NOT_BOT_OWNER",
        }
    }
}

impl Display for EntitlementResultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
