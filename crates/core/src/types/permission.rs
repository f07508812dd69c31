//! Permissions that entitlements grant on spaces and channels

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A permission as named by the space contracts.
///
/// The string form is what the contracts expect in
/// `getEntitlementDataByPermission` and app entitlement checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[default]
    Undefined,
    Read,
    Write,
    Invite,
    JoinSpace,
    Redact,
    ModifyBanning,
    PinMessage,
    AddRemoveChannels,
    ModifySpaceSettings,
    React,
    Ownership,
}

impl Permission {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Undefined => "Undefined",
            Permission::Read => "Read",
            Permission::Write => "Write",
            Permission::Invite => "Invite",
            Permission::JoinSpace => "JoinSpace",
            Permission::Redact => "Redact",
            Permission::ModifyBanning => "ModifyBanning",
            Permission::PinMessage => "PinMessage",
            Permission::AddRemoveChannels => "AddRemoveChannels",
            Permission::ModifySpaceSettings => "ModifySpaceSettings",
            Permission::React => "React",
            Permission::Ownership => "Ownership",
        }
    }

    /// The permission name right-padded into a 32-byte word, as app entitlement checks take it
    #[must_use]
    pub fn as_bytes32(&self) -> [u8; 32] {
        let mut word = [0u8; 32];
        let name = self.as_str().as_bytes();
        word[..name.len()].copy_from_slice(name);
        word
    }
}

impl Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes32_is_right_padded() {
        let word = Permission::Read.as_bytes32();
        assert_eq!(&word[..4], b"Read");
        assert!(word[4..].iter().all(|b| *b == 0));
    }
}
