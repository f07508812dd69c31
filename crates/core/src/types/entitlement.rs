//! Entitlement and membership snapshots read from space contracts
//!
//! These are fixed shapes consumed from the chain. Rule payloads stay opaque
//! here; only the rule evaluator interprets them.

use super::newtypes::{Address, TokenId};
use serde::{Deserialize, Serialize};

/// ABI-encoded rule data in the legacy (v1) layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleDataV1(pub Vec<u8>);

/// ABI-encoded rule data in the current (v2) layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleDataV2(pub Vec<u8>);

/// One entitlement module attached to a permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entitlement {
    /// Legacy rule entitlement; converted to v2 before evaluation
    Rule(RuleDataV1),
    /// Rule entitlement evaluated directly
    RuleV2(RuleDataV2),
    /// Explicit list of users; [`Address::EVERYONE`] opens it to all
    User(Vec<Address>),
    /// A module type this node does not understand; never matches
    Unknown { module_type: String },
}

impl Entitlement {
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Entitlement::Rule(_) => "RuleEntitlement",
            Entitlement::RuleV2(_) => "RuleEntitlementV2",
            Entitlement::User(_) => "UserEntitlement",
            Entitlement::Unknown { module_type } => module_type,
        }
    }
}

/// Owner and entitlement modules of a space or channel for one permission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementData {
    pub owner: Address,
    pub entitlements: Vec<Entitlement>,
}

/// Membership snapshot of one wallet in one space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipStatus {
    pub is_member: bool,
    pub is_expired: bool,
    pub token_ids: Vec<TokenId>,
    /// Furthest expiry among active tokens; `Some(0)` when a token never expires
    pub expiry_time: Option<u64>,
    /// Most recent expiry when every token has expired
    pub expired_at: Option<u64>,
}

impl MembershipStatus {
    /// Status of a wallet holding no membership token
    #[must_use]
    pub fn not_member() -> Self {
        Self {
            is_member: false,
            is_expired: true,
            token_ids: Vec::new(),
            expiry_time: None,
            expired_at: None,
        }
    }

    /// Member with at least one unexpired token
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_member && !self.is_expired
    }
}
