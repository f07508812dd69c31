//! Contract adapters for entitlement checks
//!
//! Everything on chain is reached through one seam, [`ChainReader`], which
//! issues a single typed [`ContractCall`] and returns a typed [`CallOutput`].
//! The adapters here build domain reads on top of it:
//!
//! - [`SpaceContract`]: enablement, entitlement data, membership, bans and app
//!   installation for a space
//! - [`WalletLinkContract`]: root key and linked wallets of a principal
//! - [`AppRegistryContract`]: app identity and app ownership
//!
//! Enable the `test_utils` feature for [`test_utils::FakeChain`].

pub mod app_registry;
pub mod marshal;
pub mod reader;
pub mod space;
pub mod wallet_link;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use app_registry::{AppRegistryContract, ChainAppRegistry, NoAppRegistry};
pub use reader::{CallOutput, ChainReader, ChannelInfo, ContractCall, RawEntitlement};
pub use space::{ChainSpaceContract, SpaceContract};
pub use wallet_link::{ChainWalletLink, WalletLinkContract};
