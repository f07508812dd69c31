//! Newtype wrappers for chain identifiers

use crate::errors::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Display};
use std::str::FromStr;

/// A 20-byte EVM account or contract address
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The zero address, used on chain to mean "unset"
    pub const ZERO: Address = Address([0u8; 20]);

    /// The address `0x…01`, which user entitlements list to grant access to everyone
    pub const EVERYONE: Address = Address([
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1,
    ]);

    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Build an address whose low 8 bytes hold `value`; handy for fixtures
    #[must_use]
    pub fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; 20];
        bytes[12..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse a hex address, with or without the `0x` prefix
    pub fn from_hex(input: &str) -> Result<Self> {
        let digits = input
            .strip_prefix("0x")
            .or_else(|| input.strip_prefix("0X"))
            .unwrap_or(input);
        let raw = hex::decode(digits).map_err(|e| Error::InvalidAddress {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&raw).map_err(|_| Error::InvalidAddress {
            input: input.to_string(),
            reason: format!("expected 20 bytes, got {}", raw.len()),
        })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 20] = bytes.try_into().map_err(|_| Error::InvalidAddress {
            input: hex::encode(bytes),
            reason: format!("expected 20 bytes, got {}", bytes.len()),
        })?;
        Ok(Self(array))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `None` for the zero address, `Some(self)` otherwise
    #[must_use]
    pub fn non_zero(self) -> Option<Self> {
        if self.is_zero() {
            None
        } else {
            Some(self)
        }
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// The kind of stream, encoded in the first byte of its id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Space,
    Channel,
    User,
}

impl StreamKind {
    const SPACE_PREFIX: u8 = 0x10;
    const CHANNEL_PREFIX: u8 = 0x20;
    const USER_PREFIX: u8 = 0xa8;

    fn prefix(self) -> u8 {
        match self {
            StreamKind::Space => Self::SPACE_PREFIX,
            StreamKind::Channel => Self::CHANNEL_PREFIX,
            StreamKind::User => Self::USER_PREFIX,
        }
    }

    fn expected_len(self) -> usize {
        match self {
            StreamKind::Space | StreamKind::Channel => 32,
            StreamKind::User => 21,
        }
    }

    fn from_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            Self::SPACE_PREFIX => Some(StreamKind::Space),
            Self::CHANNEL_PREFIX => Some(StreamKind::Channel),
            Self::USER_PREFIX => Some(StreamKind::User),
            _ => None,
        }
    }
}

/// Identifier of a space, channel or user stream.
///
/// Space ids embed the space contract address in bytes `1..21`, which is how
/// contract adapters locate the on-chain space.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(Vec<u8>);

impl StreamId {
    /// Stream id of the space deployed at `space_address`
    #[must_use]
    pub fn space(space_address: Address) -> Self {
        let mut bytes = Vec::with_capacity(32);
        bytes.push(StreamKind::Space.prefix());
        bytes.extend_from_slice(space_address.as_bytes());
        bytes.resize(32, 0);
        Self(bytes)
    }

    /// Stream id of a channel inside the space at `space_address`.
    ///
    /// `suffix` distinguishes channels of the same space; it is truncated or
    /// zero-padded to 11 bytes.
    #[must_use]
    pub fn channel(space_address: Address, suffix: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(32);
        bytes.push(StreamKind::Channel.prefix());
        bytes.extend_from_slice(space_address.as_bytes());
        bytes.extend(suffix.iter().take(11));
        bytes.resize(32, 0);
        Self(bytes)
    }

    /// Stream id of the user stream belonging to `user`
    #[must_use]
    pub fn user(user: Address) -> Self {
        let mut bytes = Vec::with_capacity(21);
        bytes.push(StreamKind::User.prefix());
        bytes.extend_from_slice(user.as_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidStreamId {
            input: hex::encode(bytes),
            reason,
        };
        let prefix = *bytes.first().ok_or_else(|| invalid("empty".to_string()))?;
        let kind = StreamKind::from_prefix(prefix)
            .ok_or_else(|| invalid(format!("unknown prefix 0x{prefix:02x}")))?;
        if bytes.len() != kind.expected_len() {
            return Err(invalid(format!(
                "expected {} bytes for {kind:?} stream, got {}",
                kind.expected_len(),
                bytes.len()
            )));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn from_hex(input: &str) -> Result<Self> {
        let digits = input.strip_prefix("0x").unwrap_or(input);
        let raw = hex::decode(digits).map_err(|e| Error::InvalidStreamId {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(&raw)
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        // Constructors and from_bytes guarantee a known prefix.
        StreamKind::from_prefix(self.0[0]).unwrap_or(StreamKind::User)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Address of the contract embedded in a space or channel id
    pub fn contract_address(&self) -> Result<Address> {
        match self.kind() {
            StreamKind::Space | StreamKind::Channel => Address::from_slice(&self.0[1..21]),
            StreamKind::User => Err(Error::InvalidStreamId {
                input: self.to_string(),
                reason: "user streams do not embed a contract address".to_string(),
            }),
        }
    }

    /// Address of the user owning a user stream
    pub fn user_address(&self) -> Result<Address> {
        match self.kind() {
            StreamKind::User => Address::from_slice(&self.0[1..21]),
            _ => Err(Error::InvalidStreamId {
                input: self.to_string(),
                reason: "not a user stream".to_string(),
            }),
        }
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamId({})", hex::encode(&self.0))
    }
}

impl FromStr for StreamId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// A membership NFT token id (uint256 on chain), kept in canonical decimal form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(String);

impl TokenId {
    /// Parse a decimal token id; leading zeros are dropped
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::internal(format!("failed to parse token id '{input}'")));
        }
        let trimmed = input.trim_start_matches('0');
        if trimmed.is_empty() {
            Ok(Self("0".to_string()))
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for TokenId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TokenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_hex_round_trip() {
        let address = Address::from_hex("0x00000000000000000000000000000000000000aa").unwrap();
        assert_eq!(address, Address::from_low_u64(0xaa));
        assert_eq!(address.to_string(), "0x00000000000000000000000000000000000000aa");
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("not-hex").is_err());
    }

    #[test]
    fn test_everyone_address() {
        assert_eq!(Address::EVERYONE, Address::from_low_u64(1));
        assert!(Address::ZERO.is_zero());
        assert_eq!(Address::ZERO.non_zero(), None);
    }

    #[test]
    fn test_space_stream_embeds_contract() {
        let space_address = Address::from_low_u64(0xbeef);
        let space = StreamId::space(space_address);
        assert_eq!(space.kind(), StreamKind::Space);
        assert_eq!(space.as_bytes().len(), 32);
        assert_eq!(space.contract_address().unwrap(), space_address);

        let channel = StreamId::channel(space_address, b"general");
        assert_eq!(channel.kind(), StreamKind::Channel);
        assert_eq!(channel.contract_address().unwrap(), space_address);
        assert_ne!(channel, StreamId::channel(space_address, b"random"));
    }

    #[test]
    fn test_user_stream() {
        let user = Address::from_low_u64(42);
        let stream = StreamId::user(user);
        assert_eq!(stream.kind(), StreamKind::User);
        assert_eq!(stream.user_address().unwrap(), user);
        assert!(stream.contract_address().is_err());

        let parsed: StreamId = stream.to_string().parse().unwrap();
        assert_eq!(parsed, stream);
    }

    #[test]
    fn test_stream_id_rejects_bad_input() {
        assert!(StreamId::from_bytes(&[]).is_err());
        assert!(StreamId::from_bytes(&[0x77; 32]).is_err());
        assert!(StreamId::from_bytes(&[0x10; 21]).is_err());
    }

    #[test]
    fn test_token_id_canonical_form() {
        assert_eq!(TokenId::parse("0007").unwrap(), TokenId::from(7));
        assert_eq!(TokenId::parse("000").unwrap().as_str(), "0");
        assert!(TokenId::parse("").is_err());
        assert!(TokenId::parse("12a").is_err());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn token_id_ignores_leading_zeros(value in any::<u64>(), zeros in 0usize..5) {
                let padded = format!("{}{value}", "0".repeat(zeros));
                prop_assert_eq!(TokenId::parse(&padded).unwrap(), TokenId::from(value));
            }

            #[test]
            fn stream_id_from_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..40)) {
                if let Ok(stream) = StreamId::from_bytes(&bytes) {
                    prop_assert_eq!(stream.as_bytes(), bytes.as_slice());
                }
            }
        }
    }
}
