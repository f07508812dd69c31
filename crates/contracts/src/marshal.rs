//! Decoding of raw entitlement modules into [`Entitlement`] values

use crate::reader::RawEntitlement;
use chainauth_core::{Address, Entitlement, Error, Result, RuleDataV1, RuleDataV2};

pub const MODULE_TYPE_RULE: &str = "RuleEntitlement";
pub const MODULE_TYPE_RULE_V2: &str = "RuleEntitlementV2";
pub const MODULE_TYPE_USER: &str = "UserEntitlement";

const WORD: usize = 32;
const METHOD: &str = "getEntitlementDataByPermission";

/// Turn one module into an [`Entitlement`]. Unknown module types are kept
/// as [`Entitlement::Unknown`] so evaluation can skip them.
pub fn marshal_entitlement(raw: &RawEntitlement) -> Result<Entitlement> {
    match raw.module_type.as_str() {
        MODULE_TYPE_RULE => Ok(Entitlement::Rule(RuleDataV1(raw.data.clone()))),
        MODULE_TYPE_RULE_V2 => Ok(Entitlement::RuleV2(RuleDataV2(raw.data.clone()))),
        MODULE_TYPE_USER => decode_address_array(&raw.data).map(Entitlement::User),
        other => Ok(Entitlement::Unknown {
            module_type: other.to_string(),
        }),
    }
}

pub fn marshal_entitlements(raw: &[RawEntitlement]) -> Result<Vec<Entitlement>> {
    raw.iter()
        .enumerate()
        .map(|(index, entitlement)| {
            marshal_entitlement(entitlement).inspect_err(|e| {
                tracing::warn!(index, error = %e, "Failed to marshal entitlement");
            })
        })
        .collect()
}

/// ABI-encode `address[]` as a single dynamic return value
#[must_use]
pub fn encode_address_array(addresses: &[Address]) -> Vec<u8> {
    let mut out = Vec::with_capacity(WORD * (2 + addresses.len()));
    out.extend_from_slice(&usize_word(WORD));
    out.extend_from_slice(&usize_word(addresses.len()));
    for address in addresses {
        let mut word = [0u8; WORD];
        word[12..].copy_from_slice(address.as_bytes());
        out.extend_from_slice(&word);
    }
    out
}

/// Decode an ABI-encoded `address[]`
pub fn decode_address_array(data: &[u8]) -> Result<Vec<Address>> {
    let offset = read_usize(data, 0)?;
    let len = read_usize(data, offset)?;
    if len > data.len() / WORD {
        return Err(Error::malformed_response(METHOD, "address[] length"));
    }
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| Error::malformed_response(METHOD, "address[] offset"))?;

    (0..len)
        .map(|i| {
            let at = start + i * WORD;
            let word = data
                .get(at..at + WORD)
                .ok_or_else(|| Error::malformed_response(METHOD, "address[] element"))?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(Error::malformed_response(METHOD, "left-padded address"));
            }
            Address::from_slice(&word[12..])
        })
        .collect()
}

fn usize_word(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn read_usize(data: &[u8], at: usize) -> Result<usize> {
    let word = data
        .get(at..at.saturating_add(WORD))
        .filter(|w| w.len() == WORD)
        .ok_or_else(|| Error::malformed_response(METHOD, "32-byte word"))?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(Error::malformed_response(METHOD, "word fitting in 64 bits"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(bytes))
        .map_err(|_| Error::malformed_response(METHOD, "word fitting in usize"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_entitlement_decodes_addresses() {
        let users = vec![Address::EVERYONE, Address::from_low_u64(0xaaa)];
        let raw = RawEntitlement {
            module_type: MODULE_TYPE_USER.to_string(),
            data: encode_address_array(&users),
        };

        assert_eq!(marshal_entitlement(&raw).unwrap(), Entitlement::User(users));
    }

    #[test]
    fn test_unknown_module_is_preserved() {
        let raw = RawEntitlement {
            module_type: "GatedByVibes".to_string(),
            data: vec![1, 2, 3],
        };
        assert_eq!(
            marshal_entitlement(&raw).unwrap(),
            Entitlement::Unknown {
                module_type: "GatedByVibes".to_string()
            }
        );
    }

    #[test]
    fn test_truncated_user_data_is_malformed() {
        let mut data = encode_address_array(&[Address::from_low_u64(1)]);
        data.truncate(data.len() - 1);
        let raw = RawEntitlement {
            module_type: MODULE_TYPE_USER.to_string(),
            data,
        };
        assert!(matches!(
            marshal_entitlement(&raw),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_rule_payloads_stay_opaque() {
        let raw = RawEntitlement {
            module_type: MODULE_TYPE_RULE.to_string(),
            data: vec![9; 64],
        };
        assert_eq!(
            marshal_entitlement(&raw).unwrap(),
            Entitlement::Rule(RuleDataV1(vec![9; 64]))
        );
    }
}
