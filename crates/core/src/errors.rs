use crate::types::{Address, StreamId};
use std::time::Duration;

/// Result type alias for entitlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for entitlement operations.
///
/// Only infrastructure and configuration failures are errors. A conclusive
/// "not entitled" answer is a normal return value carrying an
/// [`EntitlementResultReason`](crate::EntitlementResultReason).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chain reported that the requested contract or record does not exist
    #[error("{method} on contract {contract}: not found")]
    NotFound {
        contract: Address,
        method: &'static str,
    },

    /// A contract view call failed
    #[error("{method} on contract {contract} failed: {message}")]
    ContractCall {
        contract: Address,
        method: &'static str,
        message: String,
    },

    /// The chain answered with a value of the wrong shape
    #[error("malformed response from {method}: expected {expected}")]
    MalformedResponse {
        method: &'static str,
        expected: &'static str,
    },

    /// Operation timeout errors
    #[error("operation '{operation}' timed out after {duration:?}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// The principal has more linked wallets than the node is willing to evaluate
    #[error("too many wallets linked to the root key {root_key}: {wallets} > {limit}")]
    ResourceExhausted {
        root_key: Address,
        wallets: usize,
        limit: usize,
    },

    /// One or more membership lookups failed and no linked wallet was found to be a member
    #[error("{}", format_cannot_check(.principal, .space_id, .sources))]
    CannotCheckEntitlements {
        principal: Address,
        space_id: StreamId,
        sources: Vec<Error>,
    },

    /// Malformed address input
    #[error("invalid address '{input}': {reason}")]
    InvalidAddress { input: String, reason: String },

    /// Malformed stream id input
    #[error("invalid stream id '{input}': {reason}")]
    InvalidStreamId { input: String, reason: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Metrics registration errors
    #[error("metrics error: {message}")]
    Metrics { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Internal invariant violations
    #[error("internal error: {message}")]
    Internal { message: String },
}

fn format_cannot_check(principal: &Address, space_id: &StreamId, sources: &[Error]) -> String {
    let joined = sources
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "cannot check entitlements: membership of {principal} in space {space_id} could not be evaluated: {joined}"
    )
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

impl Error {
    /// Create a not-found error for a contract view call
    #[must_use]
    pub fn not_found(contract: Address, method: &'static str) -> Self {
        Error::NotFound { contract, method }
    }

    /// Create a contract call error
    #[must_use]
    pub fn contract_call(
        contract: Address,
        method: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Error::ContractCall {
            contract,
            method,
            message: message.into(),
        }
    }

    /// Create a malformed response error
    #[must_use]
    pub fn malformed_response(method: &'static str, expected: &'static str) -> Self {
        Error::MalformedResponse { method, expected }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
        }
    }

    /// Create a metrics error
    #[must_use]
    pub fn metrics(message: impl Into<String>) -> Self {
        Error::Metrics {
            message: message.into(),
        }
    }

    /// Whether this error means the chain could not give a conclusive answer.
    ///
    /// Callers at the RPC boundary must treat every error as a denial; this is
    /// only used to classify log output.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. }
                | Error::ContractCall { .. }
                | Error::MalformedResponse { .. }
                | Error::Timeout { .. }
                | Error::ResourceExhausted { .. }
                | Error::CannotCheckEntitlements { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cannot_check_joins_sources() {
        let contract = Address::from_low_u64(7);
        let err = Error::CannotCheckEntitlements {
            principal: Address::from_low_u64(1),
            space_id: StreamId::space(Address::from_low_u64(2)),
            sources: vec![
                Error::contract_call(contract, "tokensOfOwner", "rpc unavailable"),
                Error::timeout("tokensOfOwner", Duration::from_secs(1)),
            ],
        };

        let message = err.to_string();
        assert!(message.contains("rpc unavailable"));
        assert!(message.contains("; operation 'tokensOfOwner' timed out"));
        assert!(err.is_infrastructure());
    }

    #[test]
    fn test_configuration_is_not_infrastructure() {
        assert!(!Error::configuration("bad").is_infrastructure());
    }
}
