//! Request-scoped entitlement bypass for test deployments
//!
//! A request interceptor that has verified the bypass header runs the rest of
//! the request inside [`with_test_bypass`]. The engine only honours the flag
//! when a non-empty bypass secret is configured.

use std::future::Future;

/// Header carrying the shared bypass secret
pub const TEST_BYPASS_HEADER: &str = "x-chainauth-test-entitlements-bypass";

tokio::task_local! {
    static TEST_BYPASS: bool;
}

/// Run `future` with the bypass flag set for every check it awaits
pub async fn with_test_bypass<F: Future>(future: F) -> F::Output {
    TEST_BYPASS.scope(true, future).await
}

/// Whether the current task runs inside [`with_test_bypass`]
#[must_use]
pub fn bypass_requested() -> bool {
    TEST_BYPASS.try_with(|flag| *flag).unwrap_or(false)
}

/// Whether a presented header value matches the configured secret
#[must_use]
pub fn header_grants_bypass(configured_secret: &str, presented: Option<&str>) -> bool {
    let Some(presented) = presented else {
        return false;
    };
    if configured_secret.is_empty() || presented.len() != configured_secret.len() {
        return false;
    }
    presented
        .bytes()
        .zip(configured_secret.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flag_is_scoped_to_the_future() {
        assert!(!bypass_requested());
        assert!(with_test_bypass(async { bypass_requested() }).await);
        assert!(!bypass_requested());
    }

    #[test]
    fn test_header_requires_configured_secret() {
        assert!(header_grants_bypass("s3cret", Some("s3cret")));
        assert!(!header_grants_bypass("s3cret", Some("s3creT")));
        assert!(!header_grants_bypass("s3cret", None));
        assert!(!header_grants_bypass("", Some("")));
    }
}
