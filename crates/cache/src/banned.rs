//! Per-space cache of banned membership token ids

use chainauth_core::{Result, TokenId};
use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Default)]
struct BannedState {
    banned: HashSet<TokenId>,
    last_refreshed: Option<Instant>,
}

/// Banned token ids of one space, refreshed lazily once older than the TTL.
///
/// The lock is held across the refresh so concurrent callers wait for one
/// chain read instead of issuing their own. A failed refresh leaves the
/// previous set and timestamp untouched and is reported to the caller.
pub struct BannedTokenCache {
    ttl: Duration,
    state: Mutex<BannedState>,
}

impl BannedTokenCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(BannedState::default()),
        }
    }

    /// Whether any of `token_ids` is banned, refreshing the set through
    /// `refresh` first if it is stale
    pub async fn is_banned<F, Fut>(&self, token_ids: &[TokenId], refresh: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HashSet<TokenId>>>,
    {
        let mut state = self.state.lock().await;

        let stale = state
            .last_refreshed
            .map_or(true, |at| at.elapsed() >= self.ttl);
        if stale {
            let banned = refresh().await?;
            tracing::trace!(banned = banned.len(), "Refreshed banned token ids");
            state.banned = banned;
            state.last_refreshed = Some(Instant::now());
        }

        Ok(token_ids.iter().any(|id| state.banned.contains(id)))
    }

    /// Current banned set, without refreshing
    pub async fn snapshot(&self) -> HashSet<TokenId> {
        self.state.lock().await.banned.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainauth_core::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ids(values: &[u64]) -> HashSet<TokenId> {
        values.iter().copied().map(TokenId::from).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_is_lazy_and_ttl_gated() {
        let cache = BannedTokenCache::new(Duration::from_secs(1));
        let one = [TokenId::from(1)];
        let two = [TokenId::from(2)];

        assert!(cache.is_banned(&one, || async { Ok(ids(&[1])) }).await.unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!cache.is_banned(&one, || async { Ok(ids(&[2])) }).await.unwrap());
        assert_eq!(cache.snapshot().await, ids(&[2]));

        let refreshes = AtomicUsize::new(0);
        let refresh = || async {
            refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(ids(&[1]))
        };
        assert!(!cache.is_banned(&one, refresh).await.unwrap());
        assert!(cache.is_banned(&two, refresh).await.unwrap());
        assert_eq!(refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(cache.snapshot().await, ids(&[2]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_refresh_keeps_previous_state() {
        let cache = BannedTokenCache::new(Duration::from_secs(1));
        let seven = [TokenId::from(7)];
        assert!(cache.is_banned(&seven, || async { Ok(ids(&[7])) }).await.unwrap());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let result = cache
            .is_banned(&seven, || async { Err(Error::internal("rpc down")) })
            .await;
        assert!(result.is_err());
        assert_eq!(cache.snapshot().await, ids(&[7]));

        // still stale, so the next call refreshes again
        assert!(!cache.is_banned(&seven, || async { Ok(ids(&[])) }).await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_token_list_is_never_banned() {
        let cache = BannedTokenCache::new(Duration::from_secs(1));
        assert!(!cache.is_banned(&[], || async { Ok(ids(&[1, 2, 3])) }).await.unwrap());
    }
}
