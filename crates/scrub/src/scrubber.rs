//! Membership scrubber
//!
//! A scrub reloads a stream's members and re-runs the entitlement check for
//! each of them with read permission. Members that fail the check get a leave
//! event on their own user stream. At most one scrub per stream is queued or
//! running at any time; scrubs across streams share a bounded pool.

use crate::metrics::ScrubMetrics;
use crate::stream::{
    EventAppender, LeaveReason, MembershipLeave, StreamMember, StreamView, StreamViewSource,
};
use chainauth_config::ScrubbingConfig;
use chainauth_core::{EntitlementResultReason, Permission, Result, StreamId};
use chainauth_engine::{EntitlementChecker, QueryDescriptor};
use chainauth_utils::tracing::scrub_span;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::Instrument;

#[derive(Clone)]
pub struct MembershipScrubber {
    inner: Arc<Inner>,
}

struct Inner {
    checker: Arc<dyn EntitlementChecker>,
    views: Arc<dyn StreamViewSource>,
    appender: Arc<dyn EventAppender>,
    pool: Arc<Semaphore>,
    /// Streams with a scrub queued or running, and when it was scheduled
    pending: DashMap<StreamId, Instant>,
    last_scrubbed: DashMap<StreamId, Instant>,
    /// Next time `last_scrubbed` is swept for entries past the window
    next_prune: Mutex<Instant>,
    eligible_after: Option<Duration>,
    metrics: ScrubMetrics,
}

impl MembershipScrubber {
    pub fn new(
        config: &ScrubbingConfig,
        checker: Arc<dyn EntitlementChecker>,
        views: Arc<dyn StreamViewSource>,
        appender: Arc<dyn EventAppender>,
        registry: &Registry,
    ) -> Result<Self> {
        let metrics = ScrubMetrics::new(registry)?;
        tracing::debug!(
            workers = config.worker_pool_size(),
            eligible_after = ?config.eligible_duration(),
            "Starting membership scrubber"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                checker,
                views,
                appender,
                pool: Arc::new(Semaphore::new(config.worker_pool_size())),
                pending: DashMap::new(),
                last_scrubbed: DashMap::new(),
                next_prune: Mutex::new(Instant::now()),
                eligible_after: config.eligible_duration(),
                metrics,
            }),
        })
    }

    /// Schedule a scrub of `stream_id`.
    ///
    /// Returns `true` when a scrub for the stream was already pending, in
    /// which case nothing new is scheduled. Must be called within a tokio
    /// runtime.
    pub fn scrub(&self, stream_id: &StreamId) -> bool {
        match self.inner.pending.entry(stream_id.clone()) {
            Entry::Occupied(_) => {
                tracing::trace!(stream_id = %stream_id, "Scrub already pending");
                return true;
            }
            Entry::Vacant(entry) => {
                entry.insert(Instant::now());
            }
        }

        let mut guard = PendingGuard {
            inner: Arc::clone(&self.inner),
            stream_id: stream_id.clone(),
            finished: false,
        };
        tokio::spawn(async move {
            // The pool is never closed, so a permit always arrives
            if let Ok(_permit) = Arc::clone(&guard.inner.pool).acquire_owned().await {
                guard
                    .inner
                    .scrub_stream(&guard.stream_id)
                    .instrument(scrub_span(&guard.stream_id))
                    .await;
            }
            guard.finished = true;
        });
        false
    }

    /// Schedule a scrub if the stream has not been scrubbed within the
    /// eligibility window. Returns whether a new scrub was scheduled.
    pub fn maybe_scrub(&self, stream_id: &StreamId) -> bool {
        let Some(eligible_after) = self.inner.eligible_after else {
            return false;
        };

        let now = Instant::now();
        self.inner.prune_last_scrubbed(now, eligible_after);
        let due = match self.inner.last_scrubbed.entry(stream_id.clone()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) > eligible_after {
                    entry.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        };

        due && !self.scrub(stream_id)
    }

    #[must_use]
    pub fn is_pending(&self, stream_id: &StreamId) -> bool {
        self.inner.pending.contains_key(stream_id)
    }

    pub fn metrics(&self) -> &ScrubMetrics {
        &self.inner.metrics
    }
}

/// Clears a stream's pending mark when its scrub task ends, including by
/// panic or cancellation
struct PendingGuard {
    inner: Arc<Inner>,
    stream_id: StreamId,
    finished: bool,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let Some((_, scheduled_at)) = self.inner.pending.remove(&self.stream_id) else {
            return;
        };
        let elapsed_ms = scheduled_at.elapsed().as_millis() as u64;
        if self.finished {
            tracing::debug!(stream_id = %self.stream_id, elapsed_ms, "Scrub finished");
        } else {
            self.inner.metrics.scrub_finished("aborted");
            tracing::error!(stream_id = %self.stream_id, elapsed_ms, "Scrub task aborted");
        }
    }
}

impl Inner {
    /// Drop scrub timestamps older than the window. A missing entry and an
    /// expired one both make the stream due, so pruning never changes which
    /// scrubs run.
    fn prune_last_scrubbed(&self, now: Instant, eligible_after: Duration) {
        {
            let mut next_prune = self.next_prune.lock();
            if now < *next_prune {
                return;
            }
            *next_prune = now + eligible_after;
        }
        self.last_scrubbed
            .retain(|_, scrubbed_at| now.duration_since(*scrubbed_at) <= eligible_after);
    }

    async fn scrub_stream(&self, stream_id: &StreamId) {
        let view = match self.views.load_view(stream_id).await {
            Ok(view) => view,
            Err(e) => {
                tracing::error!(stream_id = %stream_id, error = %e, "Failed to load stream for scrub");
                self.metrics.scrub_finished("failed");
                return;
            }
        };

        tracing::debug!(
            stream_id = %stream_id,
            members = view.members.len(),
            "Scrubbing stream members"
        );
        for member in &view.members {
            if let Err(e) = self.scrub_member(stream_id, &view, member).await {
                tracing::warn!(
                    stream_id = %stream_id,
                    user = %member.user,
                    error = %e,
                    "Failed to scrub member"
                );
            }
        }
        self.metrics.scrub_finished("completed");
    }

    async fn scrub_member(
        &self,
        stream_id: &StreamId,
        view: &StreamView,
        member: &StreamMember,
    ) -> Result<()> {
        let query = match &view.channel_id {
            Some(channel_id) => QueryDescriptor::for_channel(
                view.space_id.clone(),
                channel_id.clone(),
                member.user,
                Permission::Read,
                member.app_address,
            ),
            None => QueryDescriptor::for_space(
                view.space_id.clone(),
                member.user,
                Permission::Read,
                member.app_address,
            ),
        };

        let result = self.checker.is_entitled(&query).await?;
        if result.allowed {
            return Ok(());
        }

        let reason = match result.reason {
            EntitlementResultReason::MembershipExpired => LeaveReason::MembershipExpired,
            _ => LeaveReason::NotEntitled,
        };
        self.metrics.entitlement_lost(reason);
        tracing::info!(
            stream_id = %stream_id,
            user = %member.user,
            reason = %reason,
            denial = %result.reason,
            "Entitlement loss detected, adding leave event for user"
        );

        self.appender
            .add_event_payload(
                &StreamId::user(member.user),
                MembershipLeave {
                    stream_id: stream_id.clone(),
                    user: member.user,
                    reason,
                },
            )
            .await?;
        self.metrics.booted();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chainauth_core::{Address, Error};
    use chainauth_engine::IsEntitledResult;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeChecker {
        denied: Mutex<HashMap<Address, EntitlementResultReason>>,
        failing: Mutex<Vec<Address>>,
        queries: Mutex<Vec<QueryDescriptor>>,
    }

    #[async_trait]
    impl EntitlementChecker for FakeChecker {
        async fn is_entitled(&self, query: &QueryDescriptor) -> Result<IsEntitledResult> {
            self.queries.lock().push(query.clone());
            if self.failing.lock().contains(&query.principal()) {
                return Err(Error::internal("rpc unavailable"));
            }
            Ok(match self.denied.lock().get(&query.principal()) {
                Some(reason) => IsEntitledResult {
                    allowed: false,
                    reason: *reason,
                },
                None => IsEntitledResult {
                    allowed: true,
                    reason: EntitlementResultReason::None,
                },
            })
        }
    }

    struct FakeViews {
        view: Option<StreamView>,
        delay: Duration,
        loads: AtomicUsize,
    }

    #[async_trait]
    impl StreamViewSource for FakeViews {
        async fn load_view(&self, stream_id: &StreamId) -> Result<StreamView> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.view
                .clone()
                .ok_or_else(|| Error::internal(format!("stream {stream_id} not loaded")))
        }
    }

    #[derive(Default)]
    struct RecordingAppender {
        events: Mutex<Vec<(StreamId, MembershipLeave)>>,
    }

    #[async_trait]
    impl EventAppender for RecordingAppender {
        async fn add_event_payload(&self, user_stream: &StreamId, leave: MembershipLeave) -> Result<()> {
            self.events.lock().push((user_stream.clone(), leave));
            Ok(())
        }
    }

    fn addr(value: u64) -> Address {
        Address::from_low_u64(value)
    }

    fn space_id() -> StreamId {
        StreamId::space(addr(0x5ace))
    }

    struct Harness {
        scrubber: MembershipScrubber,
        checker: Arc<FakeChecker>,
        views: Arc<FakeViews>,
        appender: Arc<RecordingAppender>,
    }

    fn harness(view: Option<StreamView>, delay: Duration, config: ScrubbingConfig) -> Harness {
        let checker = Arc::new(FakeChecker::default());
        let views = Arc::new(FakeViews {
            view,
            delay,
            loads: AtomicUsize::new(0),
        });
        let appender = Arc::new(RecordingAppender::default());
        let scrubber = MembershipScrubber::new(
            &config,
            checker.clone(),
            views.clone(),
            appender.clone(),
            &Registry::new(),
        )
        .unwrap();
        Harness {
            scrubber,
            checker,
            views,
            appender,
        }
    }

    async fn settle(scrubber: &MembershipScrubber, stream_id: &StreamId) {
        while scrubber.is_pending(stream_id) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn space_view(members: Vec<StreamMember>) -> StreamView {
        StreamView {
            space_id: space_id(),
            channel_id: None,
            members,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_scrubs_are_deduplicated() {
        let h = harness(
            Some(space_view(vec![StreamMember::user(addr(1))])),
            Duration::from_secs(1),
            ScrubbingConfig::default(),
        );

        assert!(!h.scrubber.scrub(&space_id()));
        assert!(h.scrubber.scrub(&space_id()));
        settle(&h.scrubber, &space_id()).await;
        assert_eq!(h.views.loads.load(Ordering::SeqCst), 1);

        assert!(!h.scrubber.scrub(&space_id()));
        settle(&h.scrubber, &space_id()).await;
        assert_eq!(h.views.loads.load(Ordering::SeqCst), 2);
        assert_eq!(h.scrubber.metrics().scrubs("completed"), 2);
    }

    #[tokio::test]
    async fn test_unentitled_members_are_ejected_and_errors_skipped() {
        let h = harness(
            Some(space_view(vec![
                StreamMember::user(addr(1)),
                StreamMember::user(addr(2)),
                StreamMember::user(addr(3)),
                StreamMember::user(addr(4)),
            ])),
            Duration::ZERO,
            ScrubbingConfig::default(),
        );
        h.checker
            .denied
            .lock()
            .insert(addr(2), EntitlementResultReason::MembershipExpired);
        h.checker.failing.lock().push(addr(3));
        h.checker
            .denied
            .lock()
            .insert(addr(4), EntitlementResultReason::SpaceEntitlements);

        h.scrubber.scrub(&space_id());
        settle(&h.scrubber, &space_id()).await;

        let events = h.appender.events.lock().clone();
        assert_eq!(
            events,
            vec![
                (
                    StreamId::user(addr(2)),
                    MembershipLeave {
                        stream_id: space_id(),
                        user: addr(2),
                        reason: LeaveReason::MembershipExpired,
                    }
                ),
                (
                    StreamId::user(addr(4)),
                    MembershipLeave {
                        stream_id: space_id(),
                        user: addr(4),
                        reason: LeaveReason::NotEntitled,
                    }
                ),
            ]
        );
        let metrics = h.scrubber.metrics();
        assert_eq!(metrics.boots(), 2);
        assert_eq!(metrics.entitlement_losses(LeaveReason::MembershipExpired), 1);
        assert_eq!(metrics.entitlement_losses(LeaveReason::NotEntitled), 1);
        assert_eq!(metrics.scrubs("completed"), 1);
    }

    #[tokio::test]
    async fn test_channel_members_are_checked_for_channel_read() {
        let channel_id = StreamId::channel(addr(0x5ace), b"general");
        let h = harness(
            Some(StreamView {
                space_id: space_id(),
                channel_id: Some(channel_id.clone()),
                members: vec![StreamMember::app(addr(0xb07), addr(0xa44))],
            }),
            Duration::ZERO,
            ScrubbingConfig::default(),
        );

        h.scrubber.scrub(&channel_id);
        settle(&h.scrubber, &channel_id).await;

        let queries = h.checker.queries.lock().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].channel_id(), Some(&channel_id));
        assert_eq!(queries[0].permission(), Permission::Read);
        assert_eq!(queries[0].app_address(), Some(addr(0xa44)));
    }

    #[tokio::test]
    async fn test_failed_view_load_clears_pending() {
        let h = harness(None, Duration::ZERO, ScrubbingConfig::default());

        h.scrubber.scrub(&space_id());
        settle(&h.scrubber, &space_id()).await;

        assert_eq!(h.scrubber.metrics().scrubs("failed"), 1);
        assert!(h.appender.events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_maybe_scrub_respects_eligibility_window() {
        let h = harness(
            Some(space_view(Vec::new())),
            Duration::ZERO,
            ScrubbingConfig::default(),
        );

        assert!(h.scrubber.maybe_scrub(&space_id()));
        settle(&h.scrubber, &space_id()).await;
        assert!(!h.scrubber.maybe_scrub(&space_id()));

        tokio::time::advance(Duration::from_secs(4 * 60 * 60 + 1)).await;
        assert!(h.scrubber.maybe_scrub(&space_id()));
    }

    struct PanickingChecker;

    #[async_trait]
    impl EntitlementChecker for PanickingChecker {
        async fn is_entitled(&self, _query: &QueryDescriptor) -> Result<IsEntitledResult> {
            panic!("checker bug");
        }
    }

    #[tokio::test]
    async fn test_panicked_scrub_clears_pending() {
        let views = Arc::new(FakeViews {
            view: Some(space_view(vec![StreamMember::user(addr(1))])),
            delay: Duration::ZERO,
            loads: AtomicUsize::new(0),
        });
        let scrubber = MembershipScrubber::new(
            &ScrubbingConfig::default(),
            Arc::new(PanickingChecker),
            views.clone(),
            Arc::new(RecordingAppender::default()),
            &Registry::new(),
        )
        .unwrap();

        assert!(!scrubber.scrub(&space_id()));
        settle(&scrubber, &space_id()).await;
        assert_eq!(scrubber.metrics().scrubs("aborted"), 1);

        assert!(!scrubber.scrub(&space_id()));
        settle(&scrubber, &space_id()).await;
        assert_eq!(views.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_scrub_timestamps_are_pruned() {
        let h = harness(
            Some(space_view(Vec::new())),
            Duration::ZERO,
            ScrubbingConfig::default(),
        );
        let other = StreamId::space(addr(0xbeef));

        assert!(h.scrubber.maybe_scrub(&space_id()));
        settle(&h.scrubber, &space_id()).await;
        assert_eq!(h.scrubber.inner.last_scrubbed.len(), 1);

        tokio::time::advance(Duration::from_secs(4 * 60 * 60 + 1)).await;
        assert!(h.scrubber.maybe_scrub(&other));
        settle(&h.scrubber, &other).await;

        assert_eq!(h.scrubber.inner.last_scrubbed.len(), 1);
        assert!(h.scrubber.inner.last_scrubbed.contains_key(&other));
        assert!(h.scrubber.maybe_scrub(&space_id()));
    }

    #[tokio::test]
    async fn test_zero_eligibility_disables_maybe_scrub() {
        let h = harness(
            Some(space_view(Vec::new())),
            Duration::ZERO,
            ScrubbingConfig {
                scrub_eligible_secs: 0,
                ..ScrubbingConfig::default()
            },
        );

        assert!(!h.scrubber.maybe_scrub(&space_id()));
        assert!(!h.scrubber.is_pending(&space_id()));
    }
}
