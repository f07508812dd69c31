//! Scrubbing a space through the real engine and an in-memory chain

use async_trait::async_trait;
use chainauth_config::{ChainAuthConfig, ScrubbingConfig};
use chainauth_contracts::test_utils::FakeChain;
use chainauth_core::{Address, Permission, Result, RuleDataV1, RuleDataV2, StreamId, TokenId};
use chainauth_engine::{ChainAuth, RuleEvaluator};
use chainauth_scrub::{
    EventAppender, LeaveReason, MembershipLeave, MembershipScrubber, StreamMember, StreamView,
    StreamViewSource,
};
use parking_lot::Mutex;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;

struct NoRules;

#[async_trait]
impl RuleEvaluator for NoRules {
    async fn evaluate_rule_data(&self, _wallets: &[Address], _rule: &RuleDataV2) -> Result<bool> {
        Ok(false)
    }

    fn convert_v1(&self, rule: &RuleDataV1) -> Result<RuleDataV2> {
        Ok(RuleDataV2(rule.0.clone()))
    }
}

struct StaticView(StreamView);

#[async_trait]
impl StreamViewSource for StaticView {
    async fn load_view(&self, _stream_id: &StreamId) -> Result<StreamView> {
        Ok(self.0.clone())
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

#[tokio::test]
async fn test_scrub_ejects_lapsed_and_unentitled_members() {
    let space = Address::from_low_u64(0x5ace);
    let space_id = StreamId::space(space);
    let active = Address::from_low_u64(1);
    let lapsed = Address::from_low_u64(2);
    let unlisted = Address::from_low_u64(3);

    let chain = Arc::new(FakeChain::new());
    chain.set_tokens(space, active, vec![(TokenId::from(1), 0)]);
    chain.set_tokens(space, lapsed, vec![(TokenId::from(2), 1)]);
    chain.set_tokens(space, unlisted, vec![(TokenId::from(3), 0)]);
    chain.set_user_entitlement(space, Permission::Read, vec![active, lapsed]);

    let registry = Registry::new();
    let config = ChainAuthConfig {
        architect_contract: Address::from_low_u64(0xa7c).to_string(),
        ..ChainAuthConfig::default()
    };
    let auth = ChainAuth::from_chain(config, chain, Arc::new(NoRules), &registry).unwrap();

    let appender = Arc::new(RecordingAppender::default());
    let scrubber = MembershipScrubber::new(
        &ScrubbingConfig::default(),
        Arc::new(auth),
        Arc::new(StaticView(StreamView {
            space_id: space_id.clone(),
            channel_id: None,
            members: vec![
                StreamMember::user(active),
                StreamMember::user(lapsed),
                StreamMember::user(unlisted),
            ],
        })),
        appender.clone(),
        &registry,
    )
    .unwrap();

    assert!(!scrubber.scrub(&space_id));
    while scrubber.is_pending(&space_id) {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut events = appender.events.lock().clone();
    events.sort_by_key(|(stream, _)| stream.clone());
    assert_eq!(
        events,
        vec![
            (
                StreamId::user(lapsed),
                MembershipLeave {
                    stream_id: space_id.clone(),
                    user: lapsed,
                    reason: LeaveReason::MembershipExpired,
                }
            ),
            (
                StreamId::user(unlisted),
                MembershipLeave {
                    stream_id: space_id.clone(),
                    user: unlisted,
                    reason: LeaveReason::NotEntitled,
                }
            ),
        ]
    );
    assert_eq!(scrubber.metrics().boots(), 2);
}
