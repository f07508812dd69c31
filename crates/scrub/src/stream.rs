//! What the scrubber needs from the stream layer

use async_trait::async_trait;
use chainauth_core::{Address, Result, StreamId};
use std::fmt::{self, Display};

/// A current member of a space or channel stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMember {
    pub user: Address,
    /// App contract the member acts through, if it is an app client
    pub app_address: Option<Address>,
}

impl StreamMember {
    #[must_use]
    pub fn user(user: Address) -> Self {
        Self {
            user,
            app_address: None,
        }
    }

    #[must_use]
    pub fn app(user: Address, app_address: Address) -> Self {
        Self {
            user,
            app_address: Some(app_address),
        }
    }
}

/// Local view of a stream as far as membership goes
#[derive(Debug, Clone)]
pub struct StreamView {
    pub space_id: StreamId,
    /// Set for channel streams
    pub channel_id: Option<StreamId>,
    pub members: Vec<StreamMember>,
}

/// Why a member was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaveReason {
    MembershipExpired,
    NotEntitled,
}

impl LeaveReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveReason::MembershipExpired => "membership_expired",
            LeaveReason::NotEntitled => "not_entitled",
        }
    }
}

impl Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Leave event appended to the ejected member's user stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipLeave {
    /// Space or channel the member is leaving
    pub stream_id: StreamId,
    pub user: Address,
    pub reason: LeaveReason,
}

#[async_trait]
pub trait StreamViewSource: Send + Sync {
    /// Load the current view of a space or channel stream
    async fn load_view(&self, stream_id: &StreamId) -> Result<StreamView>;
}

#[async_trait]
pub trait EventAppender: Send + Sync {
    /// Append `leave` to `user_stream`
    async fn add_event_payload(&self, user_stream: &StreamId, leave: MembershipLeave) -> Result<()>;
}
