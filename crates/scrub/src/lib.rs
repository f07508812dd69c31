//! Membership scrubbing for space and channel streams
//!
//! Members keep their place in a stream after their on-chain membership
//! lapses or a rule stops admitting them. [`MembershipScrubber`] finds those
//! members and ejects them by appending a leave event to each one's user
//! stream.

pub mod metrics;
pub mod scrubber;
pub mod stream;

pub use metrics::ScrubMetrics;
pub use scrubber::MembershipScrubber;
pub use stream::{
    EventAppender, LeaveReason, MembershipLeave, StreamMember, StreamView, StreamViewSource,
};
