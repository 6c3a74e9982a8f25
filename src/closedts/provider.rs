//! Seams between the follower-read check and the closed timestamp subsystem

use crate::hlc::Timestamp;
use crate::lease::{Epoch, Lai, NodeId, RangeId};

/// Answers "what is closed for this range under this lease incarnation".
pub trait ClosedTimestampProvider: Send + Sync {
    /// Closed timestamp published by `node` for `range` under `epoch`,
    /// valid at lease applied index `lai`. `Timestamp::ZERO` if unknown.
    fn max_closed(&self, node: NodeId, range: RangeId, epoch: Epoch, lai: Lai) -> Timestamp;

    /// Human-readable dump of everything known about `node`. Expensive.
    fn describe_node(&self, _node: NodeId) -> String {
        String::new()
    }
}

/// Asks a node's subscription client for a fresher watermark.
///
/// Fire and forget: never blocks, never fails, only helps future requests.
pub trait ClosedTimestampRequester: Send + Sync {
    fn request(&self, node: NodeId, range: RangeId);
}

/// Requester that drops every hint. For offline evaluation, where there is
/// no subscription to refresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRefresh;

impl ClosedTimestampRequester for NoRefresh {
    fn request(&self, _node: NodeId, _range: RangeId) {}
}
