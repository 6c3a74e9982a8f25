//! Replica
//!
//! The part of a range replica that decides whether reads can be served
//! without the lease. Lease state belongs to the replica; closed timestamps,
//! refresh hints, settings and metrics are shared store-wide collaborators.

mod follower_read;

use std::fmt;
use std::sync::Arc;

pub use follower_read::{FollowerReadDecision, FollowerReadReason};

use crate::closedts::{ClosedTimestampProvider, ClosedTimestampRequester};
use crate::config::ClusterSettings;
use crate::hlc::Timestamp;
use crate::lease::{LeaseSnapshot, RangeId, ReplicaState};
use crate::observability::MetricsRegistry;

pub struct Replica {
    range_id: RangeId,
    state: ReplicaState,
    provider: Arc<dyn ClosedTimestampProvider>,
    requester: Arc<dyn ClosedTimestampRequester>,
    settings: Arc<ClusterSettings>,
    metrics: Arc<MetricsRegistry>,
}

impl Replica {
    pub fn new(
        state: ReplicaState,
        provider: Arc<dyn ClosedTimestampProvider>,
        requester: Arc<dyn ClosedTimestampRequester>,
        settings: Arc<ClusterSettings>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            range_id: state.range_id(),
            state,
            provider,
            requester,
            settings,
            metrics,
        }
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }

    pub fn state(&self) -> &ReplicaState {
        &self.state
    }

    /// Highest timestamp at or below which reads are safe on this replica.
    ///
    /// The lease holder's published watermark for the current lease epoch,
    /// forwarded to the lease start and to the floor the range was created
    /// with. A new lease holder never serves writes below its lease start,
    /// which keeps the bound valid across lease transfers.
    ///
    /// `None` when the range runs on an expiration lease, which closed
    /// timestamps do not support.
    pub fn max_closed(&self) -> Option<Timestamp> {
        self.max_closed_at(&self.state.snapshot())
    }

    fn max_closed_at(&self, snapshot: &LeaseSnapshot) -> Option<Timestamp> {
        let lease = snapshot.lease;
        let epoch = lease.epoch()?;
        let mut max_closed = self.provider.max_closed(
            lease.holder.node_id,
            self.range_id,
            epoch,
            snapshot.lease_applied_index,
        );
        max_closed.forward(lease.start);
        max_closed.forward(snapshot.initial_max_closed);
        Some(max_closed)
    }
}

impl fmt::Debug for Replica {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replica")
            .field("range_id", &self.range_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
