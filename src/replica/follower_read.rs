//! Follower-read eligibility
//!
//! A replica that is not the lease holder may still serve a batch locally
//! when every read in it is at or below the range's closed timestamp.
//! The decision runs on a single lease state snapshot, never blocks, and
//! leaves the routing error untouched whenever the answer is no.

use serde::{Deserialize, Serialize};

use super::Replica;
use crate::hlc::Timestamp;
use crate::kv::{BatchRequest, KvError, KvResult, NotLeaseHolderError};
use crate::lease::{LeaseError, NodeId, ReplicaType};
use crate::observability::{trace_event, Event, Logger, Severity};

/// Why a batch can or cannot be served as a follower read.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerReadReason {
    /// The prior error is not a not-lease-holder error naming a holder.
    NotLeaseHolderMissing,
    /// Expiration leases carry no epoch to pin a watermark to.
    ExpirationLease,
    Locking,
    NotAllTransactional,
    TxnLocking,
    Disabled,
    /// The local replica type never serves follower reads.
    ReplicaType,
    ClosedTimestampTooLow,
    Eligible,
}

impl FollowerReadReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowerReadReason::NotLeaseHolderMissing => "not_lease_holder_missing",
            FollowerReadReason::ExpirationLease => "expiration_lease",
            FollowerReadReason::Locking => "locking",
            FollowerReadReason::NotAllTransactional => "not_all_transactional",
            FollowerReadReason::TxnLocking => "txn_locking",
            FollowerReadReason::Disabled => "disabled",
            FollowerReadReason::ReplicaType => "replica_type",
            FollowerReadReason::ClosedTimestampTooLow => "closed_timestamp_too_low",
            FollowerReadReason::Eligible => "eligible",
        }
    }
}

/// Outcome of evaluating one batch, with the inputs that decided it.
///
/// Fields past `reason` are only filled in once evaluation got that far.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerReadDecision {
    pub eligible: bool,
    pub reason: FollowerReadReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_type: Option<ReplicaType>,
    /// Batch timestamp forwarded to the top of the uncertainty interval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_timestamp: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_closed: Option<Timestamp>,
    /// Lease holder to ask for a fresher watermark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_from: Option<NodeId>,
}

impl FollowerReadDecision {
    fn rejected(reason: FollowerReadReason) -> Self {
        Self {
            eligible: false,
            reason,
            replica_type: None,
            effective_timestamp: None,
            max_closed: None,
            refresh_from: None,
        }
    }
}

impl Replica {
    /// Checks whether `ba`, which failed with `prior`, can be served here
    /// as a follower read.
    ///
    /// `Ok(())` means serve locally. Otherwise `prior` comes back unchanged,
    /// except when the local replica descriptor cannot be resolved. Only a
    /// closed timestamp that is too low is counted as rejected and triggers
    /// a refresh.
    pub fn can_serve_follower_read(&self, ba: &BatchRequest, prior: KvError) -> KvResult<()> {
        let decision = self.explain_follower_read(ba, &prior)?;

        if decision.eligible {
            self.metrics.increment_follower_reads_served();
            if Logger::enabled(Severity::Trace) {
                self.trace_decision(Event::FollowerReadServed, ba, &decision);
            }
            return Ok(());
        }

        // Batches refused before the closed timestamp comparison leave no
        // trace at all.
        if let Some(node) = decision.refresh_from {
            self.metrics.increment_follower_reads_rejected();
            if Logger::enabled(Severity::Trace) {
                self.trace_decision(Event::FollowerReadRejected, ba, &decision);
            }

            // The current request is not retried; only later ones benefit.
            self.requester.request(node, self.range_id);
            self.metrics.increment_closed_ts_refresh_requests();

            if self.settings.verbose_follower_read_diagnostics() {
                if let Some(detail) = prior.not_lease_holder_detail() {
                    self.dump_closed_timestamps(ba, detail, node);
                }
            }
        }

        Err(prior)
    }

    /// Evaluates follower-read eligibility without side effects.
    ///
    /// Fails only when the local replica descriptor cannot be resolved.
    pub fn explain_follower_read(
        &self,
        ba: &BatchRequest,
        prior: &KvError,
    ) -> KvResult<FollowerReadDecision> {
        use FollowerReadReason as Reason;

        let Some((nlhe, holder)) = prior
            .not_lease_holder_detail()
            .and_then(|e| e.lease_holder.map(|h| (e, h)))
        else {
            return Ok(FollowerReadDecision::rejected(Reason::NotLeaseHolderMissing));
        };
        if !nlhe.lease.is_epoch_based() {
            return Ok(FollowerReadDecision::rejected(Reason::ExpirationLease));
        }
        if ba.is_locking() {
            return Ok(FollowerReadDecision::rejected(Reason::Locking));
        }
        if !ba.is_all_transactional() {
            return Ok(FollowerReadDecision::rejected(Reason::NotAllTransactional));
        }
        if ba.txn.as_ref().is_some_and(|txn| txn.is_locking()) {
            return Ok(FollowerReadDecision::rejected(Reason::TxnLocking));
        }
        if !self.settings.follower_reads_enabled() {
            return Ok(FollowerReadDecision::rejected(Reason::Disabled));
        }

        let snapshot = self.state.snapshot();
        let descriptor = snapshot.descriptor.ok_or(KvError::ReplicaDescriptor(
            LeaseError::ReplicaRemoved {
                range_id: self.range_id,
            },
        ))?;
        let replica_type = descriptor.replica_type;
        if !replica_type.can_serve_follower_reads() {
            return Ok(FollowerReadDecision {
                replica_type: Some(replica_type),
                ..FollowerReadDecision::rejected(Reason::ReplicaType)
            });
        }

        let mut ts = ba.timestamp;
        if let Some(txn) = &ba.txn {
            ts.forward(txn.max_timestamp);
        }

        // An expiration lease held locally contributes nothing.
        let max_closed = self.max_closed_at(&snapshot).unwrap_or(Timestamp::ZERO);
        let eligible = ts.less_eq(max_closed);

        Ok(FollowerReadDecision {
            eligible,
            reason: if eligible {
                Reason::Eligible
            } else {
                Reason::ClosedTimestampTooLow
            },
            replica_type: Some(replica_type),
            effective_timestamp: Some(ts),
            max_closed: Some(max_closed),
            refresh_from: (!eligible).then_some(holder.node_id),
        })
    }

    fn trace_decision(&self, event: Event, ba: &BatchRequest, decision: &FollowerReadDecision) {
        let range_id = self.range_id.to_string();
        let ts = ba.timestamp.to_string();
        let max_ts = ba
            .txn
            .as_ref()
            .map_or_else(|| "n/a".to_string(), |txn| txn.max_timestamp.to_string());
        let max_closed = decision
            .max_closed
            .map_or_else(|| "n/a".to_string(), |mc| mc.to_string());
        let diff_nanos = match (decision.effective_timestamp, decision.max_closed) {
            (Some(ts), Some(mc)) => ts.duration_since(mc).to_string(),
            _ => "n/a".to_string(),
        };
        trace_event(
            event,
            &[
                ("range_id", range_id.as_str()),
                ("reason", decision.reason.as_str()),
                ("ts", ts.as_str()),
                ("max_ts", max_ts.as_str()),
                ("max_closed", max_closed.as_str()),
                ("closed_ts_lag_nanos", diff_nanos.as_str()),
            ],
        );
    }

    /// Dumps everything known about the lease holder's watermarks. The dump
    /// can be huge, so it only happens with verbose diagnostics on.
    fn dump_closed_timestamps(&self, ba: &BatchRequest, nlhe: &NotLeaseHolderError, node: NodeId) {
        let range_id = self.range_id.to_string();
        let ts = ba.timestamp.to_string();
        let epoch = nlhe
            .lease
            .epoch()
            .map_or_else(|| "n/a".to_string(), |e| e.to_string());
        let storage = self.provider.describe_node(node);
        Logger::warn(
            Event::ClosedTsStorageDump.as_str(),
            &[
                ("range_id", range_id.as_str()),
                ("ts", ts.as_str()),
                ("epoch", epoch.as_str()),
                ("storage", storage.as_str()),
            ],
        );
    }
}
