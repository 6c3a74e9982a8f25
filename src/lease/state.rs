//! Replica lease state
//!
//! The lease, lease applied index, local descriptor and the closed timestamp
//! floor the range was created with all live behind one lock. Readers take a
//! `LeaseSnapshot` in a single short read and work on that copy; nothing
//! downstream re-enters the lock.
//!
//! Writers are the lease acquisition/transfer protocol and the log
//! application pipeline. The follower-read path only reads.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::descriptor::{RangeId, ReplicaDescriptor, ReplicaType};
use super::errors::{LeaseError, LeaseResult};
use super::range_lease::Lease;
use crate::hlc::Timestamp;
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Lease applied index: position in the range's command history.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lai(pub u64);

impl fmt::Display for Lai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable copy of a replica's lease state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LeaseSnapshot {
    pub lease: Lease,
    pub lease_applied_index: Lai,
    /// `None` once the replica has been removed from the range.
    pub descriptor: Option<ReplicaDescriptor>,
    /// Closed timestamp inherited when the range was created (e.g. by a
    /// split); reads at or below it are safe from the start.
    pub initial_max_closed: Timestamp,
}

#[derive(Debug)]
struct Inner {
    lease: Lease,
    lease_applied_index: Lai,
    descriptor: Option<ReplicaDescriptor>,
    initial_max_closed: Timestamp,
}

/// Lease state of one replica.
#[derive(Debug)]
pub struct ReplicaState {
    range_id: RangeId,
    inner: RwLock<Inner>,
}

impl ReplicaState {
    pub fn new(range_id: RangeId, lease: Lease, descriptor: ReplicaDescriptor) -> Self {
        Self {
            range_id,
            inner: RwLock::new(Inner {
                lease,
                lease_applied_index: Lai::default(),
                descriptor: Some(descriptor),
                initial_max_closed: Timestamp::ZERO,
            }),
        }
    }

    /// Sets the closed timestamp floor inherited at range creation.
    pub fn with_initial_max_closed(self, ts: Timestamp) -> Self {
        self.write().initial_max_closed = ts;
        self
    }

    pub fn range_id(&self) -> RangeId {
        self.range_id
    }

    /// Copies the whole state under one read lock.
    pub fn snapshot(&self) -> LeaseSnapshot {
        let inner = self.read();
        LeaseSnapshot {
            lease: inner.lease,
            lease_applied_index: inner.lease_applied_index,
            descriptor: inner.descriptor,
            initial_max_closed: inner.initial_max_closed,
        }
    }

    pub fn current_lease(&self) -> Lease {
        self.read().lease
    }

    /// The local replica's descriptor.
    pub fn replica_descriptor(&self) -> LeaseResult<ReplicaDescriptor> {
        self.read().descriptor.ok_or(LeaseError::ReplicaRemoved {
            range_id: self.range_id,
        })
    }

    pub fn descriptor_type(&self) -> LeaseResult<ReplicaType> {
        self.replica_descriptor().map(|d| d.replica_type)
    }

    /// Replaces the lease wholesale.
    pub fn install_lease(&self, lease: Lease) -> LeaseResult<()> {
        let mut inner = self.write();
        if !lease.supersedes(&inner.lease) {
            let err = LeaseError::NotSuperseding {
                current: inner.lease,
                proposed: lease,
            };
            drop(inner);
            if Logger::enabled(Severity::Warn) {
                let range_id = self.range_id.to_string();
                let error = err.to_string();
                Logger::warn(
                    Event::LeaseRejected.as_str(),
                    &[("range_id", range_id.as_str()), ("error", error.as_str())],
                );
            }
            return Err(err);
        }
        inner.lease = lease;
        drop(inner);

        let range_id = self.range_id.to_string();
        let lease = lease.to_string();
        log_event_with_fields(
            Event::LeaseInstalled,
            &[("range_id", range_id.as_str()), ("lease", lease.as_str())],
        );
        Ok(())
    }

    /// Moves the lease applied index forward as commands apply.
    pub fn advance_lease_applied_index(&self, lai: Lai) -> LeaseResult<()> {
        let mut inner = self.write();
        if lai < inner.lease_applied_index {
            return Err(LeaseError::LaiRegression {
                current: inner.lease_applied_index,
                proposed: lai,
            });
        }
        inner.lease_applied_index = lai;
        Ok(())
    }

    /// Records a configuration change affecting the local replica.
    pub fn set_descriptor(&self, descriptor: ReplicaDescriptor) {
        self.write().descriptor = Some(descriptor);
    }

    /// The local replica has been removed from the range.
    pub fn mark_removed(&self) {
        self.write().descriptor = None;
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::Epoch;

    fn state() -> ReplicaState {
        ReplicaState::new(
            RangeId(1),
            Lease::epoch_based(ReplicaDescriptor::voter(1, 1), Timestamp::from_wall(10), 5),
            ReplicaDescriptor::voter(2, 2),
        )
    }

    #[test]
    fn test_snapshot_copies_everything() {
        let state = state().with_initial_max_closed(Timestamp::from_wall(3));
        state.advance_lease_applied_index(Lai(7)).unwrap();

        let snap = state.snapshot();
        assert_eq!(snap.lease.epoch(), Some(Epoch(5)));
        assert_eq!(snap.lease_applied_index, Lai(7));
        assert_eq!(snap.descriptor, Some(ReplicaDescriptor::voter(2, 2)));
        assert_eq!(snap.initial_max_closed, Timestamp::from_wall(3));
    }

    #[test]
    fn test_install_lease_requires_supersession() {
        let state = state();
        let stale = Lease::epoch_based(ReplicaDescriptor::voter(3, 3), Timestamp::from_wall(50), 5);
        assert!(matches!(
            state.install_lease(stale),
            Err(LeaseError::NotSuperseding { .. })
        ));

        let next = Lease::epoch_based(ReplicaDescriptor::voter(3, 3), Timestamp::from_wall(50), 6);
        state.install_lease(next).unwrap();
        assert_eq!(state.current_lease(), next);
    }

    #[test]
    fn test_lai_is_monotonic() {
        let state = state();
        state.advance_lease_applied_index(Lai(10)).unwrap();
        state.advance_lease_applied_index(Lai(10)).unwrap();
        assert_eq!(
            state.advance_lease_applied_index(Lai(9)),
            Err(LeaseError::LaiRegression {
                current: Lai(10),
                proposed: Lai(9)
            })
        );
    }

    #[test]
    fn test_removed_replica_has_no_descriptor() {
        let state = state();
        assert_eq!(state.descriptor_type(), Ok(ReplicaType::VoterFull));

        state.mark_removed();
        assert_eq!(
            state.replica_descriptor(),
            Err(LeaseError::ReplicaRemoved { range_id: RangeId(1) })
        );

        state.set_descriptor(ReplicaDescriptor::new(
            crate::lease::NodeId(2),
            crate::lease::StoreId(2),
            ReplicaType::Learner,
        ));
        assert_eq!(state.descriptor_type(), Ok(ReplicaType::Learner));
    }
}
