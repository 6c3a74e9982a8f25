//! Range lease
//!
//! Epoch-based leases stay valid for as long as the holder's liveness epoch
//! does, so the epoch identifies one lease incarnation. Expiration-based
//! leases are extended by heartbeats and carry no such identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::descriptor::ReplicaDescriptor;
use crate::hlc::Timestamp;

/// Liveness epoch of a lease holder.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epoch(pub i64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseType {
    Epoch,
    Expiration,
}

/// What keeps a lease alive.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LeaseKind {
    Epoch { epoch: Epoch },
    Expiration { expiration: Timestamp },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// First timestamp covered by the lease.
    pub start: Timestamp,
    /// Replica holding the lease.
    pub holder: ReplicaDescriptor,
    #[serde(flatten)]
    pub kind: LeaseKind,
}

impl Lease {
    pub fn epoch_based(holder: ReplicaDescriptor, start: Timestamp, epoch: i64) -> Self {
        Self {
            start,
            holder,
            kind: LeaseKind::Epoch {
                epoch: Epoch(epoch),
            },
        }
    }

    pub fn expiration_based(
        holder: ReplicaDescriptor,
        start: Timestamp,
        expiration: Timestamp,
    ) -> Self {
        Self {
            start,
            holder,
            kind: LeaseKind::Expiration { expiration },
        }
    }

    pub fn lease_type(&self) -> LeaseType {
        match self.kind {
            LeaseKind::Epoch { .. } => LeaseType::Epoch,
            LeaseKind::Expiration { .. } => LeaseType::Expiration,
        }
    }

    /// The liveness epoch, for epoch-based leases only.
    pub fn epoch(&self) -> Option<Epoch> {
        match self.kind {
            LeaseKind::Epoch { epoch } => Some(epoch),
            LeaseKind::Expiration { .. } => None,
        }
    }

    /// The expiration, for expiration-based leases only.
    pub fn expiration(&self) -> Option<Timestamp> {
        match self.kind {
            LeaseKind::Epoch { .. } => None,
            LeaseKind::Expiration { expiration } => Some(expiration),
        }
    }

    #[inline]
    pub fn is_epoch_based(&self) -> bool {
        self.epoch().is_some()
    }

    /// Whether `self` may replace `prev`.
    ///
    /// Epoch leases must raise the epoch; every other replacement must
    /// raise the start timestamp.
    pub fn supersedes(&self, prev: &Lease) -> bool {
        match (self.epoch(), prev.epoch()) {
            (Some(new), Some(old)) => new > old,
            _ => self.start > prev.start,
        }
    }
}

impl fmt::Display for Lease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            LeaseKind::Epoch { epoch } => write!(
                f,
                "repl={} start={} epo={}",
                self.holder, self.start, epoch
            ),
            LeaseKind::Expiration { expiration } => write!(
                f,
                "repl={} start={} exp={}",
                self.holder, self.start, expiration
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> ReplicaDescriptor {
        ReplicaDescriptor::voter(1, 1)
    }

    #[test]
    fn test_epoch_accessors() {
        let lease = Lease::epoch_based(holder(), Timestamp::from_wall(10), 5);
        assert_eq!(lease.lease_type(), LeaseType::Epoch);
        assert_eq!(lease.epoch(), Some(Epoch(5)));
        assert_eq!(lease.expiration(), None);
        assert!(lease.is_epoch_based());
    }

    #[test]
    fn test_expiration_accessors() {
        let lease = Lease::expiration_based(
            holder(),
            Timestamp::from_wall(10),
            Timestamp::from_wall(20),
        );
        assert_eq!(lease.lease_type(), LeaseType::Expiration);
        assert_eq!(lease.epoch(), None);
        assert_eq!(lease.expiration(), Some(Timestamp::from_wall(20)));
        assert!(!lease.is_epoch_based());
    }

    #[test]
    fn test_epoch_lease_must_raise_epoch() {
        let old = Lease::epoch_based(holder(), Timestamp::from_wall(10), 5);
        let same = Lease::epoch_based(holder(), Timestamp::from_wall(20), 5);
        let newer = Lease::epoch_based(holder(), Timestamp::from_wall(20), 6);
        assert!(!same.supersedes(&old));
        assert!(newer.supersedes(&old));
    }

    #[test]
    fn test_expiration_lease_must_raise_start() {
        let old = Lease::expiration_based(holder(), Timestamp::from_wall(10), Timestamp::from_wall(30));
        let same_start = Lease::expiration_based(holder(), Timestamp::from_wall(10), Timestamp::from_wall(40));
        let later = Lease::expiration_based(holder(), Timestamp::from_wall(11), Timestamp::from_wall(40));
        assert!(!same_start.supersedes(&old));
        assert!(later.supersedes(&old));
    }

    #[test]
    fn test_kind_change_must_raise_start() {
        let exp = Lease::expiration_based(holder(), Timestamp::from_wall(10), Timestamp::from_wall(30));
        let epo = Lease::epoch_based(holder(), Timestamp::from_wall(30), 1);
        assert!(epo.supersedes(&exp));
        assert!(!exp.supersedes(&epo));
    }

    #[test]
    fn test_lease_json_shape() {
        let lease = Lease::epoch_based(holder(), Timestamp::new(100, 0), 5);
        let value = serde_json::to_value(lease).unwrap();
        assert_eq!(value["type"], "epoch");
        assert_eq!(value["epoch"], 5);
        let back: Lease = serde_json::from_value(value).unwrap();
        assert_eq!(back, lease);
    }
}
