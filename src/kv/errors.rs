//! Errors returned to KV clients

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lease::{Lease, LeaseError, RangeId, ReplicaDescriptor};
use crate::mvcc::{MvccError, WriteTooOldError};

/// Result type for replica request handling
pub type KvResult<T> = Result<T, KvError>;

/// The request reached a replica that does not hold the lease.
///
/// Routing retries against `lease_holder` when one is known.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Error)]
pub struct NotLeaseHolderError {
    pub range_id: RangeId,
    /// Replica believed to hold the lease, if any.
    #[serde(default)]
    pub lease_holder: Option<ReplicaDescriptor>,
    /// The lease as seen by the replica that rejected the request.
    pub lease: Lease,
}

impl NotLeaseHolderError {
    pub fn new(range_id: RangeId, lease: Lease) -> Self {
        Self {
            range_id,
            lease_holder: Some(lease.holder),
            lease,
        }
    }

    /// No lease holder recorded.
    pub fn without_holder(range_id: RangeId, lease: Lease) -> Self {
        Self {
            range_id,
            lease_holder: None,
            lease,
        }
    }
}

impl fmt::Display for NotLeaseHolderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] replica not lease holder; ", self.range_id)?;
        match &self.lease_holder {
            Some(holder) => write!(f, "lease holder {}, lease {}", holder, self.lease),
            None => write!(f, "lease holder unknown, lease {}", self.lease),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum KvError {
    #[error(transparent)]
    NotLeaseHolder(#[from] NotLeaseHolderError),

    #[error(transparent)]
    WriteTooOld(#[from] WriteTooOldError),

    /// Any other MVCC failure.
    #[error(transparent)]
    Mvcc(MvccError),

    /// The local replica descriptor could not be resolved.
    #[error("unable to resolve local replica descriptor: {0}")]
    ReplicaDescriptor(#[source] LeaseError),

    #[error("range {0} not found")]
    RangeNotFound(RangeId),
}

impl KvError {
    /// The not-lease-holder detail, if this is one.
    pub fn not_lease_holder_detail(&self) -> Option<&NotLeaseHolderError> {
        match self {
            KvError::NotLeaseHolder(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MvccError> for KvError {
    fn from(err: MvccError) -> Self {
        match err {
            MvccError::WriteTooOld(e) => KvError::WriteTooOld(e),
            other => KvError::Mvcc(other),
        }
    }
}
