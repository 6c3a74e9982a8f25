//! Lease state errors

use thiserror::Error;

use super::descriptor::RangeId;
use super::state::Lai;
use super::Lease;

/// Result type for lease state operations
pub type LeaseResult<T> = Result<T, LeaseError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    /// The local replica is no longer a member of the range.
    #[error("replica of {range_id} has been removed from the range")]
    ReplicaRemoved { range_id: RangeId },

    /// A replacement lease must strictly supersede the current one.
    #[error("lease [{proposed}] does not supersede current lease [{current}]")]
    NotSuperseding { current: Lease, proposed: Lease },

    /// The lease applied index only moves forward.
    #[error("lease applied index regression: {proposed} < {current}")]
    LaiRegression { current: Lai, proposed: Lai },
}
