//! Leases and replica lease state
//!
//! Exactly one lease is active per range. Replacing it strictly raises the
//! epoch (epoch-based leases) or the start timestamp (expiration-based).
//! Lease acquisition and transfer happen elsewhere; this module holds the
//! result and hands out consistent snapshots of it.

mod descriptor;
mod errors;
mod range_lease;
mod state;

pub use descriptor::{NodeId, RangeId, ReplicaDescriptor, ReplicaType, StoreId};
pub use errors::{LeaseError, LeaseResult};
pub use range_lease::{Epoch, Lease, LeaseKind, LeaseType};
pub use state::{Lai, LeaseSnapshot, ReplicaState};
