//! Hybrid logical clock types
//!
//! Only the timestamp is modelled here; clock sources belong to the node
//! runtime and are not needed to decide read safety.

mod timestamp;

pub use timestamp::{ParseTimestampError, Timestamp};
