//! Hybrid logical clock timestamp
//!
//! A timestamp is a (wall_time, logical) pair. Ordering is lexicographic:
//! wall time first, logical component as the tie breaker. The zero value
//! means "unknown" wherever a watermark is expected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A totally ordered hybrid logical clock timestamp.
///
/// Field order matters: the derived `Ord` compares `wall_time` before
/// `logical`.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp {
    /// Nanoseconds since the Unix epoch.
    pub wall_time: i64,
    /// Logical counter distinguishing events at the same wall time.
    #[serde(default)]
    pub logical: i32,
}

impl Timestamp {
    /// The zero timestamp.
    pub const ZERO: Timestamp = Timestamp {
        wall_time: 0,
        logical: 0,
    };

    /// The largest representable timestamp.
    pub const MAX: Timestamp = Timestamp {
        wall_time: i64::MAX,
        logical: i32::MAX,
    };

    #[inline]
    pub const fn new(wall_time: i64, logical: i32) -> Self {
        Self { wall_time, logical }
    }

    /// Timestamp with the given wall time and a zero logical component.
    #[inline]
    pub const fn from_wall(wall_time: i64) -> Self {
        Self::new(wall_time, 0)
    }

    /// Returns true for the zero timestamp.
    #[inline]
    pub fn is_empty(&self) -> bool {
        *self == Self::ZERO
    }

    #[inline]
    pub fn less_eq(&self, other: Timestamp) -> bool {
        *self <= other
    }

    /// Ratchets `self` up to `other`. Returns true if `self` moved.
    pub fn forward(&mut self, other: Timestamp) -> bool {
        if *self < other {
            *self = other;
            true
        } else {
            false
        }
    }

    /// Ratchets `self` down to `other`.
    pub fn backward(&mut self, other: Timestamp) {
        if other < *self {
            *self = other;
        }
    }

    /// The smallest timestamp strictly greater than `self`.
    ///
    /// Bumps the logical component; a saturated logical counter carries into
    /// the wall time. `None` for `Timestamp::MAX`.
    pub fn next(&self) -> Option<Timestamp> {
        if self.logical < i32::MAX {
            Some(Timestamp::new(self.wall_time, self.logical + 1))
        } else {
            self.wall_time
                .checked_add(1)
                .map(|wall_time| Timestamp::new(wall_time, 0))
        }
    }

    /// The largest timestamp strictly smaller than `self`.
    pub fn prev(&self) -> Timestamp {
        if self.logical > 0 {
            Timestamp::new(self.wall_time, self.logical - 1)
        } else if self.wall_time > 0 {
            Timestamp::new(self.wall_time - 1, i32::MAX)
        } else {
            Timestamp::ZERO
        }
    }

    /// Adds to both components, saturating.
    pub fn add(&self, wall_time: i64, logical: i32) -> Timestamp {
        Timestamp::new(
            self.wall_time.saturating_add(wall_time),
            self.logical.saturating_add(logical),
        )
    }

    /// Signed wall-time distance from `other` to `self`, in nanoseconds.
    pub fn duration_since(&self, other: Timestamp) -> i64 {
        self.wall_time.saturating_sub(other.wall_time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.wall_time, self.logical)
    }
}

/// Error parsing a timestamp from `"<wall>.<logical>"` or `"<wall>"`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp '{0}': expected <wall_time>[.<logical>]")]
pub struct ParseTimestampError(String);

impl FromStr for Timestamp {
    type Err = ParseTimestampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTimestampError(s.to_string());
        let (wall, logical) = match s.split_once('.') {
            Some((wall, logical)) => (wall, logical),
            None => (s, "0"),
        };
        let wall_time = wall.trim().parse::<i64>().map_err(|_| err())?;
        let logical = logical.trim().parse::<i32>().map_err(|_| err())?;
        if wall_time < 0 || logical < 0 {
            return Err(err());
        }
        Ok(Timestamp::new(wall_time, logical))
    }
}
