//! Replica identity and placement

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RangeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl fmt::Display for RangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Role of a replica within its range's replication group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicaType {
    /// Voting member
    VoterFull,
    /// Becoming a voter during a joint configuration
    VoterIncoming,
    /// Leaving the voter set during a joint configuration
    VoterOutgoing,
    /// Receives the log but never votes
    NonVoter,
    /// Catching up before promotion; state may be incomplete
    Learner,
}

impl ReplicaType {
    /// Only these replica types hold a complete, current copy of the range.
    pub fn can_serve_follower_reads(&self) -> bool {
        matches!(
            self,
            ReplicaType::VoterFull | ReplicaType::VoterIncoming | ReplicaType::NonVoter
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaType::VoterFull => "VOTER_FULL",
            ReplicaType::VoterIncoming => "VOTER_INCOMING",
            ReplicaType::VoterOutgoing => "VOTER_OUTGOING",
            ReplicaType::NonVoter => "NON_VOTER",
            ReplicaType::Learner => "LEARNER",
        }
    }
}

impl fmt::Display for ReplicaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a replica lives and what role it plays.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaDescriptor {
    pub node_id: NodeId,
    pub store_id: StoreId,
    pub replica_type: ReplicaType,
}

impl ReplicaDescriptor {
    pub fn new(node_id: NodeId, store_id: StoreId, replica_type: ReplicaType) -> Self {
        Self {
            node_id,
            store_id,
            replica_type,
        }
    }

    /// A full voter; the common case in tests.
    pub fn voter(node_id: u32, store_id: u32) -> Self {
        Self::new(NodeId(node_id), StoreId(store_id), ReplicaType::VoterFull)
    }
}

impl fmt::Display for ReplicaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.node_id, self.store_id, self.replica_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follower_read_capable_types() {
        assert!(ReplicaType::VoterFull.can_serve_follower_reads());
        assert!(ReplicaType::VoterIncoming.can_serve_follower_reads());
        assert!(ReplicaType::NonVoter.can_serve_follower_reads());
        assert!(!ReplicaType::VoterOutgoing.can_serve_follower_reads());
        assert!(!ReplicaType::Learner.can_serve_follower_reads());
    }

    #[test]
    fn test_replica_type_serde_names() {
        let json = serde_json::to_string(&ReplicaType::NonVoter).unwrap();
        assert_eq!(json, "\"NON_VOTER\"");
        let parsed: ReplicaType = serde_json::from_str("\"VOTER_INCOMING\"").unwrap();
        assert_eq!(parsed, ReplicaType::VoterIncoming);
    }

    #[test]
    fn test_descriptor_display() {
        let desc = ReplicaDescriptor::voter(1, 2);
        assert_eq!(desc.to_string(), "(n1,s2,VOTER_FULL)");
    }
}
