//! Closed timestamp watermarks as they travel between nodes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hlc::Timestamp;
use crate::lease::{Epoch, Lai, NodeId, RangeId};

/// A closed timestamp published by `node_id` for one range under one lease
/// epoch.
///
/// Within one (node, range, epoch), `closed` never decreases as `lai`
/// increases.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub node_id: NodeId,
    pub range_id: RangeId,
    pub epoch: Epoch,
    pub lai: Lai,
    pub closed: Timestamp,
}

impl Entry {
    pub fn new(node_id: NodeId, range_id: RangeId, epoch: Epoch, lai: Lai, closed: Timestamp) -> Self {
        Self {
            node_id,
            range_id,
            epoch,
            lai,
            closed,
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} epo={} lai={} closed={}",
            self.node_id, self.range_id, self.epoch, self.lai, self.closed
        )
    }
}

/// One message on a node's closed timestamp stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    /// Publishing node; every entry must name the same node.
    pub node_id: NodeId,
    pub entries: Vec<Entry>,
}

impl Update {
    pub fn new(node_id: NodeId, entries: Vec<Entry>) -> Self {
        Self { node_id, entries }
    }
}
