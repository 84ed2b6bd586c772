//! Identifiers for nodes inside a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! Every source, transform and cached collection gets a sequential `NodeId`.
//! Only the runner walks them; callers mostly use them to check whether a
//! cached collection is still resident.

/// Unique numeric identifier for a node in a pipeline graph.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn new(v: u64) -> Self {
        Self(v)
    }

    /// The underlying sequence number.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
