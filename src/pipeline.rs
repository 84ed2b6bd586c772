use crate::node::Node;
use crate::node_id::NodeId;
use crate::type_token::vec_ops_for;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Container for a computation graph.
///
/// A `Pipeline` is a cheap, clonable handle; every [`PCollection`](crate::PCollection)
/// built from it shares the same graph. Nothing runs until a collection is
/// collected or cached.
#[derive(Clone, Default)]
pub struct Pipeline {
    inner: Arc<Mutex<PipelineInner>>,
}

#[derive(Default)]
struct PipelineInner {
    next_id: u64,
    nodes: HashMap<NodeId, Node>,
    edges: Vec<(NodeId, NodeId)>,
}

impl Pipeline {
    fn lock(&self) -> MutexGuard<'_, PipelineInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert_node(&self, node: Node) -> NodeId {
        let mut g = self.lock();
        let id = NodeId::new(g.next_id);
        g.next_id += 1;
        g.nodes.insert(id, node);
        id
    }

    pub(crate) fn connect(&self, from: NodeId, to: NodeId) {
        self.lock().edges.push((from, to));
    }

    pub(crate) fn add_source<T: Clone + Send + Sync + 'static>(&self, data: Vec<T>) -> NodeId {
        self.insert_node(Node::Source {
            payload: Arc::new(data),
            vec_ops: vec_ops_for::<T>(),
        })
    }

    /// Walk back from `terminal` to its source and return the chain in
    /// execution order.
    pub(crate) fn chain_to(&self, terminal: NodeId) -> Result<Vec<(NodeId, Node)>> {
        let g = self.lock();
        let mut chain = Vec::new();
        let mut cur = terminal;
        loop {
            let node = g
                .nodes
                .get(&cur)
                .cloned()
                .ok_or_else(|| anyhow!("node {cur} is not resident (released or never built)"))?;
            chain.push((cur, node));
            match g.edges.iter().find(|(_, to)| *to == cur) {
                Some((from, _)) => cur = *from,
                None => break,
            }
        }
        chain.reverse();
        Ok(chain)
    }

    /// Drop a node and everything derived from it. Returns `false` if `id`
    /// was already gone.
    pub(crate) fn release(&self, id: NodeId) -> bool {
        let mut g = self.lock();
        if !g.nodes.contains_key(&id) {
            return false;
        }
        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let cur = doomed[i];
            doomed.extend(g.edges.iter().filter(|(from, _)| *from == cur).map(|(_, to)| *to));
            i += 1;
        }
        g.edges
            .retain(|(from, to)| !doomed.contains(from) && !doomed.contains(to));
        for n in &doomed {
            g.nodes.remove(n);
        }
        true
    }

    /// Whether `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.lock().nodes.contains_key(&id)
    }

    /// Number of nodes currently held by the graph.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_vec;

    #[test]
    fn release_drops_derived_nodes() {
        let p = Pipeline::default();
        let src = from_vec(&p, vec![1u8, 2, 3]);
        let src_id = src.id();
        let derived = src.map(|x: &u8| x + 1).filter(|x: &u8| *x > 2);
        let other = from_vec(&p, vec!["kept".to_string()]);
        assert_eq!(p.node_count(), 4);

        assert!(p.release(src_id));
        assert!(!p.contains(derived.id()));
        assert!(p.contains(other.id()));
        assert_eq!(p.node_count(), 1);
        assert!(!p.release(src_id));
    }
}
