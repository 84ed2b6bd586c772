use crate::type_token::{Partition, VecOps};
use anyhow::Result;
use std::any::Any;
use std::sync::Arc;

/// A type-erased element-wise transform applied to one partition.
pub(crate) trait DynOp: Send + Sync {
    fn apply(&self, input: Partition) -> Result<Partition>;
}

#[derive(Clone)]
pub(crate) enum Node {
    /// In-memory payload: either an input vector or a cached collection.
    Source {
        payload: Arc<dyn Any + Send + Sync>,
        vec_ops: Arc<dyn VecOps>,
    },
    /// Contiguous stateless ops; the runner fuses neighbouring ones.
    Stateless(Vec<Arc<dyn DynOp>>),
}
