//! Type-erased partition buffers.
//!
//! Nodes in the graph do not carry their element type, so sources are stored
//! as `Arc<dyn Any>` next to a [`VecOps`] that knows how to measure, split and
//! clone the concrete `Vec<T>` behind it. Splitting produces the per-worker
//! partitions of a parallel run.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// A partition buffer carried between nodes at runtime (always a boxed `Vec<T>`).
pub type Partition = Box<dyn Any + Send + Sync>;

/// Type-erased helpers for `Vec<T>`.
///
/// Implementations return `None` when `data` is not the `Vec<T>` they were
/// built for.
pub trait VecOps: Send + Sync {
    /// Number of elements if `data` is a `Vec<T>`.
    fn len(&self, data: &dyn Any) -> Option<usize>;

    /// Split `data` into at most `n` contiguous, non-empty partitions.
    ///
    /// `n <= 1` or tiny inputs yield a single partition.
    fn split(&self, data: &dyn Any, n: usize) -> Option<Vec<Partition>>;

    /// Clone the whole vector into one partition.
    fn clone_any(&self, data: &dyn Any) -> Option<Partition>;
}

struct VecOpsImpl<T>(PhantomData<fn() -> T>);

impl<T: Clone + Send + Sync + 'static> VecOps for VecOpsImpl<T> {
    fn len(&self, data: &dyn Any) -> Option<usize> {
        data.downcast_ref::<Vec<T>>().map(Vec::len)
    }

    fn split(&self, data: &dyn Any, n: usize) -> Option<Vec<Partition>> {
        let v = data.downcast_ref::<Vec<T>>()?;
        let len = v.len();

        if n <= 1 || len <= 1 {
            return Some(vec![Box::new(v.clone())]);
        }

        let chunk = len.div_ceil(n);
        let parts = v
            .chunks(chunk)
            .map(|c| Box::new(c.to_vec()) as Partition)
            .collect();
        Some(parts)
    }

    fn clone_any(&self, data: &dyn Any) -> Option<Partition> {
        data.downcast_ref::<Vec<T>>()
            .map(|v| Box::new(v.clone()) as Partition)
    }
}

/// Build the [`VecOps`] for `Vec<T>`.
pub fn vec_ops_for<T: Clone + Send + Sync + 'static>() -> Arc<dyn VecOps> {
    Arc::new(VecOpsImpl::<T>(PhantomData))
}
