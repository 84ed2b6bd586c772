use crate::node::{DynOp, Node};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::type_token::Partition;
use anyhow::{Context, Result, anyhow, bail};
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecMode {
    Sequential,
    Parallel {
        threads: Option<usize>,
        partitions: Option<usize>,
    },
}

/// Executes a linear chain of nodes, either in-process on one partition or
/// data-parallel across partitions on the rayon pool.
#[derive(Clone, Debug)]
pub struct Runner {
    pub mode: ExecMode,
    pub default_partitions: usize,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            mode: ExecMode::Parallel {
                threads: None,
                partitions: None,
            },
            default_partitions: 2 * num_cpus::get().max(2),
        }
    }
}

impl Runner {
    pub fn sequential() -> Self {
        Self {
            mode: ExecMode::Sequential,
            ..Default::default()
        }
    }

    pub fn parallel(threads: Option<usize>, partitions: Option<usize>) -> Self {
        Self {
            mode: ExecMode::Parallel {
                threads,
                partitions,
            },
            ..Default::default()
        }
    }

    /// Run `f` on a dedicated pool when an explicit thread count was asked
    /// for, otherwise on the global rayon pool.
    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> Result<R> {
        match self.mode {
            ExecMode::Parallel {
                threads: Some(t), ..
            } => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(t.max(1))
                    .build()
                    .context("build worker pool")?;
                Ok(pool.install(f))
            }
            _ => Ok(f()),
        }
    }

    pub fn run_collect<T: 'static + Send + Sync + Clone>(
        &self,
        p: &Pipeline,
        terminal: NodeId,
    ) -> Result<Vec<T>> {
        let chain = p.chain_to(terminal)?;
        match self.mode {
            ExecMode::Sequential => exec_seq::<T>(chain),
            ExecMode::Parallel { partitions, .. } => {
                let parts = partitions.unwrap_or(self.default_partitions);
                self.install(|| exec_parallel::<T>(chain, parts))?
            }
        }
    }
}

fn fuse_stateless(ops: &[Arc<dyn DynOp>], input: Partition) -> Result<Partition> {
    ops.iter().try_fold(input, |acc, op| op.apply(acc))
}

fn into_vec<T: 'static>(part: Partition) -> Result<Vec<T>> {
    part.downcast::<Vec<T>>()
        .map(|b| *b)
        .map_err(|_| anyhow!("terminal type mismatch"))
}

fn exec_seq<T: 'static + Send + Sync + Clone>(plan: Vec<(NodeId, Node)>) -> Result<Vec<T>> {
    let mut plan = plan.into_iter();
    let mut buf = match plan.next() {
        Some((id, Node::Source { payload, vec_ops })) => vec_ops
            .clone_any(payload.as_ref())
            .ok_or_else(|| anyhow!("source {id} has an unexpected payload type"))?,
        Some((id, _)) => bail!("plan must start with a source, found transform {id}"),
        None => bail!("empty plan"),
    };

    for (id, node) in plan {
        buf = match node {
            Node::Stateless(ops) => fuse_stateless(&ops, buf)?,
            Node::Source { .. } => bail!("unexpected additional source {id} in plan"),
        };
    }

    into_vec::<T>(buf)
}

fn exec_parallel<T: 'static + Send + Sync + Clone>(
    plan: Vec<(NodeId, Node)>,
    partitions: usize,
) -> Result<Vec<T>> {
    let (source, rest) = plan.split_first().ok_or_else(|| anyhow!("empty plan"))?;
    let (payload, vec_ops) = match &source.1 {
        Node::Source { payload, vec_ops } => (payload, vec_ops),
        Node::Stateless(_) => bail!("plan must start with a source, found transform {}", source.0),
    };

    let total_len = vec_ops.len(payload.as_ref()).unwrap_or(0);
    let parts = partitions.max(1).min(total_len.max(1));
    let mut current = vec_ops
        .split(payload.as_ref(), parts)
        .ok_or_else(|| anyhow!("source {} has an unexpected payload type", source.0))?;

    let mut ops: Vec<Arc<dyn DynOp>> = Vec::new();
    for (id, node) in rest {
        match node {
            Node::Stateless(more) => ops.extend(more.iter().cloned()),
            Node::Source { .. } => bail!("unexpected additional source {id} in plan"),
        }
    }

    if !ops.is_empty() {
        current = current
            .into_par_iter()
            .map(|chunk| fuse_stateless(&ops, chunk))
            .collect::<Result<Vec<_>>>()?;
    }

    let mut out = Vec::<T>::with_capacity(total_len);
    for part in current {
        out.extend(into_vec::<T>(part)?);
    }
    Ok(out)
}
