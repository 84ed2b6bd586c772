use crate::node::{DynOp, Node};
use crate::node_id::NodeId;
use crate::pipeline::Pipeline;
use crate::runner::{ExecMode, Runner};
use crate::type_token::Partition;
use anyhow::{Result, anyhow};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Bound shared by every element type flowing through a pipeline.
pub trait Element: 'static + Send + Sync + Clone {}
impl<T> Element for T where T: 'static + Send + Sync + Clone {}

/// A lazily evaluated, immutable collection of `T` attached to a [`Pipeline`].
#[derive(Clone)]
pub struct PCollection<T> {
    pub(crate) pipeline: Pipeline,
    pub(crate) id: NodeId,
    _t: PhantomData<fn() -> T>,
}

/// Create a source collection from an in-memory vector.
pub fn from_vec<T: Element>(p: &Pipeline, data: Vec<T>) -> PCollection<T> {
    let id = p.add_source(data);
    PCollection::attach(p.clone(), id)
}

fn take_vec<T: 'static>(input: Partition, op: &str) -> Result<Vec<T>> {
    input
        .downcast::<Vec<T>>()
        .map(|b| *b)
        .map_err(|_| anyhow!("{op}: partition element type mismatch"))
}

struct MapOp<I, O, F>(F, PhantomData<fn(I) -> O>);
impl<I, O, F> DynOp for MapOp<I, O, F>
where
    I: Element,
    O: Element,
    F: Send + Sync + Fn(&I) -> O + 'static,
{
    fn apply(&self, input: Partition) -> Result<Partition> {
        let v = take_vec::<I>(input, "map")?;
        let out: Vec<O> = v.iter().map(|i| self.0(i)).collect();
        Ok(Box::new(out))
    }
}

struct FilterOp<T, P>(P, PhantomData<fn(T)>);
impl<T, P> DynOp for FilterOp<T, P>
where
    T: Element,
    P: Send + Sync + Fn(&T) -> bool + 'static,
{
    fn apply(&self, input: Partition) -> Result<Partition> {
        let v = take_vec::<T>(input, "filter")?;
        Ok(Box::new(v.into_iter().filter(|t| self.0(t)).collect::<Vec<T>>()))
    }
}

struct FlatMapOp<I, O, F>(F, PhantomData<fn(I) -> O>);
impl<I, O, F> DynOp for FlatMapOp<I, O, F>
where
    I: Element,
    O: Element,
    F: Send + Sync + Fn(&I) -> Vec<O> + 'static,
{
    fn apply(&self, input: Partition) -> Result<Partition> {
        let v = take_vec::<I>(input, "flat_map")?;
        let mut out: Vec<O> = Vec::new();
        for i in &v {
            out.extend(self.0(i));
        }
        Ok(Box::new(out))
    }
}

impl<T: Element> PCollection<T> {
    fn attach(pipeline: Pipeline, id: NodeId) -> Self {
        PCollection {
            pipeline,
            id,
            _t: PhantomData,
        }
    }

    fn push_op<O: Element>(self, op: Arc<dyn DynOp>) -> PCollection<O> {
        let id = self.pipeline.insert_node(Node::Stateless(vec![op]));
        self.pipeline.connect(self.id, id);
        PCollection::attach(self.pipeline, id)
    }

    pub fn map<O, F>(self, f: F) -> PCollection<O>
    where
        O: Element,
        F: 'static + Send + Sync + Fn(&T) -> O,
    {
        self.push_op(Arc::new(MapOp::<T, O, F>(f, PhantomData)))
    }

    pub fn filter<F>(self, pred: F) -> PCollection<T>
    where
        F: 'static + Send + Sync + Fn(&T) -> bool,
    {
        self.push_op(Arc::new(FilterOp::<T, F>(pred, PhantomData)))
    }

    pub fn flat_map<O, F>(self, f: F) -> PCollection<O>
    where
        O: Element,
        F: 'static + Send + Sync + Fn(&T) -> Vec<O>,
    {
        self.push_op(Arc::new(FlatMapOp::<T, O, F>(f, PhantomData)))
    }

    /// Node backing this collection.
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn collect_with(self, runner: &Runner) -> Result<Vec<T>> {
        runner.run_collect::<T>(&self.pipeline, self.id)
    }

    pub fn collect_seq(self) -> Result<Vec<T>> {
        self.collect_with(&Runner::sequential())
    }

    pub fn collect_par(self, threads: Option<usize>, partitions: Option<usize>) -> Result<Vec<T>> {
        let runner = Runner {
            mode: ExecMode::Parallel {
                threads,
                partitions,
            },
            ..Default::default()
        };
        self.collect_with(&runner)
    }

    /// Evaluate the chain once and pin the result in the graph.
    ///
    /// Collections derived from [`CachedCollection::collection`] start from
    /// the materialized data instead of re-running upstream work. The data is
    /// released when the returned handle is dropped.
    pub fn cache(self, runner: &Runner) -> Result<CachedCollection<T>> {
        let pipeline = self.pipeline.clone();
        let data = self.collect_with(runner)?;
        let len = data.len();
        let id = pipeline.add_source(data);
        debug!(node = %id, elements = len, "cached collection");
        Ok(CachedCollection {
            pipeline,
            id,
            len,
            _t: PhantomData,
        })
    }
}

/// Scoped handle on a materialized collection.
///
/// The payload stays resident exactly as long as the handle lives. Dropping
/// it, including during unwinding after an error, removes the payload and
/// every collection derived from it from the graph.
pub struct CachedCollection<T> {
    pipeline: Pipeline,
    id: NodeId,
    len: usize,
    _t: PhantomData<fn() -> T>,
}

impl<T: Element> CachedCollection<T> {
    /// A fresh collection rooted at the cached data.
    pub fn collection(&self) -> PCollection<T> {
        PCollection::attach(self.pipeline.clone(), self.id)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Drop for CachedCollection<T> {
    fn drop(&mut self) {
        if self.pipeline.release(self.id) {
            debug!(node = %self.id, elements = self.len, "released cached collection");
        }
    }
}
