//! Load propagation: turning a label path and a demand into per-link load.

use rustc_hash::FxHashMap;

use crate::{
    balance::{LoadBalancer, SplitRatios},
    network::{Matrix, NodeId, ShortestPathDag, Topology, TopologyError},
    segment::{LabelPath, Segment},
};

/// The load a single label path adds to each link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadDelta {
    inner: FxHashMap<(NodeId, NodeId), f64>,
}

impl LoadDelta {
    pub fn add(&mut self, from: NodeId, to: NodeId, amount: f64) {
        *self.inner.entry((from, to)).or_default() += amount;
    }

    /// The load on `from -> to`, or 0 if the link carries nothing.
    pub fn get(&self, from: NodeId, to: NodeId) -> f64 {
        self.inner.get(&(from, to)).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = ((NodeId, NodeId), f64)> + '_ {
        self.inner.iter().map(|(&k, &v)| (k, v))
    }

    /// Adds `scale` times this delta into `loads`. Use a scale of -1 to subtract.
    ///
    /// PRECONDITION: every link of the delta indexes into `loads`.
    pub fn apply_to(&self, loads: &mut Matrix, scale: f64) {
        for (&(from, to), &amount) in &self.inner {
            loads[[from.inner(), to.inner()]] += scale * amount;
        }
    }

    delegate::delegate! {
        to self.inner {
            /// The number of links carrying load.
            pub fn len(&self) -> usize;

            pub fn is_empty(&self) -> bool;
        }
    }
}

/// Split ratios per destination, computed on first use. Entries go stale whenever the DAGs or
/// the balancer parameters change, so the owner must clear the cache then.
#[derive(Debug, Default)]
pub(crate) struct RatioCache {
    inner: FxHashMap<NodeId, SplitRatios>,
}

impl RatioCache {
    fn get_or_split<B>(&mut self, balancer: &B, dag: &ShortestPathDag) -> &SplitRatios
    where
        B: LoadBalancer + ?Sized,
    {
        self.inner
            .entry(dag.dest())
            .or_insert_with(|| balancer.split(dag))
    }

    pub(crate) fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Computes the load `path` puts on every link when it carries `demand`.
///
/// Adjacency segments put the whole demand on their link. Node segments are resolved over the
/// destination's DAG: traffic is pushed from the current position towards the segment's
/// destination, nodes are visited farthest first so that each node's inflow is complete before
/// it is split according to `balancer`.
pub fn distribute<T, B>(
    topology: &T,
    balancer: &B,
    path: &LabelPath,
    demand: f64,
) -> Result<LoadDelta, DistributeError>
where
    T: Topology + ?Sized,
    B: LoadBalancer + ?Sized,
{
    distribute_cached(topology, balancer, &mut RatioCache::default(), path, demand)
}

/// [`distribute`], reusing the split ratios in `cache`.
pub(crate) fn distribute_cached<T, B>(
    topology: &T,
    balancer: &B,
    cache: &mut RatioCache,
    path: &LabelPath,
    demand: f64,
) -> Result<LoadDelta, DistributeError>
where
    T: Topology + ?Sized,
    B: LoadBalancer + ?Sized,
{
    let mut delta = LoadDelta::default();
    let mut cur = path.src();
    for segment in path.segments() {
        match *segment {
            Segment::Adjacency { from, to } => {
                if !topology.edge_exists(from, to) {
                    return Err(TopologyError::UnknownLink { from, to }.into());
                }
                delta.add(from, to, demand);
                cur = to;
            }
            Segment::Node { dst } => {
                if cur != dst {
                    let dag = topology.shortest_path_dag(dst)?;
                    let ratios = cache.get_or_split(balancer, dag);
                    propagate(dag, ratios, cur, demand, &mut delta)?;
                }
                cur = dst;
            }
        }
    }
    Ok(delta)
}

fn propagate(
    dag: &ShortestPathDag,
    ratios: &SplitRatios,
    src: NodeId,
    demand: f64,
    delta: &mut LoadDelta,
) -> Result<(), DistributeError> {
    if !dag.is_reachable(src) {
        return Err(DistributeError::Unreachable {
            from: src,
            to: dag.dest(),
        });
    }
    // Inflow is tracked per segment; `delta` may already hold load from earlier segments
    let mut inflow = vec![0.0; dag.nr_nodes()];
    inflow[src.inner()] = demand;
    for &v in dag.order() {
        let incoming = inflow[v.inner()];
        if v == dag.dest() || incoming <= 0.0 {
            continue;
        }
        for &(w, ratio) in ratios.of(v) {
            if ratio <= 0.0 {
                continue;
            }
            let amount = ratio * incoming;
            delta.add(v, w, amount);
            inflow[w.inner()] += amount;
        }
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum DistributeError {
    #[error("cannot resolve path")]
    Topology(#[from] TopologyError),

    #[error("node {from} cannot reach {to}")]
    Unreachable { from: NodeId, to: NodeId },
}
