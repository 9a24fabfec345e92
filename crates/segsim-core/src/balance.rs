//! Load-balancing policies decide how traffic at a node is split over its next hops towards a
//! destination.

use crate::network::{NodeId, ShortestPathDag};

/// The trait implemented by all load-balancing policies.
pub trait LoadBalancer {
    /// Computes split ratios for every downward channel of `dag`. For every node that can reach
    /// the destination, the ratios over its channels must sum to 1.
    fn split(&self, dag: &ShortestPathDag) -> SplitRatios;

    /// The share of traffic at `from` heading to `dag.dest()` that goes over `from -> to`.
    ///
    /// The default implementation computes the whole split for every lookup. Callers looking
    /// up many channels of one DAG should call [`LoadBalancer::split`] once instead.
    fn split_ratio(&self, dag: &ShortestPathDag, from: NodeId, to: NodeId) -> f64 {
        self.split(dag).ratio(from, to)
    }

    /// Installs per-node parameters. Policies without parameters ignore them.
    fn set_pvalues(&mut self, _pvalues: &PValues) {}
}

impl<T: LoadBalancer + ?Sized> LoadBalancer for Box<T> {
    fn split(&self, dag: &ShortestPathDag) -> SplitRatios {
        (**self).split(dag)
    }

    fn set_pvalues(&mut self, pvalues: &PValues) {
        (**self).set_pvalues(pvalues)
    }
}

/// Split ratios towards one destination, indexed by node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitRatios {
    inner: Vec<Vec<(NodeId, f64)>>,
}

impl SplitRatios {
    pub fn new(nr_nodes: usize) -> Self {
        Self {
            inner: vec![Vec::new(); nr_nodes],
        }
    }

    /// Records the ratio of channel `from -> to`.
    pub fn push(&mut self, from: NodeId, to: NodeId, ratio: f64) {
        if let Some(ratios) = self.inner.get_mut(from.inner()) {
            ratios.push((to, ratio));
        }
    }

    /// The ratios of every channel out of `node`.
    pub fn of(&self, node: NodeId) -> &[(NodeId, f64)] {
        self.inner
            .get(node.inner())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The ratio of channel `from -> to`, or 0 if it carries nothing.
    pub fn ratio(&self, from: NodeId, to: NodeId) -> f64 {
        self.of(from)
            .iter()
            .find_map(|&(n, r)| (n == to).then_some(r))
            .unwrap_or(0.0)
    }
}

/// Equal-cost multipath: traffic is split evenly over shortest-path next hops.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ecmp;

impl LoadBalancer for Ecmp {
    fn split(&self, dag: &ShortestPathDag) -> SplitRatios {
        let mut ratios = SplitRatios::new(dag.nr_nodes());
        for &v in dag.order() {
            let hops = dag.next_hops(v).collect::<Vec<_>>();
            let share = 1.0 / hops.len() as f64;
            for hop in hops {
                ratios.push(v, hop, share);
            }
        }
        ratios
    }
}

/// One non-negative parameter per node, used by penalizing policies to scale how strongly
/// longer next hops are penalized.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PValues {
    inner: Vec<f64>,
}

impl PValues {
    /// The value used for nodes without an explicit parameter.
    pub const DEFAULT: f64 = 1.0;

    pub fn new(values: Vec<f64>) -> Result<Self, BalanceError> {
        if let Some((i, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(BalanceError::InvalidPValue {
                node: NodeId::new(i),
                value,
            });
        }
        Ok(Self { inner: values })
    }

    /// The parameter of `node`, or [`PValues::DEFAULT`] if none was given.
    pub fn get(&self, node: NodeId) -> f64 {
        self.inner
            .get(node.inner())
            .copied()
            .unwrap_or(Self::DEFAULT)
    }

    delegate::delegate! {
        to self.inner {
            pub fn len(&self) -> usize;

            pub fn is_empty(&self) -> bool;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BalanceError {
    #[error("invalid p-value {value} for node {node}")]
    InvalidPValue { node: NodeId, value: f64 },
}
