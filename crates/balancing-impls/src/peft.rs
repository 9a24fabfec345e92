//! Penalizing Exponential Flow-spliTting.

use log::debug;
use segsim_core::{LoadBalancer, PValues, ShortestPathDag, SplitRatios};

use crate::penalty;

/// PEFT. Like [DEFT](crate::Deft), channels are penalized by `exp(-p * extra)`, but each
/// channel is additionally weighted by the penalized number of paths that continue from its
/// far end. With `G(dest) = 1` and `G(v) = sum over channels v -> x of exp(-p * extra) * G(x)`,
/// the channel `v -> x` gets `exp(-p * extra) * G(x) / G(v)`.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct Peft {
    pvalues: PValues,
}

impl Peft {
    // Path weights, indexed by node. Unreachable nodes keep 0.
    fn path_weights(&self, dag: &ShortestPathDag) -> Vec<f64> {
        let mut g = vec![0.0; dag.nr_nodes()];
        // Closest first: every channel leads to a node that is already done
        for &v in dag.order().iter().rev() {
            g[v.inner()] = if v == dag.dest() {
                1.0
            } else {
                let p = self.pvalues.get(v);
                dag.downward(v)
                    .iter()
                    .map(|e| penalty(p, e.extra) * g[e.to.inner()])
                    .sum()
            };
        }
        g
    }
}

impl LoadBalancer for Peft {
    fn split(&self, dag: &ShortestPathDag) -> SplitRatios {
        let g = self.path_weights(dag);
        let mut ratios = SplitRatios::new(dag.nr_nodes());
        for &v in dag.order().iter().filter(|&&v| v != dag.dest()) {
            let p = self.pvalues.get(v);
            let total = g[v.inner()];
            for e in dag.downward(v) {
                ratios.push(v, e.to, penalty(p, e.extra) * g[e.to.inner()] / total);
            }
        }
        ratios
    }

    fn set_pvalues(&mut self, pvalues: &PValues) {
        debug!("PEFT: installing {} p-values", pvalues.len());
        self.pvalues = pvalues.clone();
    }
}
