//! Distributed Exponentially-weighted Flow SpliTting.

use log::debug;
use segsim_core::{LoadBalancer, PValues, ShortestPathDag, SplitRatios};

use crate::penalty;

/// DEFT. Every downward channel gets a share proportional to `exp(-p * extra)`, where `extra`
/// is how much longer the channel's best path is than the shortest path and `p` is the
/// parameter of the splitting node. Larger parameters push more traffic onto shortest paths.
#[derive(Debug, Default, Clone, derive_new::new)]
pub struct Deft {
    pvalues: PValues,
}

impl LoadBalancer for Deft {
    fn split(&self, dag: &ShortestPathDag) -> SplitRatios {
        let mut ratios = SplitRatios::new(dag.nr_nodes());
        for &v in dag.order() {
            let p = self.pvalues.get(v);
            let edges = dag.downward(v);
            let total = edges.iter().map(|e| penalty(p, e.extra)).sum::<f64>();
            for e in edges {
                ratios.push(v, e.to, penalty(p, e.extra) / total);
            }
        }
        ratios
    }

    fn set_pvalues(&mut self, pvalues: &PValues) {
        debug!("DEFT: installing {} p-values", pvalues.len());
        self.pvalues = pvalues.clone();
    }
}

#[cfg(test)]
mod tests {
    use segsim_core::{testing, FlowClass, LabelPath, Network, SimOpts, Simulator, Topology};

    use super::*;
    use crate::tests::{assert_conserving, fan, id, uneven_square};

    #[test]
    fn longer_hops_get_less() -> anyhow::Result<()> {
        let network = uneven_square()?;
        let dag = network.shortest_path_dag(id(3))?;
        let ratios = Deft::default().split(dag);
        assert_conserving(dag, &ratios);
        let e = (-1.0f64).exp();
        assert!((ratios.ratio(id(0), id(1)) - 1.0 / (1.0 + e)).abs() < 1e-12);
        assert!((ratios.ratio(id(0), id(2)) - e / (1.0 + e)).abs() < 1e-12);
        assert_eq!(ratios.ratio(id(1), id(3)), 1.0);
        Ok(())
    }

    #[test]
    fn zero_pvalue_splits_evenly() -> anyhow::Result<()> {
        let network = uneven_square()?;
        let dag = network.shortest_path_dag(id(3))?;
        let deft = Deft::new(PValues::new(vec![0.0; 4])?);
        let ratios = deft.split(dag);
        assert_eq!(ratios.ratio(id(0), id(1)), 0.5);
        assert_eq!(ratios.ratio(id(0), id(2)), 0.5);
        Ok(())
    }

    #[test]
    fn equal_cost_hops_split_evenly() -> anyhow::Result<()> {
        let network = fan()?;
        let dag = network.shortest_path_dag(id(4))?;
        let ratios = Deft::default().split(dag);
        assert_conserving(dag, &ratios);
        assert_eq!(ratios.ratio(id(0), id(1)), 0.5);
        assert_eq!(ratios.ratio(id(0), id(2)), 0.5);
        Ok(())
    }

    #[test]
    fn ratios_conserve_on_fabric() -> anyhow::Result<()> {
        let (nodes, links) = testing::eight_node_config();
        let mut network = Network::new(&nodes, &links)?;
        let mut weights = testing::unit_weights(8);
        weights[[4, 7]] = 2.5;
        weights[[6, 5]] = 1.5;
        network.apply_weights(weights)?;
        let deft = Deft::new(PValues::new((0..8).map(|i| i as f64 / 4.0).collect())?);
        for dest in 0..8 {
            let dag = network.shortest_path_dag(id(dest))?;
            assert_conserving(dag, &deft.split(dag));
        }
        Ok(())
    }

    #[test]
    fn simulator_replays_with_new_pvalues() -> anyhow::Result<()> {
        let sim = Simulator::new(uneven_square()?, Deft::default(), SimOpts::default());
        let flow = sim.new_flow(id(0), id(3), 10.0, FlowClass::User);
        sim.add_flow(flow, LabelPath::shortest(id(0), id(3), 1.0))?;
        let before = sim.loads(None)[[0, 2]];
        assert!(before > 0.0);

        sim.apply_pvalues(&PValues::new(vec![5.0; 4])?)?;
        let after = sim.loads(None);
        assert!(after[[0, 2]] < before);
        assert!((after[[0, 1]] + after[[0, 2]] - 10.0).abs() < 1e-9);
        Ok(())
    }
}
