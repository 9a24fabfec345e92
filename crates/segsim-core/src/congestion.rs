use crate::network::{Matrix, Topology};

/// This trait defines an interface for scoring how congested a network is, given the load on
/// every link and the demands that produced it.
pub trait CongestionMeasure {
    fn congestion(&self, topology: &dyn Topology, loads: &Matrix, demands: &Matrix) -> f64;
}

impl<T: CongestionMeasure + ?Sized> CongestionMeasure for &T {
    fn congestion(&self, topology: &dyn Topology, loads: &Matrix, demands: &Matrix) -> f64 {
        (**self).congestion(topology, loads, demands)
    }
}

/// This measure reports the maximum link utilization and ignores demands.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxUtilization;

impl CongestionMeasure for MaxUtilization {
    fn congestion(&self, topology: &dyn Topology, loads: &Matrix, _demands: &Matrix) -> f64 {
        max_utilization(topology, loads)
    }
}

/// The largest `load / capacity` ratio over all channels. Channels without capacity or without
/// load are skipped; an idle network has a utilization of 0.
pub fn max_utilization<T: Topology + ?Sized>(topology: &T, loads: &Matrix) -> f64 {
    topology
        .channels()
        .into_iter()
        .filter_map(|(from, to)| {
            let capacity = topology.bandwidth(from, to)?;
            let load = *loads.get([from.inner(), to.inner()])?;
            (capacity > 0.0 && load > 0.0).then(|| load / capacity)
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Link, Network, Node, NodeId};
    use crate::testing;

    #[test]
    fn idle_network_has_zero_utilization() -> anyhow::Result<()> {
        let network = testing::triangle()?;
        assert_eq!(max_utilization(&network, &Matrix::zeros((3, 3))), 0.0);
        Ok(())
    }

    #[test]
    fn busiest_link_wins() -> anyhow::Result<()> {
        let network = testing::triangle()?;
        let mut loads = Matrix::zeros((3, 3));
        loads[[0, 1]] = 2.0;
        loads[[2, 1]] = 7.5;
        let mlu = MaxUtilization.congestion(&network, &loads, &Matrix::zeros((3, 3)));
        assert_eq!(mlu, 0.75);
        Ok(())
    }

    #[test]
    fn zero_capacity_links_are_skipped() -> anyhow::Result<()> {
        let nodes = [Node::new(NodeId::new(0)), Node::new(NodeId::new(1))];
        let links = [Link::new(NodeId::new(0), NodeId::new(1), 0.0)];
        let network = Network::new(&nodes, &links)?;
        let mut loads = Matrix::zeros((2, 2));
        loads[[0, 1]] = 1.0;
        assert_eq!(max_utilization(&network, &loads), 0.0);
        Ok(())
    }
}
