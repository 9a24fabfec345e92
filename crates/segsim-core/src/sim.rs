//! The flow simulator: a table of routed flows and the aggregate link loads they produce.

mod correct;

use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::{
    balance::{BalanceError, LoadBalancer, PValues},
    congestion::{self, CongestionMeasure},
    distribute::{self, DistributeError, LoadDelta, RatioCache},
    flow::{Flow, FlowClass, FlowId},
    network::{Matrix, NodeId, Topology, TopologyError},
    opts::SimOpts,
    planning::PlanError,
    segment::LabelPath,
    sr_config::{ConfigError, SrConfig},
    translate::{PathTranslator, TranslateError},
};

pub use correct::{
    correct_path, validate_path, Correction, CorrectionError, RecoveryConfig, RecoveryPolicy,
    RecoverySetting,
};

/// A flow and the label path it is currently routed over.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub flow: Flow,
    pub path: LabelPath,
}

/// The outcome of handling a link failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailureReport {
    /// The policy that was in effect.
    pub policy: Option<RecoveryPolicy>,
    /// Flows whose paths were corrected, or the flows of the new configuration under global
    /// re-optimization.
    pub repaired: Vec<FlowId>,
    /// Flows that could not be routed and were removed.
    pub unrouted: Vec<FlowId>,
}

/// A segment-routing simulator over a topology `T` whose node segments are split by `B`.
///
/// Every operation holds the simulator's lock for its whole duration, so a `Simulator` can be
/// shared between threads.
#[derive(Debug)]
pub struct Simulator<T, B> {
    state: Mutex<State<T, B>>,
    next_id: AtomicUsize,
    opts: SimOpts,
}

impl<T, B> Simulator<T, B>
where
    T: Topology,
    B: LoadBalancer,
{
    pub fn new(topology: T, balancer: B, opts: SimOpts) -> Self {
        let n = topology.dimension();
        Self {
            state: Mutex::new(State {
                topology,
                balancer,
                loads: Matrix::zeros((n, n)),
                flows: FxHashMap::default(),
                ratios: RatioCache::default(),
            }),
            next_id: AtomicUsize::new(0),
            opts,
        }
    }

    /// Creates a flow carrying the whole `src -> dst` demand with a fresh ID. The flow is not
    /// routed until it is added.
    pub fn new_flow(&self, src: NodeId, dst: NodeId, demand: f64, class: FlowClass) -> Flow {
        Flow::new(self.next_flow_id(), src, dst, demand, 1.0, class)
    }

    fn next_flow_id(&self) -> FlowId {
        FlowId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Routes `flow` over `path` and adds its load. A flow that is already routed is moved to
    /// the new path.
    pub fn add_flow(&self, flow: Flow, path: LabelPath) -> Result<(), Error> {
        self.state.lock().route(flow, path)?;
        Ok(())
    }

    /// Routes `flow` over the shortest paths to its destination.
    pub fn add_flow_shortest(&self, flow: Flow) -> Result<(), Error> {
        self.add_flow(flow, LabelPath::shortest(flow.src, flow.dst, flow.fraction))
    }

    /// Routes `flow` along an explicit node path, compressed into a label path first.
    pub fn add_flow_along(&self, flow: Flow, nodes: &[NodeId]) -> Result<(), Error> {
        let mut state = self.state.lock();
        let path = self.translate_with(&state.topology, nodes)?;
        if path.src() != flow.src || path.dst() != flow.dst {
            return Err(ConfigError::EndpointMismatch {
                src: flow.src,
                dst: flow.dst,
                path: path.to_string(),
            }
            .into());
        }
        state.route(flow, path.with_fraction(flow.fraction))?;
        Ok(())
    }

    /// Compresses a node path under the current weights, honoring the configured label bound.
    pub fn translate(&self, nodes: &[NodeId]) -> Result<LabelPath, Error> {
        let state = self.state.lock();
        self.translate_with(&state.topology, nodes)
    }

    fn translate_with(&self, topology: &T, nodes: &[NodeId]) -> Result<LabelPath, Error> {
        let translator = PathTranslator::new(topology);
        let path = match self.opts.max_labels {
            Some(max) => translator.translate_bounded(nodes, max)?,
            None => translator.translate(nodes)?,
        };
        Ok(path)
    }

    /// Removes a flow and its load.
    pub fn remove_flow(&self, id: FlowId) -> Result<Flow, Error> {
        self.state
            .lock()
            .unroute(id)
            .map(|route| route.flow)
            .ok_or(Error::UnknownFlow(id))
    }

    /// Removes every flow.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.flows.clear();
        state.loads.fill(0.0);
    }

    /// Removes every flow of class `class`, returning how many were removed.
    pub fn clear_class(&self, class: FlowClass) -> usize {
        let mut state = self.state.lock();
        let ids = state
            .flows
            .iter()
            .filter(|(_, entry)| entry.route.flow.class == class)
            .map(|(&id, _)| id)
            .collect::<Vec<_>>();
        for &id in &ids {
            state.unroute(id);
        }
        ids.len()
    }

    /// Adds one [`FlowClass::Salp`] flow per configured label path, carrying the path's
    /// fraction of the matching demand. Returns the IDs of the flows that were routed; paths
    /// that cannot be routed are logged and skipped.
    pub fn apply(&self, config: &SrConfig, demands: &Matrix) -> Result<Vec<FlowId>, Error> {
        let mut guard = self.state.lock();
        let (routed, _) = self.apply_with(&mut guard, config, demands)?;
        Ok(routed)
    }

    // Returns the IDs of the routed and of the skipped flows
    fn apply_with(
        &self,
        state: &mut State<T, B>,
        config: &SrConfig,
        demands: &Matrix,
    ) -> Result<(Vec<FlowId>, Vec<FlowId>), Error> {
        let n = state.topology.dimension();
        if demands.dim() != (n, n) {
            return Err(TopologyError::DimensionMismatch {
                expected: n,
                got: demands.dim(),
            }
            .into());
        }
        let mut routed = Vec::new();
        let mut skipped = Vec::new();
        for (src, dst, path) in config.iter() {
            // Endpoints outside the topology are rejected when the flow is routed
            let total = demands
                .get([src.inner(), dst.inner()])
                .copied()
                .unwrap_or(0.0);
            let flow = Flow::new(
                self.next_flow_id(),
                src,
                dst,
                path.fraction() * total,
                path.fraction(),
                FlowClass::Salp,
            );
            match state.route(flow, path.clone()) {
                Ok(()) => routed.push(flow.id),
                Err(e) => {
                    warn!("Skipping {path}: {e}");
                    skipped.push(flow.id);
                }
            }
        }
        info!(
            "Applied SR configuration: {} paths routed, {} skipped",
            routed.len(),
            skipped.len()
        );
        Ok((routed, skipped))
    }

    /// Installs new balancer parameters and reroutes every flow over its stored path.
    pub fn apply_pvalues(&self, pvalues: &PValues) -> Result<(), Error> {
        let mut state = self.state.lock();
        let n = state.topology.dimension();
        if pvalues.len() != n {
            return Err(TopologyError::DimensionMismatch {
                expected: n,
                got: (pvalues.len(), 1),
            }
            .into());
        }
        state.balancer.set_pvalues(pvalues);
        state.ratios.clear();
        state.replay();
        Ok(())
    }

    /// Applies new IGP weights and reroutes every flow over its stored path. Node segments
    /// follow the new shortest paths; adjacency segments stay where they are.
    pub fn set_weights(&self, weights: Matrix) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.topology.apply_weights(weights)?;
        state.ratios.clear();
        state.replay();
        Ok(())
    }

    /// Sets the status of a link. Routes and loads are left untouched until the failure is
    /// handled with [`Simulator::fail_link`].
    pub fn set_link_up(&self, a: NodeId, b: NodeId, up: bool) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.topology.set_link_up(a, b, up)?;
        state.ratios.clear();
        Ok(())
    }

    /// Handles the failure of the link between `a` and `b`, whose status must already be down.
    ///
    /// Shortest paths are recomputed and the recovery policy is read from `recovery`. Under
    /// [`RecoveryPolicy::GlobalReoptimization`], all flows are replaced by a freshly planned SR
    /// configuration carrying the same demands. Otherwise every flow is rerouted, with paths
    /// over failed links corrected first; flows that cannot be corrected or routed are removed.
    pub fn fail_link<R>(&self, a: NodeId, b: NodeId, recovery: &R) -> Result<FailureReport, Error>
    where
        R: RecoveryConfig + ?Sized,
    {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.topology.edge_exists(a, b) {
            return Err(TopologyError::UnknownLink { from: a, to: b }.into());
        }
        let weights = state
            .topology
            .weights()
            .cloned()
            .ok_or(TopologyError::StaleTopology)?;
        state.topology.apply_weights(weights)?;
        state.ratios.clear();

        let policy = recovery.policy();
        info!("Handling failure of {a} -- {b} (policy: {policy:?})");
        let mut report = FailureReport {
            policy,
            ..Default::default()
        };

        if policy == Some(RecoveryPolicy::GlobalReoptimization) {
            let demands = state.demands(None);
            let config = self.opts.planner.plan(&state.topology, &demands)?;
            let old = state.take_routes();
            let (routed, skipped) = self.apply_with(state, &config, &demands)?;
            for Route { flow, .. } in old {
                if config.paths_to_destination(flow.src, flow.dst).is_empty() {
                    warn!(
                        "Removing flow {}: nothing planned from {} to {}",
                        flow.id, flow.src, flow.dst
                    );
                    report.unrouted.push(flow.id);
                }
            }
            report.unrouted.extend(skipped);
            report.repaired = routed;
            info!(
                "Failure handled by re-optimization: {} flows planned, {} unrouted",
                report.repaired.len(),
                report.unrouted.len()
            );
            return Ok(report);
        }

        for Route { mut flow, path } in state.take_routes() {
            let (path, repaired) = if validate_path(&state.topology, &path) {
                (path, false)
            } else {
                match correct_path(&state.topology, &flow, &path, policy) {
                    Ok(correction) => {
                        debug!("Flow {} moved from {path} to {}", flow.id, correction.path);
                        flow.class = correction.class;
                        (correction.path, true)
                    }
                    Err(e) => {
                        warn!("Removing flow {}: {e}", flow.id);
                        report.unrouted.push(flow.id);
                        continue;
                    }
                }
            };
            match state.route(flow, path) {
                Ok(()) if repaired => report.repaired.push(flow.id),
                Ok(()) => {}
                Err(e) => {
                    warn!("Removing flow {}: {e}", flow.id);
                    report.unrouted.push(flow.id);
                }
            }
        }
        info!(
            "Failure handled: {} flows repaired, {} unrouted",
            report.repaired.len(),
            report.unrouted.len()
        );
        Ok(report)
    }

    /// The utilization of the channel `u -> v`. Channels without capacity report 0.
    pub fn usage(&self, u: NodeId, v: NodeId) -> Result<f64, Error> {
        let state = self.state.lock();
        let capacity = state
            .topology
            .bandwidth(u, v)
            .ok_or(TopologyError::UnknownLink { from: u, to: v })?;
        if capacity <= 0.0 {
            return Ok(0.0);
        }
        Ok(state.loads[[u.inner(), v.inner()]] / capacity)
    }

    /// The maximum link utilization.
    pub fn mlu(&self) -> f64 {
        let state = self.state.lock();
        congestion::max_utilization(&state.topology, &state.loads)
    }

    /// Scores the current loads and demands with `measure`.
    pub fn congestion_value<C>(&self, measure: &C) -> f64
    where
        C: CongestionMeasure + ?Sized,
    {
        let state = self.state.lock();
        measure.congestion(&state.topology, &state.loads, &state.demands(None))
    }

    /// The link loads produced by flows of class `class`, or by all flows if `class` is `None`.
    pub fn loads(&self, class: Option<FlowClass>) -> Matrix {
        let state = self.state.lock();
        match class {
            None => state.loads.clone(),
            Some(class) => {
                let mut loads = Matrix::zeros(state.loads.dim());
                for entry in state.flows.values().filter(|e| e.route.flow.class == class) {
                    entry.delta.apply_to(&mut loads, 1.0);
                }
                loads
            }
        }
    }

    /// The demand matrix of flows of class `class`, or of all flows if `class` is `None`.
    pub fn demands(&self, class: Option<FlowClass>) -> Matrix {
        self.state.lock().demands(class)
    }

    /// The route of a flow, if it is routed.
    pub fn route(&self, id: FlowId) -> Option<Route> {
        self.state
            .lock()
            .flows
            .get(&id)
            .map(|entry| entry.route.clone())
    }

    pub fn nr_flows(&self) -> usize {
        self.state.lock().flows.len()
    }

    /// Runs `f` on the topology.
    pub fn with_topology<F, U>(&self, f: F) -> U
    where
        F: FnOnce(&T) -> U,
    {
        f(&self.state.lock().topology)
    }
}

#[derive(Debug)]
struct State<T, B> {
    topology: T,
    balancer: B,
    loads: Matrix,
    flows: FxHashMap<FlowId, Entry>,
    ratios: RatioCache,
}

#[derive(Debug)]
struct Entry {
    route: Route,
    // The load this route added, subtracted again on removal
    delta: LoadDelta,
}

impl<T, B> State<T, B>
where
    T: Topology,
    B: LoadBalancer,
{
    fn route(&mut self, flow: Flow, path: LabelPath) -> Result<(), Error> {
        let n = self.topology.dimension();
        if let Some(&node) = [flow.src, flow.dst].iter().find(|v| v.inner() >= n) {
            return Err(TopologyError::UnknownNode(node).into());
        }
        let delta = distribute::distribute_cached(
            &self.topology,
            &self.balancer,
            &mut self.ratios,
            &path,
            flow.demand,
        )?;
        self.unroute(flow.id);
        delta.apply_to(&mut self.loads, 1.0);
        debug!("Routed {} flow {} over {path}", flow.class, flow.id);
        self.flows.insert(
            flow.id,
            Entry {
                route: Route { flow, path },
                delta,
            },
        );
        Ok(())
    }

    fn unroute(&mut self, id: FlowId) -> Option<Route> {
        let entry = self.flows.remove(&id)?;
        entry.delta.apply_to(&mut self.loads, -1.0);
        Some(entry.route)
    }

    /// Empties the flow table and the loads, returning the routes in flow ID order.
    fn take_routes(&mut self) -> Vec<Route> {
        self.loads.fill(0.0);
        let mut routes = self
            .flows
            .drain()
            .map(|(_, entry)| entry.route)
            .collect::<Vec<_>>();
        routes.sort_by_key(|r| r.flow.id);
        routes
    }

    /// Reroutes every flow over its stored path. Flows that no longer route are dropped.
    fn replay(&mut self) {
        for Route { flow, path } in self.take_routes() {
            if let Err(e) = self.route(flow, path) {
                warn!("Dropping flow {} during replay: {e}", flow.id);
            }
        }
    }

    fn demands(&self, class: Option<FlowClass>) -> Matrix {
        let mut demands = Matrix::zeros(self.loads.dim());
        for entry in self.flows.values() {
            let flow = &entry.route.flow;
            if class.map_or(true, |c| c == flow.class) {
                if let Some(d) = demands.get_mut([flow.src.inner(), flow.dst.inner()]) {
                    *d += flow.demand;
                }
            }
        }
        demands
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown flow {0}")]
    UnknownFlow(FlowId),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Distribute(#[from] DistributeError),

    #[error(transparent)]
    Correction(#[from] CorrectionError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Balance(#[from] BalanceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::balance::{Ecmp, SplitRatios};
    use crate::congestion::MaxUtilization;
    use crate::constants::EPSILON;
    use crate::network::{Network, ShortestPathDag};
    use crate::segment::Segment;
    use crate::testing;

    fn id(i: usize) -> NodeId {
        NodeId::new(i)
    }

    fn ids(v: &[usize]) -> Vec<NodeId> {
        v.iter().copied().map(NodeId::new).collect()
    }

    fn simulator(network: Network) -> Simulator<Network, Ecmp> {
        Simulator::new(network, Ecmp, SimOpts::default())
    }

    fn eight_node() -> anyhow::Result<Network> {
        let (nodes, links) = testing::eight_node_config();
        let mut network = Network::new(&nodes, &links)?;
        network.apply_weights(testing::unit_weights(8))?;
        Ok(network)
    }

    fn detour() -> LabelPath {
        LabelPath::new(
            id(0),
            id(2),
            1.0,
            vec![Segment::node(id(1)), Segment::adjacency(id(1), id(2))],
        )
    }

    fn assert_close(a: &Matrix, b: &Matrix) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= EPSILON, "{a} != {b}");
        }
    }

    #[test]
    fn explicit_hop_uses_half_the_link() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(0), id(2), 5.0, FlowClass::User);
        let path = LabelPath::new(id(0), id(2), 1.0, vec![Segment::adjacency(id(0), id(2))]);
        sim.add_flow(flow, path)?;
        assert_eq!(sim.usage(id(0), id(2))?, 0.5);
        assert_eq!(sim.mlu(), 0.5);
        assert_eq!(sim.usage(id(0), id(1))?, 0.0);
        assert_eq!(sim.usage(id(1), id(2))?, 0.0);
        assert_eq!(sim.congestion_value(&MaxUtilization), 0.5);
        assert!(matches!(
            sim.usage(id(0), id(0)),
            Err(Error::Topology(TopologyError::UnknownLink { .. }))
        ));
        Ok(())
    }

    #[test]
    fn ti_lfa_repairs_failed_adjacency() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        sim.add_flow(flow, detour())?;
        assert_eq!(sim.usage(id(1), id(2))?, 0.4);

        sim.set_link_up(id(1), id(2), false)?;
        let report = sim.fail_link(id(1), id(2), &RecoveryPolicy::TiLfa)?;
        assert_eq!(report.repaired, vec![flow.id]);
        assert!(report.unrouted.is_empty());

        let loads = sim.loads(None);
        assert_eq!(loads[[0, 1]], 4.0);
        assert_eq!(loads[[1, 0]], 4.0);
        assert_eq!(loads[[0, 2]], 4.0);
        assert_eq!(loads[[1, 2]], 0.0);
        let route = sim.route(flow.id).ok_or_else(|| anyhow::anyhow!("flow lost"))?;
        assert_eq!(route.flow.class, FlowClass::TiLfa);
        assert_eq!(
            route.path.segments(),
            &[Segment::node(id(1)), Segment::node(id(2))]
        );
        Ok(())
    }

    #[test]
    fn edge_to_edge_reroutes_from_source() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        sim.add_flow(flow, detour())?;
        sim.set_link_up(id(1), id(2), false)?;
        let policy = || Some(RecoveryPolicy::EdgeToEdge);
        sim.fail_link(id(1), id(2), &policy)?;
        let loads = sim.loads(None);
        assert_eq!(loads[[0, 2]], 4.0);
        assert_eq!(loads.sum(), 4.0);
        let route = sim.route(flow.id).ok_or_else(|| anyhow::anyhow!("flow lost"))?;
        assert_eq!(route.flow.class, FlowClass::E2e);
        Ok(())
    }

    #[test]
    fn failure_without_policy_unroutes_flow() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let broken = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        let healthy = sim.new_flow(id(1), id(0), 2.0, FlowClass::User);
        sim.add_flow(broken, detour())?;
        sim.add_flow_shortest(healthy)?;
        sim.set_link_up(id(1), id(2), false)?;
        let report = sim.fail_link(id(1), id(2), &RecoverySetting::default())?;
        assert_eq!(report.unrouted, vec![broken.id]);
        assert_eq!(sim.nr_flows(), 1);
        assert!(sim.route(broken.id).is_none());
        assert_eq!(sim.loads(None).sum(), 2.0);
        Ok(())
    }

    #[test]
    fn global_reoptimization_replans_demands() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        sim.add_flow(flow, detour())?;
        sim.set_link_up(id(1), id(2), false)?;
        let report = sim.fail_link(id(1), id(2), &RecoveryPolicy::GlobalReoptimization)?;
        assert_eq!(report.repaired.len(), 1);
        assert!(sim.route(flow.id).is_none());
        let route = sim
            .route(report.repaired[0])
            .ok_or_else(|| anyhow::anyhow!("flow lost"))?;
        assert_eq!(route.flow.class, FlowClass::Salp);
        assert_eq!(route.flow.demand, 4.0);
        assert_eq!(sim.loads(None)[[0, 2]], 4.0);
        assert_eq!(sim.demands(None)[[0, 2]], 4.0);
        Ok(())
    }

    #[test]
    fn policy_is_read_at_each_failure() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let setting = RecoverySetting::new(Some(RecoveryPolicy::TiLfa));
        let first = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        sim.add_flow(first, detour())?;
        sim.set_link_up(id(1), id(2), false)?;
        sim.fail_link(id(1), id(2), &setting)?;

        // 2 -> 0 -> 1 with the first hop pinned
        let second = sim.new_flow(id(2), id(1), 1.0, FlowClass::User);
        let pinned = LabelPath::new(
            id(2),
            id(1),
            1.0,
            vec![Segment::adjacency(id(2), id(0)), Segment::node(id(1))],
        );
        sim.add_flow(second, pinned)?;

        setting.set(Some(RecoveryPolicy::EdgeToEdge));
        sim.set_link_up(id(0), id(2), false)?;
        let report = sim.fail_link(id(0), id(2), &setting)?;
        // Node 2 is cut off: the first flow has nothing left to repair but cannot route either
        assert_eq!(report.unrouted, vec![first.id, second.id]);
        assert!(report.repaired.is_empty());
        assert_eq!(sim.nr_flows(), 0);
        Ok(())
    }

    #[test]
    fn add_then_remove_restores_loads() -> anyhow::Result<()> {
        let sim = simulator(eight_node()?);
        for (src, dst) in [(0, 3), (1, 2), (2, 0)] {
            let flow = sim.new_flow(id(src), id(dst), 3.0, FlowClass::User);
            sim.add_flow_shortest(flow)?;
        }
        let before = sim.loads(None);
        let flow = sim.new_flow(id(1), id(3), 7.0, FlowClass::User);
        sim.add_flow_along(flow, &ids(&[1, 4, 6, 4, 7, 5, 3]))?;
        assert!(sim.mlu() > 0.0);
        let removed = sim.remove_flow(flow.id)?;
        assert_eq!(removed, flow);
        assert_close(&sim.loads(None), &before);
        assert!(matches!(
            sim.remove_flow(flow.id),
            Err(Error::UnknownFlow(missing)) if missing == flow.id
        ));
        Ok(())
    }

    #[test]
    fn readding_a_flow_replaces_its_route() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(0), id(2), 4.0, FlowClass::User);
        sim.add_flow(flow, detour())?;
        sim.add_flow_shortest(flow)?;
        assert_eq!(sim.nr_flows(), 1);
        let loads = sim.loads(None);
        assert_eq!(loads[[0, 2]], 4.0);
        assert_eq!(loads[[0, 1]], 0.0);
        assert_eq!(loads[[1, 2]], 0.0);
        Ok(())
    }

    #[test]
    fn flows_are_tracked_per_class() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let user = sim.new_flow(id(0), id(1), 2.0, FlowClass::User);
        sim.add_flow_shortest(user)?;
        let mut config = SrConfig::new();
        config.add_label_path(id(0), id(2), LabelPath::shortest(id(0), id(2), 0.5))?;
        config.add_label_path(id(0), id(2), detour().with_fraction(0.5))?;
        let mut demands = Matrix::zeros((3, 3));
        demands[[0, 2]] = 6.0;
        let routed = sim.apply(&config, &demands)?;
        assert_eq!(routed.len(), 2);

        let salp = sim.loads(Some(FlowClass::Salp));
        assert_eq!(salp[[0, 2]], 3.0);
        assert_eq!(salp[[0, 1]], 3.0);
        assert_eq!(salp[[1, 2]], 3.0);
        assert_eq!(sim.loads(None)[[0, 1]], 5.0);
        assert_eq!(sim.demands(Some(FlowClass::Salp))[[0, 2]], 6.0);
        assert_eq!(sim.demands(Some(FlowClass::User))[[0, 1]], 2.0);

        assert_eq!(sim.clear_class(FlowClass::Salp), 2);
        assert_close(&sim.loads(None), &sim.loads(Some(FlowClass::User)));
        assert_eq!(sim.nr_flows(), 1);
        sim.clear();
        assert_eq!(sim.nr_flows(), 0);
        assert_eq!(sim.loads(None).sum(), 0.0);
        Ok(())
    }

    #[test]
    fn apply_checks_demand_dimensions() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let res = sim.apply(&SrConfig::new(), &Matrix::zeros((4, 4)));
        assert!(matches!(
            res,
            Err(Error::Topology(TopologyError::DimensionMismatch { .. }))
        ));
        Ok(())
    }

    #[test]
    fn apply_skips_paths_with_unknown_endpoints() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let mut config = SrConfig::new();
        config.add_label_path(id(0), id(2), LabelPath::shortest(id(0), id(2), 1.0))?;
        config.add_label_path(id(5), id(0), LabelPath::shortest(id(5), id(0), 1.0))?;
        let mut demands = Matrix::zeros((3, 3));
        demands[[0, 2]] = 4.0;
        let routed = sim.apply(&config, &demands)?;
        assert_eq!(routed.len(), 1);
        assert_eq!(sim.nr_flows(), 1);
        assert_eq!(sim.loads(None)[[0, 2]], 4.0);
        Ok(())
    }

    #[test]
    fn flows_with_unknown_endpoints_are_rejected() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        let flow = sim.new_flow(id(7), id(2), 1.0, FlowClass::User);
        let res = sim.add_flow(flow, LabelPath::shortest(id(0), id(2), 1.0));
        assert!(matches!(
            res,
            Err(Error::Topology(TopologyError::UnknownNode(node))) if node == id(7)
        ));
        assert_eq!(sim.nr_flows(), 0);
        assert_eq!(sim.demands(None).sum(), 0.0);
        assert_eq!(sim.loads(None).sum(), 0.0);
        Ok(())
    }

    #[test]
    fn reoptimization_reports_unplanned_flows() -> anyhow::Result<()> {
        let sim = simulator(testing::square()?);
        let cut = sim.new_flow(id(0), id(3), 2.0, FlowClass::User);
        sim.add_flow_shortest(cut)?;
        let kept = sim.new_flow(id(0), id(1), 1.0, FlowClass::User);
        sim.add_flow_shortest(kept)?;

        sim.set_link_up(id(1), id(3), false)?;
        sim.set_link_up(id(2), id(3), false)?;
        let report = sim.fail_link(id(1), id(3), &RecoveryPolicy::GlobalReoptimization)?;
        assert_eq!(report.unrouted, vec![cut.id]);
        assert_eq!(report.repaired.len(), 1);
        assert_eq!(sim.nr_flows(), 1);
        assert_eq!(sim.demands(Some(FlowClass::Salp))[[0, 1]], 1.0);
        assert_eq!(sim.demands(None)[[0, 3]], 0.0);
        Ok(())
    }

    #[test]
    fn simulator_is_shared_between_threads() -> anyhow::Result<()> {
        fn assert_send_sync<S: Send + Sync>() {}
        assert_send_sync::<Simulator<Network, Ecmp>>();

        let sim = simulator(eight_node()?);
        let results = std::thread::scope(|s| {
            let handles = (0..4)
                .map(|src| {
                    let sim = &sim;
                    s.spawn(move || -> Result<(), Error> {
                        for i in 0..20 {
                            let dst = id((src + 2) % 4);
                            let flow = sim.new_flow(id(src), dst, 1.0, FlowClass::User);
                            sim.add_flow_shortest(flow)?;
                            if i % 2 == 1 {
                                sim.remove_flow(flow.id)?;
                            }
                            assert!(sim.mlu() >= 0.0);
                        }
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();
            handles.into_iter().map(|h| h.join()).collect::<Vec<_>>()
        });
        for res in results {
            res.map_err(|_| anyhow::anyhow!("worker panicked"))??;
        }
        assert_eq!(sim.nr_flows(), 40);

        let expected = simulator(eight_node()?);
        for src in 0..4 {
            let flow = expected.new_flow(id(src), id((src + 2) % 4), 10.0, FlowClass::User);
            expected.add_flow_shortest(flow)?;
        }
        assert_close(&sim.loads(None), &expected.loads(None));
        assert_close(&sim.demands(None), &expected.demands(None));
        Ok(())
    }

    #[derive(Debug, Default)]
    struct CountingEcmp {
        calls: Rc<Cell<usize>>,
    }

    impl LoadBalancer for CountingEcmp {
        fn split(&self, dag: &ShortestPathDag) -> SplitRatios {
            self.calls.set(self.calls.get() + 1);
            Ecmp.split(dag)
        }
    }

    #[test]
    fn split_ratios_are_reused_until_routing_changes() -> anyhow::Result<()> {
        let balancer = CountingEcmp::default();
        let calls = Rc::clone(&balancer.calls);
        let sim = Simulator::new(eight_node()?, balancer, SimOpts::default());
        for src in 0..3 {
            let flow = sim.new_flow(id(src), id(3), 1.0, FlowClass::User);
            sim.add_flow_shortest(flow)?;
        }
        assert_eq!(calls.get(), 1);

        sim.set_weights(testing::unit_weights(8))?;
        assert_eq!(calls.get(), 2);
        sim.apply_pvalues(&PValues::new(vec![1.0; 8])?)?;
        assert_eq!(calls.get(), 3);
        Ok(())
    }

    #[test]
    fn new_weights_move_node_segments() -> anyhow::Result<()> {
        let sim = simulator(testing::square()?);
        let flow = sim.new_flow(id(0), id(3), 2.0, FlowClass::User);
        sim.add_flow_shortest(flow)?;
        assert_eq!(sim.loads(None)[[0, 1]], 1.0);
        assert_eq!(sim.loads(None)[[0, 2]], 1.0);

        let mut weights = testing::unit_weights(4);
        weights[[0, 2]] = 5.0;
        sim.set_weights(weights)?;
        let loads = sim.loads(None);
        assert_eq!(loads[[0, 1]], 2.0);
        assert_eq!(loads[[1, 3]], 2.0);
        assert_eq!(loads[[0, 2]], 0.0);
        assert_eq!(sim.nr_flows(), 1);
        Ok(())
    }

    #[test]
    fn pvalues_must_cover_every_node() -> anyhow::Result<()> {
        let sim = simulator(testing::square()?);
        let flow = sim.new_flow(id(0), id(3), 2.0, FlowClass::User);
        sim.add_flow_shortest(flow)?;
        let res = sim.apply_pvalues(&PValues::new(vec![1.0; 3])?);
        assert!(matches!(
            res,
            Err(Error::Topology(TopologyError::DimensionMismatch { .. }))
        ));
        sim.apply_pvalues(&PValues::new(vec![2.0; 4])?)?;
        // ECMP ignores p-values
        assert_eq!(sim.loads(None)[[0, 1]], 1.0);
        Ok(())
    }

    #[test]
    fn node_paths_are_compressed_on_add() -> anyhow::Result<()> {
        let nodes = ids(&[0, 4, 6, 4, 7, 5, 3]);
        let sim = simulator(eight_node()?);
        let flow = sim.new_flow(id(0), id(3), 1.0, FlowClass::User);
        sim.add_flow_along(flow, &nodes)?;
        let route = sim.route(flow.id).ok_or_else(|| anyhow::anyhow!("flow lost"))?;
        assert_eq!(route.path.len(), 3);
        assert!(matches!(
            sim.add_flow_along(flow, &ids(&[0, 4, 5])),
            Err(Error::Translate(_))
        ));
        assert!(matches!(
            sim.add_flow_along(flow, &ids(&[0, 4, 6])),
            Err(Error::Config(_))
        ));

        let opts = SimOpts::builder().max_labels(2).build();
        let bounded = Simulator::new(eight_node()?, Ecmp, opts);
        assert_eq!(bounded.translate(&nodes)?, LabelPath::shortest(id(0), id(3), 1.0));
        Ok(())
    }

    #[test]
    fn topology_is_shared() -> anyhow::Result<()> {
        let sim = simulator(testing::triangle()?);
        assert_eq!(sim.with_topology(|t| t.dimension()), 3);
        assert!(matches!(
            sim.fail_link(id(0), id(0), &RecoveryPolicy::TiLfa),
            Err(Error::Topology(TopologyError::UnknownLink { .. }))
        ));
        Ok(())
    }
}
