//! The `Network` container and the dynamic network loading loop.
//!
//! # Per-timestep ordering
//!
//! Within one timestep the loop runs four phases, always in this order:
//!
//! 1. **Link updates** — every link computes `(S, R)`; CTM links also
//!    propagate flow between cells.
//! 2. **Node updates** — every non-centroid node, in ascending index order,
//!    derives turning proportions from the disaggregated sending flows,
//!    computes transition flows against per-node scratch copies of S and R,
//!    and moves the flow.
//! 3. **Trip loading** — demand departing this timestep enters the first
//!    link of its path (origin connectors accept it unconditionally).
//! 4. **Trip termination** — destination nodes drain the sending flow of
//!    each entering link.
//!
//! Count snapshots written during phases 2–4 land at index `t + 1`, while
//! phase-1 reads index at most `t`, so the shared arrays never race even
//! within a single pass.

use std::ops::Range;

use dnl_core::{LinkId, NodeId, PathSet};
use dnl_link::{Link, PathFlows};
use dnl_node::{FlowMap, Node, SignalParams};
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{NetError, NetResult};
use crate::od::OdPair;

/// Tolerance when matching downstream to upstream counts for travel times.
pub const TRAVEL_TIME_TOL: f64 = 1e-5;

/// Extra travel-time table headroom past the horizon, so chained path times
/// near the end of an episode stay in range.
const TRAVEL_TIME_PAD: usize = 900;

// ── Network ───────────────────────────────────────────────────────────────────

/// Links, nodes, ODs, path flows, and the scratch S/R maps of the DNL loop.
pub struct Network {
    /// Timestep length in seconds.
    pub timestep:     f64,
    /// Number of timesteps in one episode.
    pub time_horizon: i64,

    pub links: Vec<Link>,
    pub nodes: Vec<Node>,

    /// Links leaving each node, rebuilt by [`finalize_links`](Self::finalize_links).
    pub forward_star: Vec<Vec<LinkId>>,
    /// Links entering each node.
    pub reverse_star: Vec<Vec<LinkId>>,

    pub ods:   Vec<OdPair>,
    pub paths: PathSet,

    /// Departing flow per path per timestep, indexed by `PathId`.
    pub path_flows: Vec<Vec<f64>>,
    /// Chained travel time per path per queried departure time.
    pub path_travel_times: Vec<FxHashMap<i64, i64>>,

    pub total_demand: f64,
    /// Shortest-path travel time accumulated by the last all-or-nothing pass.
    pub sptt: f64,

    pub(crate) sending:   FxHashMap<LinkId, f64>,
    pub(crate) receiving: FxHashMap<LinkId, f64>,
}

impl Network {
    pub fn new(timestep: f64, time_horizon: i64) -> Network {
        Network {
            timestep,
            time_horizon,
            links: Vec::new(),
            nodes: Vec::new(),
            forward_star: Vec::new(),
            reverse_star: Vec::new(),
            ods: Vec::new(),
            paths: PathSet::new(),
            path_flows: Vec::new(),
            path_travel_times: Vec::new(),
            total_demand: 0.0,
            sptt: 0.0,
            sending: FxHashMap::default(),
            receiving: FxHashMap::default(),
        }
    }

    // ── Assembly ──────────────────────────────────────────────────────────

    /// Append a link, assigning it the next dense `LinkId`.
    pub fn add_link(&mut self, mut link: Link) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        link.id = id;
        self.links.push(link);
        id
    }

    /// Append a node, assigning it the next dense `NodeId`.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        node.id = id;
        self.nodes.push(node);
        id
    }

    /// Register an OD pair and add its demand to the network total.
    pub fn add_od(&mut self, od: OdPair) {
        self.total_demand += od.total_demand();
        self.ods.push(od);
    }

    /// Build the forward/reverse stars and size the travel-time tables.
    pub fn finalize_links(&mut self) {
        self.forward_star = vec![Vec::new(); self.nodes.len()];
        self.reverse_star = vec![Vec::new(); self.nodes.len()];
        for link in &self.links {
            self.forward_star[link.tail.index()].push(link.id);
            self.reverse_star[link.head.index()].push(link.id);
        }
        let len = self.time_horizon as usize + TRAVEL_TIME_PAD;
        for link in &mut self.links {
            link.init_travel_times(len);
        }
    }

    /// Basic input validation; all failures are fatal for the episode.
    pub fn validate(&self) -> NetResult<()> {
        let fail = |msg: String| Err(NetError::Validation(msg));
        if self.time_horizon <= 0 {
            return fail(format!("time horizon must be positive, got {}", self.time_horizon));
        }
        if self.timestep <= 0.0 {
            return fail(format!("timestep must be positive, got {}", self.timestep));
        }
        for link in &self.links {
            let in_range = |n: NodeId| n != NodeId::INVALID && n.index() < self.nodes.len();
            if !in_range(link.tail) || !in_range(link.head) {
                return fail(format!("link {} head/tail out of range", link.label));
            }
            if link.free_flow_speed <= 0.0 || link.backward_wave_speed <= 0.0 {
                return fail(format!("link {} has non-positive speeds", link.label));
            }
            if link.length <= 0.0 || link.jam_density < 0.0 || link.capacity < 0.0 {
                return fail(format!("link {} has negative or zero parameters", link.label));
            }
        }
        for od in &self.ods {
            let nodes = self.nodes.len();
            if od.origin.index() >= nodes || od.destination.index() >= nodes {
                return fail(format!("OD {} -> {} out of range", od.origin, od.destination));
            }
            if od.demand_rates.iter().any(|&d| d < 0.0) {
                return fail(format!("OD {} -> {} has negative demand", od.origin, od.destination));
            }
        }
        Ok(())
    }

    // ── Path enumeration and OD finalisation ──────────────────────────────

    /// All simple (link-disjoint) paths starting at `origin`, in breadth-first
    /// order.  The corridor is small enough for brute enumeration.
    pub fn enumerate_paths(&self, origin: NodeId) -> Vec<Vec<LinkId>> {
        let mut paths: Vec<Vec<LinkId>> = Vec::new();
        let mut active: Vec<Vec<LinkId>> = Vec::new();

        for &ij in &self.forward_star[origin.index()] {
            paths.push(vec![ij]);
            active.push(vec![ij]);
        }

        while !active.is_empty() {
            let mut next = Vec::new();
            for path in &active {
                let last = path[path.len() - 1];
                let head = self.links[last.index()].head;
                for &ij in &self.forward_star[head.index()] {
                    if !path.contains(&ij) {
                        let mut grown = path.clone();
                        grown.push(ij);
                        next.push(grown);
                    }
                }
            }
            paths.extend(next.iter().cloned());
            active = next;
        }
        paths
    }

    /// Enumerate paths per origin, attach each OD's paths, and seed path
    /// travel times at free flow.
    pub fn finalize_ods(&mut self) -> NetResult<()> {
        let mut per_origin: FxHashMap<NodeId, Vec<Vec<LinkId>>> = FxHashMap::default();
        for od in &self.ods {
            per_origin
                .entry(od.origin)
                .or_insert_with(|| self.enumerate_paths(od.origin));
        }

        for i in 0..self.ods.len() {
            let (origin, destination) = (self.ods[i].origin, self.ods[i].destination);
            if !self.nodes[origin.index()].is_centroid()
                || self.nodes[origin.index()].is_destination()
            {
                return Err(NetError::Validation(format!("{origin} is not an origin node")));
            }
            if !self.nodes[destination.index()].is_destination() {
                return Err(NetError::Validation(format!(
                    "{destination} is not a destination node"
                )));
            }
            let mut attached = Vec::new();
            for path in &per_origin[&origin] {
                let last = path[path.len() - 1];
                if self.links[last.index()].head == destination {
                    attached.push(self.paths.intern(path));
                }
            }
            if attached.is_empty() {
                return Err(NetError::NoPath { origin, destination, departure: 0 });
            }
            self.ods[i].paths = attached;
        }

        debug!(
            "finalized {} ODs over {} interned paths",
            self.ods.len(),
            self.paths.len()
        );
        self.calculate_path_travel_times(0..self.time_horizon);
        Ok(())
    }

    // ── Dynamic network loading ───────────────────────────────────────────

    /// Load the network over `range`.
    ///
    /// With `init_reset` the count arrays, CTM cells, meter histories,
    /// signal activations, and S/R scratch maps are cleared first, so
    /// repeated full loads (as in the DTA loop) start from identical state.
    pub fn load_network(&mut self, range: Range<i64>, init_reset: bool) {
        if init_reset {
            self.sending.clear();
            self.receiving.clear();
            for link in &mut self.links {
                link.reset_counts();
            }
            for node in &mut self.nodes {
                node.reset_state();
            }
        }
        debug!("loading [{}, {}) (reset: {init_reset})", range.start, range.end);

        for t in range {
            self.step_links(t);
            self.step_nodes(t);
            self.load_trips(t);
            self.terminate_trips(t);
        }
    }

    /// Phase 1: compute sending/receiving flows for every link.
    fn step_links(&mut self, t: i64) {
        let Network { links, sending, receiving, .. } = self;
        for link in links.iter_mut() {
            let (s, r) = link.link_update(t);
            sending.insert(link.id, s);
            receiving.insert(link.id, r);
        }
    }

    /// Phase 2: transition flows and flow movement for non-centroid nodes.
    fn step_nodes(&mut self, t: i64) {
        let Network { links, nodes, paths, sending, receiving, .. } = self;
        for node in nodes.iter_mut() {
            if node.is_centroid() {
                continue;
            }
            // Per-node scratch copies of S and R over the incident links.
            let s: FlowMap = node
                .upstream
                .iter()
                .map(|&ij| (ij, sending.get(&ij).copied().unwrap_or(0.0)))
                .collect();
            let r: FlowMap = node
                .downstream
                .iter()
                .map(|&ij| (ij, receiving.get(&ij).copied().unwrap_or(0.0)))
                .collect();

            let disagg = node.disaggregate_sending_flows(t, &s, links);
            let proportions = node.proportions(&disagg, paths);
            let transition = node.transition_flows(t, s.clone(), r, &proportions);
            node.move_flow(&transition, &s, &proportions, &disagg, links, paths);
        }
    }

    /// Phase 3: place departing flow on the first link of each path.
    ///
    /// Origin connectors accept the flow unconditionally; only links whose
    /// tail is a centroid are loaded.
    pub fn load_trips(&mut self, t: i64) {
        let mut inflows: Vec<PathFlows> = vec![PathFlows::default(); self.links.len()];
        for od in &self.ods {
            for &p in &od.paths {
                let flow = self
                    .path_flows
                    .get(p.index())
                    .and_then(|row| row.get(t as usize))
                    .copied()
                    .unwrap_or(0.0);
                if flow > 0.0 {
                    inflows[self.paths.first_link(p).index()].insert(p, flow);
                }
            }
        }
        for (i, flows) in inflows.into_iter().enumerate() {
            let tail = self.links[i].tail;
            if self.nodes[tail.index()].is_centroid() {
                self.links[i].flow_in(&flows);
            }
        }
    }

    /// Phase 4: drain flow reaching each destination node.
    pub fn terminate_trips(&mut self, t: i64) {
        let Network { links, nodes, sending, .. } = self;
        for node in nodes.iter() {
            if !node.is_destination() {
                continue;
            }
            let s: FlowMap = node
                .upstream
                .iter()
                .map(|&ij| (ij, sending.get(&ij).copied().unwrap_or(0.0)))
                .collect();
            let disagg = node.disaggregate_sending_flows(t, &s, links);
            for &ij in &node.upstream {
                let empty = PathFlows::default();
                links[ij.index()].flow_out(disagg.get(&ij).unwrap_or(&empty));
            }
        }
    }

    // ── Travel times ──────────────────────────────────────────────────────

    /// Refresh link then path travel times over `range`.
    pub fn calculate_travel_times(&mut self, range: Range<i64>) {
        self.calculate_link_travel_times(range.clone(), TRAVEL_TIME_TOL);
        self.calculate_path_travel_times(range);
    }

    /// Invert cumulative counts: the travel time at entry `tE` is the wait
    /// until the downstream count catches up with `upstreamCount(tE)`,
    /// never less than free flow and capped at the end of `range`.
    pub fn calculate_link_travel_times(&mut self, range: Range<i64>, tolerance: f64) {
        if range.is_empty() {
            return;
        }
        let last = range.end - 1;
        for link in &mut self.links {
            for entry in range.clone() {
                let n = link.upstream_count(entry);
                let mut exit = entry + link.free_flow_time;
                while exit < last && link.downstream_count(exit) < n - tolerance {
                    exit += 1;
                }
                if let Some(tt) = link.travel_time.get_mut(entry as usize) {
                    *tt = exit - entry;
                }
            }
        }
    }

    /// Chain link travel times along each path for every departure time in
    /// `range`, falling back to free-flow time past the table's end.
    pub fn calculate_path_travel_times(&mut self, range: Range<i64>) {
        if range.is_empty() {
            return;
        }
        let last = range.end - 1;
        if self.path_travel_times.len() < self.paths.len() {
            self.path_travel_times
                .resize_with(self.paths.len(), FxHashMap::default);
        }

        let steps: Vec<i64> = range.collect();
        let pids: Vec<_> = self.paths.ids().collect();
        for pid in pids {
            let mut totals = vec![0_i64; steps.len()];
            let mut arrivals = steps.clone();
            for &ij in self.paths.links(pid) {
                let link = &self.links[ij.index()];
                for (k, arrival) in arrivals.iter_mut().enumerate() {
                    let tt = usize::try_from(*arrival)
                        .ok()
                        .and_then(|i| link.travel_time.get(i).copied())
                        .unwrap_or(link.free_flow_time);
                    totals[k] += tt;
                    *arrival = (*arrival + tt).min(last - 1);
                }
            }
            let table = &mut self.path_travel_times[pid.index()];
            for (k, &t) in steps.iter().enumerate() {
                table.insert(t, totals[k]);
            }
        }
    }

    // ── Metrics ───────────────────────────────────────────────────────────

    /// Total system travel time: vehicle-timesteps spent on links over `range`.
    pub fn calculate_tstt(&self, range: Range<i64>) -> f64 {
        let mut tstt = 0.0;
        for link in &self.links {
            for t in range.clone() {
                tstt += link.vehicles_on_link(t);
            }
        }
        tstt
    }

    /// Total free-flow travel time of the flow departing during `range`.
    pub fn calculate_tfft(&self, range: Range<i64>) -> f64 {
        let mut tfft = 0.0;
        for pid in self.paths.ids() {
            let Some(flows) = self.path_flows.get(pid.index()) else {
                continue;
            };
            let fft: i64 = self
                .paths
                .links(pid)
                .iter()
                .map(|&ij| self.links[ij.index()].free_flow_time)
                .sum();
            for t in range.clone() {
                if let Some(&flow) = flows.get(t as usize) {
                    tfft += flow * fft as f64;
                }
            }
        }
        tfft
    }

    /// Total demand departing during `range` across all ODs.
    pub fn demand(&self, range: Range<i64>) -> f64 {
        self.ods
            .iter()
            .flat_map(|od| range.clone().filter_map(|t| od.demand_rates.get(t as usize)))
            .sum()
    }

    // ── Parameter pushes ──────────────────────────────────────────────────

    /// Command a ramp-meter rate (veh/timestep) at `node`.
    pub fn set_meter_rate(&mut self, node: NodeId, rate: f64) {
        self.nodes[node.index()].set_meter_rate(rate);
    }

    /// Push a signal timing update to `node`.
    pub fn set_signal_params(&mut self, node: NodeId, params: &SignalParams) {
        self.nodes[node.index()].set_signal_params(params);
    }

    // ── Ramp diagnostics ──────────────────────────────────────────────────

    /// Demand entering on OD `od` during `range`.
    pub fn ramp_demand(&self, od: usize, range: Range<i64>) -> f64 {
        range
            .filter_map(|t| self.ods[od].demand_rates.get(t as usize))
            .sum()
    }

    /// Total ramp travel time: pairs the OD's arrival profile against the
    /// meter's realised flow history to accumulate per-vehicle waits.
    pub fn ramp_travel_time(&self, od: usize, meter: NodeId, range: Range<i64>) -> f64 {
        let input = &self.ods[od].demand_rates;
        let Some(output) = self.nodes[meter.index()].meter_flows() else {
            return 0.0;
        };
        let (start, end) = (range.start as usize, range.end as usize);

        // Skip the output flow belonging to arrivals before the window.
        let flow_to_ignore: f64 = input[..start.min(input.len())].iter().sum();
        let mut out_flow = 0.0;
        let mut t = 0usize;
        while t < output.len() && out_flow + output[t] <= flow_to_ignore {
            out_flow += output[t];
            t += 1;
        }

        let mut rtt = 0.0;
        let mut served = 0.0;
        let mut cursor = start;
        while cursor < end && t < output.len() {
            while served < input[cursor] && t < output.len() {
                served += output[t];
                rtt += output[t] * (t - cursor) as f64;
                t += 1;
            }
            let arrived = cursor;
            cursor += 1;
            while cursor < end && input[cursor] == 0.0 {
                cursor += 1;
            }
            // Flow served past this arrival slot belongs to later arrivals;
            // refund the overshoot's wait at the next occupied slot.
            rtt -= (served - input[arrived]) * (cursor - arrived) as f64;
            served -= input[arrived];
        }
        rtt
    }
}
