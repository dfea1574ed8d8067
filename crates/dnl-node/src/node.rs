//! Node models: per-timestep transition-flow computation and FIFO flow
//! movement between links.
//!
//! # The shared machinery
//!
//! Every non-centroid node runs the same four-step update each timestep:
//!
//! 1. read sending/receiving flows of the incident links,
//! 2. disaggregate each upstream link's sending flow by path and derive
//!    turning proportions,
//! 3. compute transition flows per (in-link, out-link) using the variant's
//!    rule,
//! 4. move the flow, splitting it back over paths so FIFO is preserved
//!    across multi-link paths.
//!
//! Steps 1, 2 and 4 are identical for all variants; only step 3 differs.
//!
//! # Scratch flow maps
//!
//! `transition_flows` takes its sending/receiving maps **by value**.  Merge
//! nodes draw down sending flows while iterating and signalised nodes draw
//! down receiving flows phase by phase; handing each node its own scratch
//! copies keeps that mutation invisible to the loop that computed S and R.

use dnl_core::{LinkId, NodeId, PathSet};
use dnl_link::{ENTRY_TIME_TOL, Link, PathFlows};
use rustc_hash::FxHashMap;

use crate::error::{NodeError, NodeResult};
use crate::signal::{Barrier, Phase, SignalController, SignalParams};

/// Per-link scalar flow values (sending or receiving).
pub type FlowMap = FxHashMap<LinkId, f64>;
/// Turning fractions per (in-link, out-link).
pub type Proportions = FxHashMap<LinkId, FxHashMap<LinkId, f64>>;
/// Vehicles to move per (in-link, out-link) during one timestep.
pub type TransitionFlows = FxHashMap<LinkId, FxHashMap<LinkId, f64>>;
/// Per upstream link: its sending flow split by path.
pub type DisaggregateFlows = FxHashMap<LinkId, PathFlows>;

// ── Variant state ─────────────────────────────────────────────────────────────

/// Ramp-meter state: the commanded rate and the realised flow history.
#[derive(Debug, Default)]
pub struct RampMeter {
    /// Commanded vehicles per timestep.  Unset means pass-through: until the
    /// first `set_meter_rate` the meter imposes no limit of its own.
    pub vpts: Option<f64>,
    /// Metered flow per loaded timestep, for the ramp travel-time diagnostic.
    pub flows: Vec<f64>,
}

/// The closed set of node variants.
pub enum NodeKind {
    /// Trip source; centroid, skipped by the node loop.
    Origin,
    /// Trip sink; centroid, drained by `terminate_trips`.
    Destination,
    /// One-in one-out: `min(S, R)`.
    Series,
    /// Series with a commanded rate cap.
    RampMeter(RampMeter),
    /// One-in many-out, proportional with the tightest outflow binding all.
    Diverge,
    /// Many-in one-out, iterative priority-weighted allocation.
    Merge { priorities: FxHashMap<LinkId, f64> },
    /// Dual-ring signalised intersection.
    Signal(SignalController),
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Origin => "origin",
            NodeKind::Destination => "destination",
            NodeKind::Series => "series",
            NodeKind::RampMeter(_) => "ramp meter",
            NodeKind::Diverge => "diverge",
            NodeKind::Merge { .. } => "merge",
            NodeKind::Signal(_) => "signal",
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────────────────

/// A network node: incident link lists plus the variant's transition rule.
pub struct Node {
    pub id:         NodeId,
    pub upstream:   Vec<LinkId>,
    pub downstream: Vec<LinkId>,
    pub kind:       NodeKind,
}

impl Node {
    // ── Constructors (topology validation is fatal) ───────────────────────

    pub fn origin(id: NodeId, downstream: Vec<LinkId>) -> Node {
        Node { id, upstream: Vec::new(), downstream, kind: NodeKind::Origin }
    }

    pub fn destination(id: NodeId, upstream: Vec<LinkId>) -> Node {
        Node { id, upstream, downstream: Vec::new(), kind: NodeKind::Destination }
    }

    pub fn series(id: NodeId, upstream: Vec<LinkId>, downstream: Vec<LinkId>) -> NodeResult<Node> {
        Self::expect(id, "series", &upstream, &downstream, 1..=1, 1..=1)?;
        Ok(Node { id, upstream, downstream, kind: NodeKind::Series })
    }

    pub fn ramp_meter(
        id: NodeId,
        upstream: Vec<LinkId>,
        downstream: Vec<LinkId>,
    ) -> NodeResult<Node> {
        Self::expect(id, "ramp meter", &upstream, &downstream, 1..=1, 1..=1)?;
        Ok(Node { id, upstream, downstream, kind: NodeKind::RampMeter(RampMeter::default()) })
    }

    pub fn diverge(id: NodeId, upstream: Vec<LinkId>, downstream: Vec<LinkId>) -> NodeResult<Node> {
        Self::expect(id, "diverge", &upstream, &downstream, 1..=1, 1..=usize::MAX)?;
        Ok(Node { id, upstream, downstream, kind: NodeKind::Diverge })
    }

    pub fn merge(
        id: NodeId,
        upstream: Vec<LinkId>,
        downstream: Vec<LinkId>,
        priorities: FxHashMap<LinkId, f64>,
    ) -> NodeResult<Node> {
        Self::expect(id, "merge", &upstream, &downstream, 1..=usize::MAX, 1..=1)?;
        for &ij in &upstream {
            match priorities.get(&ij) {
                None => return Err(NodeError::MissingPriority { node: id, link: ij }),
                Some(&p) if p <= 0.0 => {
                    return Err(NodeError::NonPositivePriority { node: id, link: ij });
                }
                Some(_) => {}
            }
        }
        Ok(Node { id, upstream, downstream, kind: NodeKind::Merge { priorities } })
    }

    pub fn signal(
        id: NodeId,
        upstream: Vec<LinkId>,
        downstream: Vec<LinkId>,
        barriers: [Barrier; 2],
        permissive: Vec<Phase>,
    ) -> NodeResult<Node> {
        let controller = SignalController::new(barriers, permissive);
        if let Some(link) = controller.conflicting_out_link() {
            return Err(NodeError::ConflictingPhases { node: id, link });
        }
        Ok(Node { id, upstream, downstream, kind: NodeKind::Signal(controller) })
    }

    fn expect(
        id: NodeId,
        kind: &'static str,
        upstream: &[LinkId],
        downstream: &[LinkId],
        up: std::ops::RangeInclusive<usize>,
        down: std::ops::RangeInclusive<usize>,
    ) -> NodeResult<()> {
        if up.contains(&upstream.len()) && down.contains(&downstream.len()) {
            Ok(())
        } else {
            Err(NodeError::Topology {
                node:     id,
                kind,
                got_up:   upstream.len(),
                got_down: downstream.len(),
            })
        }
    }

    // ── Classification ────────────────────────────────────────────────────

    #[inline]
    pub fn is_centroid(&self) -> bool {
        matches!(self.kind, NodeKind::Origin | NodeKind::Destination)
    }

    #[inline]
    pub fn is_destination(&self) -> bool {
        matches!(self.kind, NodeKind::Destination)
    }

    // ── Parameter updates ─────────────────────────────────────────────────

    /// Command a ramp-meter rate in veh/timestep.  No-op for other kinds.
    pub fn set_meter_rate(&mut self, rate: f64) {
        if let NodeKind::RampMeter(meter) = &mut self.kind {
            meter.vpts = Some(rate);
        }
    }

    /// Apply a signal timing update.  No-op for other kinds.
    pub fn set_signal_params(&mut self, params: &SignalParams) {
        if let NodeKind::Signal(controller) = &mut self.kind {
            controller.set_params(params);
        }
    }

    /// Realised meter flow history, if this node is a ramp meter.
    pub fn meter_flows(&self) -> Option<&[f64]> {
        match &self.kind {
            NodeKind::RampMeter(meter) => Some(&meter.flows),
            _ => None,
        }
    }

    /// Clear per-episode state (meter history, signal activation).
    pub fn reset_state(&mut self) {
        match &mut self.kind {
            NodeKind::RampMeter(meter) => meter.flows.clear(),
            NodeKind::Signal(controller) => controller.reset(),
            _ => {}
        }
    }

    // ── Step 2: disaggregation and proportions ────────────────────────────

    /// Split each upstream link's sending flow by path.
    ///
    /// The flow composition is sampled over the entry interval of the
    /// vehicles that make up the sending flow, then rescaled so the per-path
    /// parts sum to exactly S — discretisation means the sampled window
    /// rarely aligns with the sending flow's vehicle range.
    pub fn disaggregate_sending_flows(
        &self,
        t:       i64,
        sending: &FlowMap,
        links:   &[Link],
    ) -> DisaggregateFlows {
        let mut result = DisaggregateFlows::default();
        for &ij in &self.upstream {
            let s = sending.get(&ij).copied().unwrap_or(0.0);
            let link = &links[ij.index()];

            let mut composition = if s > 0.0 {
                let already_out = link.downstream_count(t);
                let first = link.entry_time(already_out, false, ENTRY_TIME_TOL);
                let last = link.entry_time(already_out + s, true, ENTRY_TIME_TOL);
                link.flow_composition(first, last)
            } else {
                PathFlows::default()
            };

            let total: f64 = composition.values().sum();
            if total > 0.0 {
                let scale = s / total;
                for v in composition.values_mut() {
                    *v *= scale;
                }
            }
            result.insert(ij, composition);
        }
        result
    }

    /// Turning proportions per (in-link, out-link) from the disaggregated
    /// sending flows.  A silent in-link turns uniformly.
    pub fn proportions(&self, disagg: &DisaggregateFlows, paths: &PathSet) -> Proportions {
        let mut proportions = Proportions::default();
        for &ij in &self.upstream {
            let mut row: FxHashMap<LinkId, f64> = FxHashMap::default();
            if let Some(path_flows) = disagg.get(&ij) {
                for (&path, &v) in path_flows {
                    for &out in &self.downstream {
                        if paths.contains(path, out) {
                            *row.entry(out).or_insert(0.0) += v;
                        }
                    }
                }
            }
            let total: f64 = row.values().sum();
            if total > 0.0 {
                for &out in &self.downstream {
                    let share = row.entry(out).or_insert(0.0);
                    *share /= total;
                }
            } else {
                for &out in &self.downstream {
                    row.insert(out, 1.0 / self.downstream.len() as f64);
                }
            }
            proportions.insert(ij, row);
        }
        proportions
    }

    // ── Step 3: transition flows ──────────────────────────────────────────

    /// Vehicles to move per (in-link, out-link) this timestep.
    ///
    /// `sending` and `receiving` are scratch copies owned by the call; merge
    /// and signal variants draw them down while allocating.
    pub fn transition_flows(
        &mut self,
        t:           i64,
        sending:     FlowMap,
        receiving:   FlowMap,
        proportions: &Proportions,
    ) -> TransitionFlows {
        match &mut self.kind {
            NodeKind::Origin | NodeKind::Destination => TransitionFlows::default(),

            NodeKind::Series => {
                let (up, down) = (self.upstream[0], self.downstream[0]);
                let flow = get(&sending, up).min(get(&receiving, down));
                single(up, down, flow)
            }

            NodeKind::RampMeter(meter) => {
                let (up, down) = (self.upstream[0], self.downstream[0]);
                let mut flow = get(&sending, up).min(get(&receiving, down));
                if let Some(vpts) = meter.vpts {
                    flow = flow.min(vpts);
                }
                meter.flows.push(flow);
                single(up, down, flow)
            }

            NodeKind::Diverge => {
                let up = self.upstream[0];
                let s = get(&sending, up);
                let turn = |out: LinkId| {
                    proportions
                        .get(&up)
                        .and_then(|row| row.get(&out))
                        .copied()
                        .unwrap_or(0.0)
                };

                // The most constrained out-link throttles the whole movement.
                let mut moving_fraction = 1.0_f64;
                for &out in &self.downstream {
                    let denom = s * turn(out);
                    if denom != 0.0 {
                        moving_fraction = moving_fraction.min(get(&receiving, out) / denom);
                    }
                }

                let mut flows = TransitionFlows::default();
                for &out in &self.downstream {
                    flows
                        .entry(up)
                        .or_default()
                        .insert(out, moving_fraction * turn(out) * s);
                }
                flows
            }

            NodeKind::Merge { priorities } => {
                let out = self.downstream[0];
                let mut sending = sending;
                let mut r_out = get(&receiving, out);

                let mut flows = TransitionFlows::default();
                for &ij in &self.upstream {
                    flows.entry(ij).or_default().insert(out, 0.0);
                }

                let mut active = self.upstream.clone();
                while !active.is_empty() && r_out > 0.0 {
                    let total: f64 = active.iter().map(|ij| priorities[ij]).sum();
                    let mut moved_this_round = 0.0;
                    let mut exhausted = Vec::new();
                    for &ij in &active {
                        let s = sending.entry(ij).or_insert(0.0);
                        let add = s.min(priorities[&ij] / total * r_out);
                        if let Some(cell) = flows.entry(ij).or_default().get_mut(&out) {
                            *cell += add;
                        }
                        moved_this_round += add;
                        *s -= add;
                        if *s == 0.0 {
                            exhausted.push(ij);
                        }
                    }
                    r_out -= moved_this_round;
                    active.retain(|ij| !exhausted.contains(ij));
                }
                flows
            }

            NodeKind::Signal(controller) => {
                let mut receiving = receiving;
                let mut flows = TransitionFlows::default();
                for &ij in &self.upstream {
                    let row = flows.entry(ij).or_default();
                    for &out in &self.downstream {
                        row.insert(out, 0.0);
                    }
                }

                for phase in controller.active_phases(t) {
                    let flow = get(&sending, phase.in_link).min(get(&receiving, phase.out_link));
                    flows
                        .entry(phase.in_link)
                        .or_default()
                        .insert(phase.out_link, flow);
                    *receiving.entry(phase.out_link).or_insert(0.0) -= flow;
                }

                // Permissive movements compete for whatever R the protected
                // phases left; on a shared (in, out) key the allocation is
                // additive but never exceeds the in-link's sending flow.
                for &phase in controller.permissive_phases() {
                    let cell = flows
                        .entry(phase.in_link)
                        .or_default()
                        .entry(phase.out_link)
                        .or_insert(0.0);
                    let headroom = (get(&sending, phase.in_link) - *cell).max(0.0);
                    let flow = headroom.min(get(&receiving, phase.out_link)).max(0.0);
                    *cell += flow;
                    *receiving.entry(phase.out_link).or_insert(0.0) -= flow;
                }
                flows
            }
        }
    }

    // ── Step 4: flow movement ─────────────────────────────────────────────

    /// Move the transition flows between links, path by path.
    ///
    /// Each path's share of an (in, out) movement is its share of the
    /// disaggregated sending flow headed for that out-link:
    /// `moved = disagg[in][path] · transition[in][out] / (S[in] · p[in][out])`.
    /// Every upstream link gets exactly one `flow_out` and every downstream
    /// link exactly one `flow_in`, keeping the snapshot arrays aligned.
    pub fn move_flow(
        &self,
        transition:  &TransitionFlows,
        sending:     &FlowMap,
        proportions: &Proportions,
        disagg:      &DisaggregateFlows,
        links:       &mut [Link],
        paths:       &PathSet,
    ) {
        let mut inflow: FxHashMap<LinkId, PathFlows> = self
            .downstream
            .iter()
            .map(|&out| (out, PathFlows::default()))
            .collect();

        for &ij in &self.upstream {
            let s = sending.get(&ij).copied().unwrap_or(0.0);
            let mut outflow = PathFlows::default();
            if let Some(path_flows) = disagg.get(&ij) {
                for (&path, &on_path) in path_flows {
                    for &out in &self.downstream {
                        if !paths.contains(path, out) {
                            continue;
                        }
                        let p = proportions
                            .get(&ij)
                            .and_then(|row| row.get(&out))
                            .copied()
                            .unwrap_or(0.0);
                        if s * p <= 0.0 {
                            continue;
                        }
                        let t_flow = transition
                            .get(&ij)
                            .and_then(|row| row.get(&out))
                            .copied()
                            .unwrap_or(0.0);
                        let moved = on_path * t_flow / (s * p);
                        *outflow.entry(path).or_insert(0.0) += moved;
                        if let Some(m) = inflow.get_mut(&out) {
                            *m.entry(path).or_insert(0.0) += moved;
                        }
                    }
                }
            }
            links[ij.index()].flow_out(&outflow);
        }

        for &out in &self.downstream {
            links[out.index()].flow_in(&inflow[&out]);
        }
    }

    // ── Self-contained update ─────────────────────────────────────────────

    /// Run the full four-step update against the links directly.
    ///
    /// The network loop performs these steps itself so it can share one
    /// S/R computation across all nodes; this entry point exists for tests
    /// and for driving a node in isolation.
    pub fn update_node(&mut self, t: i64, links: &mut [Link], paths: &PathSet) {
        let sending: FlowMap = self
            .upstream
            .iter()
            .map(|&ij| (ij, links[ij.index()].sending_flow(t)))
            .collect();
        let receiving: FlowMap = self
            .downstream
            .iter()
            .map(|&ij| (ij, links[ij.index()].receiving_flow(t)))
            .collect();

        let disagg = self.disaggregate_sending_flows(t, &sending, links);
        let proportions = self.proportions(&disagg, paths);
        let transition = self.transition_flows(t, sending.clone(), receiving, &proportions);
        self.move_flow(&transition, &sending, &proportions, &disagg, links, paths);
    }
}

// ── Small helpers ─────────────────────────────────────────────────────────────

#[inline]
fn get(map: &FlowMap, key: LinkId) -> f64 {
    map.get(&key).copied().unwrap_or(0.0)
}

fn single(up: LinkId, down: LinkId, flow: f64) -> TransitionFlows {
    let mut flows = TransitionFlows::default();
    flows.entry(up).or_default().insert(down, flow);
    flows
}
