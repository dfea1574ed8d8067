//! The `Link` type: cumulative per-path counts and the queries node models
//! run against them.
//!
//! # Data layout
//!
//! A link records two growing snapshot vectors, one per end:
//!
//! ```text
//! upstream[t]   : PathId → cumulative vehicles that ENTERED by timestep t
//! downstream[t] : PathId → cumulative vehicles that EXITED  by timestep t
//! ```
//!
//! Every [`flow_in`](Link::flow_in) / [`flow_out`](Link::flow_out) appends a
//! new snapshot equal to the previous one plus the incoming per-path flows.
//! The DNL loop appends exactly one snapshot per end per timestep, so index
//! `t` holds the cumulative count at the *start* of timestep `t`.  Reads
//! during timestep `t` only ever touch indices `≤ t`, which is what makes the
//! loop's read-then-write ordering safe on shared arrays.
//!
//! Aggregate counts (`upstream_count`, `downstream_count`) are per-path sums;
//! the per-path detail is what lets node models preserve FIFO across
//! multi-link paths.

use dnl_core::units::{mph_to_fps, timesteps_to_traverse, vph_to_vpts, vpm_to_vpf};
use dnl_core::{LinkId, NodeId, PathId};
use rustc_hash::FxHashMap;

use crate::model::{LinkKind, LinkModel};

/// Per-path flow quantities keyed by interned path handle.
pub type PathFlows = FxHashMap<PathId, f64>;

/// Numerical slack used when inverting cumulative counts to entry times.
pub const ENTRY_TIME_TOL: f64 = 0.01;

// ── Construction parameters ───────────────────────────────────────────────────

/// Link inputs in field-measurement units; converted once at construction.
#[derive(Clone, Copy, Debug)]
pub struct LinkParams {
    /// Free-flow speed in mi/hr.
    pub free_flow_mph: f64,
    /// Backward (congestion) wave speed in mi/hr.
    pub backward_wave_mph: f64,
    /// Jam density in veh/mi.
    pub jam_density_vpm: f64,
    /// Physical length in feet.
    pub length_ft: f64,
    /// Capacity in veh/hr.  For queue links this is the downstream capacity.
    pub capacity_vph: f64,
    /// Queue links may take a separate upstream capacity in veh/hr; `None`
    /// reuses `capacity_vph`.  Ignored by CTM and LTM.
    pub upstream_capacity_vph: Option<f64>,
}

// ── Link ──────────────────────────────────────────────────────────────────────

/// A directed network link with one of the four kinematic-wave models.
pub struct Link {
    pub id:    LinkId,
    pub label: String,

    /// Tail (entry) node.  Set when the link is wired into a network.
    pub tail: NodeId,
    /// Head (exit) node.
    pub head: NodeId,

    // ── Converted parameters (ft, s, veh) ─────────────────────────────────
    pub free_flow_speed:     f64,
    pub backward_wave_speed: f64,
    pub jam_density:         f64,
    pub length:              f64,
    /// veh/timestep.
    pub capacity:            f64,
    pub max_vehicles:        f64,
    /// Whole timesteps to traverse at free flow.
    pub free_flow_time:      i64,
    /// Whole timesteps for the backward wave to cross the link.
    pub backward_wave_time:  i64,

    /// The model variant and its state (queue capacities, CTM cells).
    pub model: LinkModel,

    /// Time-dependent travel time, one entry per timestep.  Initialised to
    /// `free_flow_time` at network finalisation and refreshed by travel-time
    /// inversion after each load.
    pub travel_time: Vec<i64>,

    upstream:   Vec<PathFlows>,
    downstream: Vec<PathFlows>,
}

impl Link {
    /// Build a link, converting all inputs to internal units (ft, s, veh).
    ///
    /// `free_flow_time` and `backward_wave_time` are rounded *up* to whole
    /// timesteps, so every positive-length CTM link has at least one cell.
    pub fn new(
        id:       LinkId,
        label:    impl Into<String>,
        kind:     LinkKind,
        timestep: f64,
        params:   &LinkParams,
    ) -> Link {
        let free_flow_speed     = mph_to_fps(params.free_flow_mph);
        let backward_wave_speed = mph_to_fps(params.backward_wave_mph);
        let jam_density         = vpm_to_vpf(params.jam_density_vpm);
        let length              = params.length_ft;
        let capacity            = vph_to_vpts(params.capacity_vph, timestep);
        let free_flow_time      = timesteps_to_traverse(length, free_flow_speed, timestep);
        let backward_wave_time  = timesteps_to_traverse(length, backward_wave_speed, timestep);

        let model = LinkModel::build(
            kind,
            timestep,
            params,
            capacity,
            jam_density * length,
            free_flow_time,
            backward_wave_speed / free_flow_speed,
        );

        Link {
            id,
            label: label.into(),
            tail: NodeId::INVALID,
            head: NodeId::INVALID,
            free_flow_speed,
            backward_wave_speed,
            jam_density,
            length,
            capacity,
            max_vehicles: jam_density * length,
            free_flow_time,
            backward_wave_time,
            model,
            travel_time: Vec::new(),
            upstream:   vec![PathFlows::default()],
            downstream: vec![PathFlows::default()],
        }
    }

    /// Reset the count arrays to a single empty snapshot and clear any model
    /// state (CTM cell occupancies), as at the start of an episode.
    pub fn reset_counts(&mut self) {
        self.upstream.clear();
        self.upstream.push(PathFlows::default());
        self.downstream.clear();
        self.downstream.push(PathFlows::default());
        self.model.reset();
    }

    /// Size the travel-time table and fill it with the free-flow time.
    pub fn init_travel_times(&mut self, len: usize) {
        self.travel_time = vec![self.free_flow_time; len];
    }

    // ── Cumulative count queries ──────────────────────────────────────────

    /// Number of recorded upstream snapshots (one more than the last loaded
    /// timestep).
    #[inline]
    pub fn recorded_steps(&self) -> usize {
        self.upstream.len()
    }

    fn snapshot(arr: &[PathFlows], t: i64) -> Option<&PathFlows> {
        if t < 0 {
            return None;
        }
        let i = (t as usize).min(arr.len() - 1);
        Some(&arr[i])
    }

    /// Cumulative entries up through timestep `t` (0 for `t < 0`).
    pub fn upstream_count(&self, t: i64) -> f64 {
        Self::snapshot(&self.upstream, t).map_or(0.0, |s| s.values().sum())
    }

    /// Cumulative exits up through timestep `t` (0 for `t < 0`).
    pub fn downstream_count(&self, t: i64) -> f64 {
        Self::snapshot(&self.downstream, t).map_or(0.0, |s| s.values().sum())
    }

    /// Cumulative entries on one path up through timestep `t`.
    pub fn upstream_path_count(&self, t: i64, path: PathId) -> f64 {
        Self::snapshot(&self.upstream, t).map_or(0.0, |s| s.get(&path).copied().unwrap_or(0.0))
    }

    /// Cumulative exits on one path up through timestep `t`.
    pub fn downstream_path_count(&self, t: i64, path: PathId) -> f64 {
        Self::snapshot(&self.downstream, t).map_or(0.0, |s| s.get(&path).copied().unwrap_or(0.0))
    }

    /// Vehicles physically present at timestep `t`.
    #[inline]
    pub fn vehicles_on_link(&self, t: i64) -> f64 {
        self.upstream_count(t) - self.downstream_count(t)
    }

    // ── Flow movement ─────────────────────────────────────────────────────

    /// Add per-path flow at the upstream end, extending the upstream array by
    /// one snapshot (previous snapshot plus `flows`).
    pub fn flow_in(&mut self, flows: &PathFlows) {
        let mut next = self.upstream.last().cloned().unwrap_or_default();
        for (&path, &v) in flows {
            *next.entry(path).or_insert(0.0) += v;
        }
        self.upstream.push(next);
        self.model.on_flow_in(flows.values().sum());
    }

    /// Remove per-path flow at the downstream end, extending the downstream
    /// array by one snapshot.
    pub fn flow_out(&mut self, flows: &PathFlows) {
        let mut next = self.downstream.last().cloned().unwrap_or_default();
        for (&path, &v) in flows {
            *next.entry(path).or_insert(0.0) += v;
        }
        self.downstream.push(next);
        self.model.on_flow_out(flows.values().sum());
    }

    // ── Flow composition ──────────────────────────────────────────────────

    /// Per-path vehicles entering between `t_start` and `t_end`.
    ///
    /// The window is pinched to a single interval (`t_end` is clamped to
    /// `t_start + 1`) so the result can serve as a turning-proportion sample
    /// even when the sending flow straddles interval boundaries.
    pub fn flow_composition(&self, t_start: i64, t_end: i64) -> PathFlows {
        let start = t_start;
        let end = t_end.min(start + 1);

        let empty = PathFlows::default();
        let lo = Self::snapshot(&self.upstream, start).unwrap_or(&empty);
        let hi = Self::snapshot(&self.upstream, end).unwrap_or(&empty);

        let mut counts = PathFlows::default();
        for &path in lo.keys().chain(hi.keys()) {
            counts.entry(path).or_insert_with(|| {
                hi.get(&path).copied().unwrap_or(0.0) - lo.get(&path).copied().unwrap_or(0.0)
            });
        }
        counts
    }

    /// Timestep during which the `vehicle`-th cumulative upstream vehicle
    /// entered the link.
    ///
    /// `round_up = false` rounds down to the previous timestep boundary and
    /// `round_up = true` rounds up to the next one; dynamic network loading
    /// uses the pair to bracket the sending flow with two *distinct* interval
    /// indices (identical ones would make the flow composition all zeroes and
    /// useless for turning proportions).  `tol` absorbs floating-point error
    /// in the cumulative sums.
    pub fn entry_time(&self, vehicle: f64, round_up: bool, tol: f64) -> i64 {
        let len = self.upstream.len() as i64;
        if round_up {
            let mut t = 0;
            while self.upstream_count(t) <= vehicle - tol {
                t += 1;
                if t == len {
                    return len;
                }
            }
            t
        } else {
            let mut t = len - 1;
            while self.upstream_count(t) >= vehicle + tol {
                t -= 1;
                if t == 0 {
                    return 0;
                }
            }
            t
        }
    }

    // ── Per-variant flows (delegated to the model) ────────────────────────

    /// Maximum vehicles able to leave the downstream end during timestep `t`.
    pub fn sending_flow(&self, t: i64) -> f64 {
        self.model.sending_flow(self, t)
    }

    /// Maximum vehicles able to enter the upstream end during timestep `t`.
    pub fn receiving_flow(&self, t: i64) -> f64 {
        self.model.receiving_flow(self, t)
    }

    /// Perform the link's internal per-timestep update and return `(S, R)`.
    ///
    /// For CTM links this also propagates flow between consecutive cells;
    /// S and R are evaluated *before* the propagation.
    pub fn link_update(&mut self, t: i64) -> (f64, f64) {
        let s = self.sending_flow(t);
        let r = self.receiving_flow(t);
        if let LinkModel::CellTransmission { cells } = &mut self.model {
            LinkModel::propagate_cells(cells);
        }
        (s, r)
    }

    // ── Diagnostics ───────────────────────────────────────────────────────

    /// Count-based density (veh/ft) at timestep `t`.
    pub fn density(&self, t: i64) -> f64 {
        self.vehicles_on_link(t) / self.length
    }

    /// Instantaneous density for state reporting: CTM links report live cell
    /// occupancy, other models fall back to the latest recorded counts.
    pub fn live_density(&self) -> f64 {
        match &self.model {
            LinkModel::CellTransmission { cells } => {
                cells.iter().map(|c| c.vehicles).sum::<f64>() / self.length
            }
            _ => self.vehicles_on_link(self.upstream.len() as i64 - 1) / self.length,
        }
    }

    /// Mean space speed (ft/s) over `range`, free-flow where the link is empty.
    pub fn average_speed(&self, range: std::ops::Range<i64>) -> f64 {
        let n = range.end.saturating_sub(range.start).max(1);
        let mut cumulative = 0.0;
        for t in range {
            let density = self.density(t);
            if density == 0.0 {
                cumulative += self.free_flow_speed;
            } else {
                let flow = 0.5 * (self.upstream_count(t) - self.upstream_count(t - 1))
                    + 0.5 * (self.downstream_count(t) - self.downstream_count(t - 1));
                cumulative += flow / density;
            }
        }
        cumulative / n as f64
    }

    /// Vehicles that entered the link during `range`.
    pub fn entered_during(&self, range: std::ops::Range<i64>) -> f64 {
        range
            .map(|t| self.upstream_count(t) - self.upstream_count(t - 1))
            .sum()
    }

    /// Vehicles that exited the link during `range`.
    pub fn exited_during(&self, range: std::ops::Range<i64>) -> f64 {
        range
            .map(|t| self.downstream_count(t) - self.downstream_count(t - 1))
            .sum()
    }
}
