//! Dynamic traffic assignment: time-dependent shortest paths, all-or-nothing
//! targets, and the convex-combination path-flow update.

use dnl_core::{LinkId, NodeId, PathId};
use log::debug;
use rustc_hash::FxHashMap;

use crate::error::{NetError, NetResult};
use crate::network::Network;

/// Label for unreachable nodes.  Far above any horizon, far below overflow.
const INFINITY_COST: i64 = i64::MAX / 4;

/// An all-or-nothing assignment: demand per target path per departure time.
pub type TargetPathFlows = FxHashMap<PathId, Vec<f64>>;

impl Network {
    // ── Time-dependent shortest path ──────────────────────────────────────

    /// One-to-all FIFO label-setting from `origin` departing at `departure`.
    ///
    /// Returns `(cost, backlink)` per node; unreachable nodes keep an
    /// infinite cost and no backlink.  Ties break on the first node found in
    /// index order.
    pub fn tdsp(&self, origin: NodeId, departure: i64) -> (Vec<i64>, Vec<Option<LinkId>>) {
        let n = self.nodes.len();
        let mut cost = vec![INFINITY_COST; n];
        let mut backlink: Vec<Option<LinkId>> = vec![None; n];
        let mut finalized = vec![false; n];
        cost[origin.index()] = departure;

        loop {
            // Lowest-label unfinalized node; none left means we are done.
            let mut min_label = INFINITY_COST;
            let mut min_node = None;
            for i in 0..n {
                if !finalized[i] && cost[i] < min_label {
                    min_label = cost[i];
                    min_node = Some(i);
                }
            }
            let Some(i) = min_node else {
                break;
            };
            finalized[i] = true;

            for &ij in &self.forward_star[i] {
                let link = &self.links[ij.index()];
                // Out-of-table departure times cannot reach anywhere in time.
                let label = usize::try_from(cost[i])
                    .ok()
                    .and_then(|idx| link.travel_time.get(idx).copied())
                    .map_or(INFINITY_COST, |tt| cost[i] + tt);
                let head = link.head.index();
                if label < cost[head] {
                    cost[head] = label;
                    backlink[head] = Some(ij);
                }
            }
        }
        (cost, backlink)
    }

    // ── All-or-nothing target ─────────────────────────────────────────────

    /// Shortest paths for every OD and departure time with positive demand,
    /// assembled into an all-or-nothing target assignment.  Also accumulates
    /// [`sptt`](Network::sptt).  An unreachable destination is fatal.
    pub fn find_all_shortest_paths(&mut self) -> NetResult<TargetPathFlows> {
        self.sptt = 0.0;
        let horizon = self.time_horizon as usize;
        let mut target = TargetPathFlows::default();

        for od in 0..self.ods.len() {
            let (origin, destination) = (self.ods[od].origin, self.ods[od].destination);
            for t in 0..horizon {
                let demand = self.ods[od].demand_rates[t];
                if demand <= 0.0 {
                    continue;
                }
                let (cost, backlink) = self.tdsp(origin, t as i64);

                // Walk the backlinks from the destination to the origin.
                let mut cur = destination;
                let mut links_reversed = Vec::new();
                while cur != origin {
                    let Some(ij) = backlink[cur.index()] else {
                        return Err(NetError::NoPath { origin, destination, departure: t as i64 });
                    };
                    links_reversed.push(ij);
                    cur = self.links[ij.index()].tail;
                }
                links_reversed.reverse();

                let pid = self.paths.intern(&links_reversed);
                target.entry(pid).or_insert_with(|| vec![0.0; horizon])[t] = demand;
                self.sptt += demand * (cost[destination.index()] - t as i64) as f64;
            }
        }
        Ok(target)
    }

    // ── Path-flow updates ─────────────────────────────────────────────────

    /// Convex combination toward `target`:
    /// `h ← α·h* + (1−α)·h`, treating paths missing from the target as zero.
    pub fn update_path_flows(&mut self, target: &TargetPathFlows, step_size: f64) {
        let horizon = self.time_horizon as usize;
        if self.path_flows.len() < self.paths.len() {
            self.path_flows.resize_with(self.paths.len(), || vec![0.0; horizon]);
        }
        for (i, flows) in self.path_flows.iter_mut().enumerate() {
            let target_row = target.get(&PathId(i as u32));
            for (t, flow) in flows.iter_mut().enumerate() {
                let h_star = target_row.map_or(0.0, |row| row[t]);
                *flow = h_star * step_size + *flow * (1.0 - step_size);
            }
        }
    }

    /// Zero all path flows, then apply an all-or-nothing assignment on the
    /// current travel times (a convex step of size 1).
    pub fn initialize_path_flows(&mut self) -> NetResult<()> {
        let horizon = self.time_horizon as usize;
        self.path_flows = vec![vec![0.0; horizon]; self.paths.len()];
        let target = self.find_all_shortest_paths()?;
        self.update_path_flows(&target, 1.0);
        Ok(())
    }

    // ── Equilibrium loop ──────────────────────────────────────────────────

    /// Average excess cost: `(TSTT − SPTT) / totalDemand`.
    ///
    /// Finding shortest paths is expensive; pass `recompute_sptt = false`
    /// when a fresh all-or-nothing pass already ran on the current travel
    /// times, or the AEC can come out negative and meaningless.
    pub fn average_excess_cost(&mut self, recompute_sptt: bool) -> NetResult<f64> {
        if recompute_sptt {
            self.find_all_shortest_paths()?;
        }
        Ok((self.calculate_tstt(0..self.time_horizon) - self.sptt) / self.total_demand)
    }

    /// Iterate loading, travel times, and convex path-flow updates with the
    /// classic 1/(k+2) step until the AEC drops below `target_aec`.
    pub fn dta(&mut self, max_iterations: usize, target_aec: f64) -> NetResult<()> {
        self.initialize_path_flows()?;
        for iteration in 0..max_iterations {
            self.load_network(0..self.time_horizon, true);
            self.calculate_travel_times(0..self.time_horizon);
            let target = self.find_all_shortest_paths()?;
            let aec = self.average_excess_cost(false)?;
            debug!("DTA iteration {iteration}: AEC {aec:.4}");
            if aec < target_aec {
                break;
            }
            self.update_path_flows(&target, 1.0 / (iteration as f64 + 2.0));
        }
        Ok(())
    }
}
