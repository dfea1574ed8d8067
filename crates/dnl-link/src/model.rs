//! The four link-model variants and their sending/receiving flow rules.
//!
//! The variants form a closed set, so they are a tagged enum rather than a
//! trait object; adding a model means adding a variant and the compiler
//! points at every match that needs extending.
//!
//! | Variant            | S(t)                                   | R(t)                                   |
//! |--------------------|----------------------------------------|----------------------------------------|
//! | `PointQueue`       | `min(uc(t+1−fft) − dc(t), cap_down)`   | `cap_up`                               |
//! | `SpatialQueue`     | as PQ                                  | `max(0, min(maxVeh − onLink, cap_up))` |
//! | `CellTransmission` | last cell's S                          | first cell's R                         |
//! | `LinkTransmission` | `min(uc(t+1−fft) − dc(t), cap)`        | `min(dc(t+1−bwt) + maxVeh − uc(t), cap)` |

use dnl_core::units::vph_to_vpts;

use crate::link::{Link, LinkParams};

// ── Kind selector ─────────────────────────────────────────────────────────────

/// Which flow model a link uses.  Input to [`Link::new`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum LinkKind {
    PointQueue,
    SpatialQueue,
    CellTransmission,
    LinkTransmission,
}

// ── Cell ──────────────────────────────────────────────────────────────────────

/// One cell of a cell-transmission link.
///
/// `delta` is the congestion-wave ratio `backwardWaveSpeed / freeFlowSpeed`;
/// it scales how much of the cell's spare room is reachable in one timestep.
#[derive(Clone, Debug)]
pub struct Cell {
    pub vehicles:     f64,
    pub capacity:     f64,
    pub max_vehicles: f64,
    pub delta:        f64,
}

impl Cell {
    fn new(capacity: f64, max_vehicles: f64, delta: f64) -> Cell {
        Cell { vehicles: 0.0, capacity, max_vehicles, delta }
    }

    #[inline]
    pub fn sending_flow(&self) -> f64 {
        self.vehicles.min(self.capacity).max(0.0)
    }

    #[inline]
    pub fn receiving_flow(&self) -> f64 {
        (self.delta * (self.max_vehicles - self.vehicles))
            .min(self.capacity)
            .max(0.0)
    }
}

// ── LinkModel ─────────────────────────────────────────────────────────────────

/// Model variant plus its state.  Queue capacities are in veh/timestep.
pub enum LinkModel {
    PointQueue {
        upstream_capacity:   f64,
        downstream_capacity: f64,
    },
    SpatialQueue {
        upstream_capacity:   f64,
        downstream_capacity: f64,
    },
    CellTransmission {
        /// One cell per free-flow timestep, upstream first.
        cells: Vec<Cell>,
    },
    LinkTransmission,
}

impl LinkModel {
    /// Assemble the variant state from converted link parameters.
    pub(crate) fn build(
        kind:           LinkKind,
        timestep:       f64,
        params:         &LinkParams,
        capacity:       f64,
        max_vehicles:   f64,
        free_flow_time: i64,
        delta:          f64,
    ) -> LinkModel {
        let upstream_capacity = params
            .upstream_capacity_vph
            .map(|vph| vph_to_vpts(vph, timestep))
            .unwrap_or(capacity);

        match kind {
            LinkKind::PointQueue => LinkModel::PointQueue {
                upstream_capacity,
                downstream_capacity: capacity,
            },
            LinkKind::SpatialQueue => LinkModel::SpatialQueue {
                upstream_capacity,
                downstream_capacity: capacity,
            },
            LinkKind::CellTransmission => {
                let per_cell_max = max_vehicles / free_flow_time as f64;
                let cells = (0..free_flow_time)
                    .map(|_| Cell::new(capacity, per_cell_max, delta))
                    .collect();
                LinkModel::CellTransmission { cells }
            }
            LinkKind::LinkTransmission => LinkModel::LinkTransmission,
        }
    }

    /// Zero any internal state (CTM cell occupancies) for an episode reset.
    pub fn reset(&mut self) {
        if let LinkModel::CellTransmission { cells } = self {
            for cell in cells {
                cell.vehicles = 0.0;
            }
        }
    }

    // ── Sending / receiving ───────────────────────────────────────────────

    pub(crate) fn sending_flow(&self, link: &Link, t: i64) -> f64 {
        match self {
            LinkModel::PointQueue { downstream_capacity, .. }
            | LinkModel::SpatialQueue { downstream_capacity, .. } => {
                queued_vehicles(link, t).min(*downstream_capacity)
            }
            LinkModel::CellTransmission { cells } => {
                cells.last().map_or(0.0, Cell::sending_flow)
            }
            LinkModel::LinkTransmission => queued_vehicles(link, t).min(link.capacity),
        }
    }

    pub(crate) fn receiving_flow(&self, link: &Link, t: i64) -> f64 {
        match self {
            LinkModel::PointQueue { upstream_capacity, .. } => *upstream_capacity,
            LinkModel::SpatialQueue { upstream_capacity, .. } => (link.max_vehicles
                - link.vehicles_on_link(t))
            .min(*upstream_capacity)
            .max(0.0),
            LinkModel::CellTransmission { cells } => {
                cells.first().map_or(0.0, Cell::receiving_flow)
            }
            LinkModel::LinkTransmission => (link.downstream_count(t + 1 - link.backward_wave_time)
                + link.max_vehicles
                - link.upstream_count(t))
            .min(link.capacity),
        }
    }

    /// Move flow between consecutive cells: `min(S_c, R_{c+1})` for each
    /// boundary, computed from the pre-move occupancies and applied at once.
    pub(crate) fn propagate_cells(cells: &mut [Cell]) {
        if cells.len() < 2 {
            return;
        }
        let transitions: Vec<f64> = (0..cells.len() - 1)
            .map(|c| cells[c].sending_flow().min(cells[c + 1].receiving_flow()))
            .collect();
        for (c, moved) in transitions.into_iter().enumerate() {
            cells[c].vehicles -= moved;
            cells[c + 1].vehicles += moved;
        }
    }

    // ── Count hooks ───────────────────────────────────────────────────────

    /// Called after a `flow_in` snapshot append with the total inflow.
    pub(crate) fn on_flow_in(&mut self, total: f64) {
        if let LinkModel::CellTransmission { cells } = self {
            if let Some(first) = cells.first_mut() {
                first.vehicles += total;
            }
        }
    }

    /// Called after a `flow_out` snapshot append with the total outflow.
    pub(crate) fn on_flow_out(&mut self, total: f64) {
        if let LinkModel::CellTransmission { cells } = self {
            if let Some(last) = cells.last_mut() {
                last.vehicles -= total;
            }
        }
    }
}

/// Vehicles that have reached the downstream end by timestep `t` and not yet
/// left: `uc(t + 1 − freeFlowTime) − dc(t)`.
#[inline]
fn queued_vehicles(link: &Link, t: i64) -> f64 {
    link.upstream_count(t + 1 - link.free_flow_time) - link.downstream_count(t)
}
