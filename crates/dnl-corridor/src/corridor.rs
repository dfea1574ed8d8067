//! The fixed corridor: a freeway with two metered on-ramps crossing an
//! arterial, 30 links and 26 nodes.
//!
//! The link and node tables are frozen — the same wiring must come out of
//! every build, because episode rewards are only comparable against an
//! identical network.  Node indices: 0–7 origin centroids, 8–15 destination
//! centroids, 16/17 freeway merges, 18/19 freeway diverges, 20/21 ramp
//! meters, and the four signalised intersections `ex` (22), `wx` (23),
//! `erx` (24) and `wrx` (25).

use dnl_core::{DemandRng, LinkId, NodeId};
use dnl_link::{Link, LinkKind, LinkParams};
use dnl_node::{Barrier, Node, Phase, Ring};
use dnl_net::{NetResult, Network, OdPair};
use log::debug;
use rustc_hash::FxHashMap;

use crate::config::Config;
use crate::volumes::OD_VOLUMES;

/// One timestep is one second.
pub const TIMESTEP: f64 = 1.0;

/// Number of links in the corridor (and of densities in the state vector).
pub const NUM_LINKS: usize = 30;
/// Number of nodes in the corridor.
pub const NUM_NODES: usize = 26;

// ── Node indices ──────────────────────────────────────────────────────────────

pub mod nodes {
    pub const FWY_NB_START: u32 = 0;
    pub const FWY_SB_START: u32 = 1;
    pub const XS_EB_START: u32 = 2;
    pub const XS_WB_START: u32 = 3;
    pub const EC_NB_START: u32 = 4;
    pub const EC_SB_START: u32 = 5;
    pub const WC_NB_START: u32 = 6;
    pub const WC_SB_START: u32 = 7;
    pub const FWY_NB_END: u32 = 8;
    pub const FWY_SB_END: u32 = 9;
    pub const XS_EB_END: u32 = 10;
    pub const XS_WB_END: u32 = 11;
    pub const EC_NB_END: u32 = 12;
    pub const EC_SB_END: u32 = 13;
    pub const WC_NB_END: u32 = 14;
    pub const WC_SB_END: u32 = 15;
    pub const NB_MERGE: u32 = 16;
    pub const SB_MERGE: u32 = 17;
    pub const NB_DIVERGE: u32 = 18;
    pub const SB_DIVERGE: u32 = 19;
    pub const NB_METER: u32 = 20;
    pub const SB_METER: u32 = 21;
    pub const EX: u32 = 22;
    pub const WX: u32 = 23;
    pub const ERX: u32 = 24;
    pub const WRX: u32 = 25;
}

// ── Link indices (build order = state-vector order) ───────────────────────────

pub mod links {
    pub const FWY_NB_U: u32 = 0;
    pub const FWY_NB_C: u32 = 1;
    pub const FWY_NB_D: u32 = 2;
    pub const FWY_NB_XR: u32 = 3;
    pub const FWY_NB_NRU: u32 = 4;
    pub const FWY_NB_NRD: u32 = 5;
    pub const FWY_SB_U: u32 = 6;
    pub const FWY_SB_C: u32 = 7;
    pub const FWY_SB_D: u32 = 8;
    pub const FWY_SB_XR: u32 = 9;
    pub const FWY_SB_NRU: u32 = 10;
    pub const FWY_SB_NRD: u32 = 11;
    pub const XS_EB_I: u32 = 12;
    pub const XS_EB_A: u32 = 13;
    pub const XS_EB_C: u32 = 14;
    pub const XS_EB_D: u32 = 15;
    pub const XS_EB_O: u32 = 16;
    pub const XS_WB_I: u32 = 17;
    pub const XS_WB_A: u32 = 18;
    pub const XS_WB_C: u32 = 19;
    pub const XS_WB_D: u32 = 20;
    pub const XS_WB_O: u32 = 21;
    pub const WC_SB_I: u32 = 22;
    pub const WC_SB_O: u32 = 23;
    pub const WC_NB_I: u32 = 24;
    pub const WC_NB_O: u32 = 25;
    pub const EC_SB_I: u32 = 26;
    pub const EC_SB_O: u32 = 27;
    pub const EC_NB_I: u32 = 28;
    pub const EC_NB_O: u32 = 29;
}

// ── Link table ────────────────────────────────────────────────────────────────

struct LinkRow {
    label:      &'static str,
    tail:       u32,
    head:       u32,
    speed_mph:  f64,
    back_mph:   f64,
    length_ft:  f64,
    cap_vph:    f64,
}

const fn row(
    label: &'static str,
    tail: u32,
    head: u32,
    speed_mph: f64,
    back_mph: f64,
    length_ft: f64,
    cap_vph: f64,
) -> LinkRow {
    LinkRow { label, tail, head, speed_mph, back_mph, length_ft, cap_vph }
}

/// Frozen geometry: every link is cell-transmission with 200 veh/mi jam
/// density.  Speeds are (free-flow, backward-wave) in mi/hr.
const LINK_TABLE: [LinkRow; NUM_LINKS] = [
    // Northbound freeway and its ramps.
    row("FWY NB U", 0, 18, 65.0, 35.0, 1500.0, 3200.0),
    row("FWY NB C", 18, 16, 65.0, 35.0, 5280.0, 3200.0),
    row("FWY NB D", 16, 8, 65.0, 35.0, 1500.0, 3200.0),
    row("FWY NB XR", 18, 24, 45.0, 30.0, 2640.0, 1600.0),
    row("FWY NB NRU", 24, 20, 45.0, 30.0, 1140.0, 1600.0),
    row("FWY NB NRD", 20, 16, 45.0, 30.0, 1500.0, 1600.0),
    // Southbound freeway and its ramps.
    row("FWY SB U", 1, 19, 65.0, 35.0, 1500.0, 3200.0),
    row("FWY SB C", 19, 17, 65.0, 35.0, 5280.0, 3200.0),
    row("FWY SB D", 17, 9, 65.0, 35.0, 1500.0, 3200.0),
    row("FWY SB XR", 19, 25, 45.0, 30.0, 2640.0, 1600.0),
    row("FWY SB NRU", 25, 21, 45.0, 30.0, 1140.0, 1600.0),
    row("FWY SB NRD", 21, 17, 45.0, 30.0, 1500.0, 1600.0),
    // Eastbound cross street.
    row("XS EB I", 2, 23, 45.0, 30.0, 1500.0, 3200.0),
    row("XS EB A", 23, 25, 45.0, 30.0, 2000.0, 3200.0),
    row("XS EB C", 25, 24, 45.0, 30.0, 400.0, 3200.0),
    row("XS EB D", 24, 22, 45.0, 30.0, 2000.0, 3200.0),
    row("XS EB O", 22, 10, 45.0, 30.0, 1500.0, 3200.0),
    // Westbound cross street.
    row("XS WB I", 3, 22, 45.0, 30.0, 1500.0, 3200.0),
    row("XS WB A", 22, 24, 45.0, 30.0, 2000.0, 3200.0),
    row("XS WB C", 24, 25, 45.0, 30.0, 400.0, 3200.0),
    row("XS WB D", 25, 23, 45.0, 30.0, 2000.0, 3200.0),
    row("XS WB O", 23, 11, 45.0, 30.0, 1500.0, 3200.0),
    // Western collector.
    row("WC SB I", 7, 23, 35.0, 25.0, 2640.0, 1600.0),
    row("WC SB O", 23, 15, 35.0, 25.0, 2640.0, 1600.0),
    row("WC NB I", 6, 23, 35.0, 25.0, 2640.0, 1600.0),
    row("WC NB O", 23, 14, 35.0, 25.0, 2640.0, 1600.0),
    // Eastern collector.
    row("EC SB I", 5, 22, 35.0, 25.0, 2640.0, 1600.0),
    row("EC SB O", 22, 13, 35.0, 25.0, 2640.0, 1600.0),
    row("EC NB I", 4, 22, 35.0, 25.0, 2640.0, 1600.0),
    row("EC NB O", 22, 12, 35.0, 25.0, 2640.0, 1600.0),
];

/// Placeholder split/length for rings the configuration rewrites before the
/// first load; pinned rings get their real values here.
const UNSET_SPLIT: f64 = 0.5;
const UNSET_LENGTH: f64 = 60.0;
const PINNED: f64 = 1.0;

// ── Corridor ──────────────────────────────────────────────────────────────────

/// The assembled corridor network plus its control indices.
pub struct Corridor {
    pub net: Network,
}

impl Corridor {
    /// Build the frozen corridor for one episode of `time_horizon` timesteps.
    pub fn build(time_horizon: i64) -> NetResult<Corridor> {
        let mut net = Network::new(TIMESTEP, time_horizon);

        for entry in &LINK_TABLE {
            let mut link = Link::new(
                LinkId(0),
                entry.label,
                LinkKind::CellTransmission,
                TIMESTEP,
                &LinkParams {
                    free_flow_mph: entry.speed_mph,
                    backward_wave_mph: entry.back_mph,
                    jam_density_vpm: 200.0,
                    length_ft: entry.length_ft,
                    capacity_vph: entry.cap_vph,
                    upstream_capacity_vph: None,
                },
            );
            link.tail = NodeId(entry.tail);
            link.head = NodeId(entry.head);
            net.add_link(link);
        }

        build_nodes(&mut net)?;
        net.finalize_links();
        net.validate()?;
        debug!("corridor assembled: {} links, {} nodes", net.links.len(), net.nodes.len());
        Ok(Corridor { net })
    }

    /// Push the full configuration to the meters and intersections.
    pub fn set_config(&mut self, cfg: &Config) {
        self.net.set_meter_rate(NodeId(nodes::NB_METER), cfg.nb_ramp);
        self.net.set_meter_rate(NodeId(nodes::SB_METER), cfg.sb_ramp);
        self.net.set_signal_params(NodeId(nodes::WX), &cfg.wx_params());
        self.net.set_signal_params(NodeId(nodes::WRX), &cfg.wrx_params());
        self.net.set_signal_params(NodeId(nodes::ERX), &cfg.erx_params());
        self.net.set_signal_params(NodeId(nodes::EX), &cfg.ex_params());
    }

    /// Register all 56 ODs, drawing Poisson demand from `rng` in table order.
    pub fn set_demand(&mut self, rng: &mut DemandRng) {
        let horizon = self.net.time_horizon;
        for od in &OD_VOLUMES {
            let rate = od.hourly * TIMESTEP / 3600.0;
            self.net.add_od(OdPair::stochastic(
                NodeId(od.origin),
                NodeId(od.destination),
                horizon,
                rate,
                rng,
            ));
        }
    }

    /// Instantaneous per-link densities in link-table order.
    pub fn link_densities(&self) -> Vec<f64> {
        self.net.links.iter().map(|l| l.live_density()).collect()
    }
}

// ── Node wiring ───────────────────────────────────────────────────────────────

fn build_nodes(net: &mut Network) -> NetResult<()> {
    use links::*;

    let l = |id: u32| LinkId(id);
    let ids = |ids: &[u32]| ids.iter().map(|&i| LinkId(i)).collect::<Vec<_>>();
    let phase = |a: u32, b: u32| Phase::new(LinkId(a), LinkId(b));

    // Origin centroids (0–7).
    for entry in [FWY_NB_U, FWY_SB_U, XS_EB_I, XS_WB_I, EC_NB_I, EC_SB_I, WC_NB_I, WC_SB_I] {
        net.add_node(Node::origin(NodeId(0), vec![l(entry)]));
    }
    // Destination centroids (8–15).
    for exit in [FWY_NB_D, FWY_SB_D, XS_EB_O, XS_WB_O, EC_NB_O, EC_SB_O, WC_NB_O, WC_SB_O] {
        net.add_node(Node::destination(NodeId(0), vec![l(exit)]));
    }

    // Freeway merges (16, 17): mainline priority 3, ramp 1.
    for (mainline, ramp, down) in [
        (FWY_NB_C, FWY_NB_NRD, FWY_NB_D),
        (FWY_SB_C, FWY_SB_NRD, FWY_SB_D),
    ] {
        let mut priorities = FxHashMap::default();
        priorities.insert(l(mainline), 3.0);
        priorities.insert(l(ramp), 1.0);
        net.add_node(Node::merge(NodeId(0), ids(&[mainline, ramp]), vec![l(down)], priorities)?);
    }

    // Freeway diverges (18, 19).
    net.add_node(Node::diverge(NodeId(0), vec![l(FWY_NB_U)], ids(&[FWY_NB_C, FWY_NB_XR]))?);
    net.add_node(Node::diverge(NodeId(0), vec![l(FWY_SB_U)], ids(&[FWY_SB_C, FWY_SB_XR]))?);

    // Ramp meters (20, 21).
    net.add_node(Node::ramp_meter(NodeId(0), vec![l(FWY_NB_NRU)], vec![l(FWY_NB_NRD)])?);
    net.add_node(Node::ramp_meter(NodeId(0), vec![l(FWY_SB_NRU)], vec![l(FWY_SB_NRD)])?);

    // Eastern intersection (22).
    let ex = Node::signal(
        NodeId(0),
        ids(&[XS_EB_D, XS_WB_I, EC_NB_I, EC_SB_I]),
        ids(&[XS_EB_O, XS_WB_A, EC_NB_O, EC_SB_O]),
        [
            Barrier::new(
                [
                    Ring::new([phase(XS_EB_D, XS_EB_O), phase(XS_WB_I, EC_SB_O)], UNSET_SPLIT),
                    Ring::new([phase(XS_EB_D, EC_NB_O), phase(XS_WB_I, XS_WB_A)], UNSET_SPLIT),
                ],
                UNSET_LENGTH,
            ),
            Barrier::new(
                [
                    Ring::new([phase(EC_SB_I, EC_SB_O), phase(EC_NB_I, XS_WB_A)], UNSET_SPLIT),
                    Ring::new([phase(EC_SB_I, XS_EB_O), phase(EC_NB_I, EC_NB_O)], UNSET_SPLIT),
                ],
                UNSET_LENGTH,
            ),
        ],
        vec![
            phase(EC_SB_I, XS_WB_A),
            phase(EC_NB_I, XS_EB_O),
            phase(XS_EB_D, EC_SB_O),
            phase(XS_WB_I, EC_NB_O),
        ],
    )?;
    net.add_node(ex);

    // Western intersection (23).
    let wx = Node::signal(
        NodeId(0),
        ids(&[WC_SB_I, WC_NB_I, XS_EB_I, XS_WB_D]),
        ids(&[WC_SB_O, WC_NB_O, XS_EB_A, XS_WB_O]),
        [
            Barrier::new(
                [
                    Ring::new([phase(XS_EB_I, XS_EB_A), phase(XS_WB_D, WC_SB_O)], UNSET_SPLIT),
                    Ring::new([phase(XS_EB_I, WC_NB_O), phase(XS_WB_D, XS_WB_O)], UNSET_SPLIT),
                ],
                UNSET_LENGTH,
            ),
            Barrier::new(
                [
                    Ring::new([phase(WC_NB_I, WC_NB_O), phase(WC_SB_I, XS_EB_A)], UNSET_SPLIT),
                    Ring::new([phase(WC_NB_I, XS_WB_O), phase(WC_SB_I, WC_SB_O)], UNSET_SPLIT),
                ],
                UNSET_LENGTH,
            ),
        ],
        vec![
            phase(XS_EB_I, WC_SB_O),
            phase(XS_WB_D, WC_NB_O),
            phase(WC_SB_I, XS_WB_O),
            phase(WC_NB_I, XS_EB_A),
        ],
    )?;
    net.add_node(wx);

    // Eastern ramp terminal (24): eastbound through and the exit-ramp rings
    // are pinned; only ring 01 is adjustable.
    let erx = Node::signal(
        NodeId(0),
        ids(&[XS_EB_C, XS_WB_A, FWY_NB_XR]),
        ids(&[XS_EB_D, XS_WB_C, FWY_NB_NRU]),
        [
            Barrier::new(
                [
                    Ring::new([phase(XS_EB_C, XS_EB_D), phase(XS_EB_C, XS_EB_D)], PINNED),
                    Ring::new([phase(XS_EB_C, FWY_NB_NRU), phase(XS_WB_A, XS_WB_C)], UNSET_SPLIT),
                ],
                UNSET_LENGTH,
            ),
            Barrier::new(
                [
                    Ring::new([phase(FWY_NB_XR, FWY_NB_NRU), phase(FWY_NB_XR, FWY_NB_NRU)], PINNED),
                    Ring::new([phase(FWY_NB_XR, XS_WB_C), phase(FWY_NB_XR, XS_WB_C)], PINNED),
                ],
                UNSET_LENGTH,
            ),
        ],
        vec![phase(FWY_NB_XR, XS_EB_D), phase(XS_WB_A, FWY_NB_NRU)],
    )?;
    net.add_node(erx);

    // Western ramp terminal (25): only ring 00 is adjustable.
    let wrx = Node::signal(
        NodeId(0),
        ids(&[XS_EB_A, XS_WB_C, FWY_SB_XR]),
        ids(&[XS_EB_C, XS_WB_D, FWY_SB_NRU]),
        [
            Barrier::new(
                [
                    Ring::new([phase(XS_EB_A, XS_EB_C), phase(XS_WB_C, FWY_SB_NRU)], UNSET_SPLIT),
                    Ring::new([phase(XS_WB_C, XS_WB_D), phase(XS_WB_C, XS_WB_D)], PINNED),
                ],
                UNSET_LENGTH,
            ),
            Barrier::new(
                [
                    Ring::new([phase(FWY_SB_XR, XS_EB_C), phase(FWY_SB_XR, XS_EB_C)], PINNED),
                    Ring::new([phase(FWY_SB_XR, FWY_SB_NRU), phase(FWY_SB_XR, FWY_SB_NRU)], PINNED),
                ],
                UNSET_LENGTH,
            ),
        ],
        vec![phase(FWY_SB_XR, XS_WB_D), phase(XS_EB_A, FWY_SB_NRU)],
    )?;
    net.add_node(wrx);

    Ok(())
}
