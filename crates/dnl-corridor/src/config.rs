//! Signal and ramp-meter configuration, and its fixed action-vector layout.
//!
//! # Vector layout
//!
//! Configuration and actions share one flat 20-slot layout:
//!
//! ```text
//! [ nb_ramp, sb_ramp,
//!   wx:  split00 split01 split10 split11 barrier0 barrier1,
//!   ex:  split00 split01 split10 split11 barrier0 barrier1,
//!   wrx: split00 barrier0 barrier1,
//!   erx: split01 barrier0 barrier1 ]
//! ```
//!
//! `vectorize` and `from_vector` are exact inverses so an RL agent can treat
//! the configuration as a flat float vector.

use dnl_node::SignalParams;

/// Length of the flat configuration/action vector.
pub const ACTION_DIM: usize = 20;

/// Largest per-step change one unit of action applies to each slot.
const SPLIT_INCREMENT: f64 = 0.05;
const BARRIER_INCREMENT: f64 = 10.0;
const RAMP_INCREMENT: f64 = 25.0 / 3600.0;

/// Per-slot maximum increments, aligned with the vector layout.
pub const MAX_INCREMENTS: [f64; ACTION_DIM] = [
    RAMP_INCREMENT,
    RAMP_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    BARRIER_INCREMENT,
    BARRIER_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    SPLIT_INCREMENT,
    BARRIER_INCREMENT,
    BARRIER_INCREMENT,
    SPLIT_INCREMENT,
    BARRIER_INCREMENT,
    BARRIER_INCREMENT,
    SPLIT_INCREMENT,
    BARRIER_INCREMENT,
    BARRIER_INCREMENT,
];

// ── Per-intersection timing records ───────────────────────────────────────────

/// Full dual-ring timing of a four-approach intersection.
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiamondTiming {
    pub split_00:  f64,
    pub split_01:  f64,
    pub split_10:  f64,
    pub split_11:  f64,
    pub barrier_0: f64,
    pub barrier_1: f64,
}

/// Timing of a ramp-terminal intersection: one adjustable split plus the
/// two barrier lengths (its remaining rings are pinned).
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RampCrossTiming {
    pub split:     f64,
    pub barrier_0: f64,
    pub barrier_1: f64,
}

// ── Config ────────────────────────────────────────────────────────────────────

/// The full controllable state: two meter rates and four intersections.
///
/// Also doubles as the structured form of an action vector (`dictify`).
#[derive(Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Northbound meter rate, veh/timestep.
    pub nb_ramp: f64,
    /// Southbound meter rate, veh/timestep.
    pub sb_ramp: f64,
    pub wx:  DiamondTiming,
    pub ex:  DiamondTiming,
    /// Western ramp terminal: `split` drives ring 00.
    pub wrx: RampCrossTiming,
    /// Eastern ramp terminal: `split` drives ring 01.
    pub erx: RampCrossTiming,
}

impl Config {
    /// The corridor's default timing plan for a given timestep length.
    pub fn initial(timestep: f64) -> Config {
        Config {
            nb_ramp: 300.0 * timestep / 3600.0,
            sb_ramp: 400.0 * timestep / 3600.0,
            wx: DiamondTiming {
                split_00:  0.3,
                split_01:  0.5,
                split_10:  0.7,
                split_11:  0.9,
                barrier_0: 60.0 / timestep,
                barrier_1: 30.0 / timestep,
            },
            ex: DiamondTiming {
                split_00:  0.8,
                split_01:  0.6,
                split_10:  0.4,
                split_11:  0.2,
                barrier_0: 50.0 / timestep,
                barrier_1: 40.0 / timestep,
            },
            wrx: RampCrossTiming { split: 0.6, barrier_0: 40.0 / timestep, barrier_1: 40.0 / timestep },
            erx: RampCrossTiming { split: 0.4, barrier_0: 50.0 / timestep, barrier_1: 50.0 / timestep },
        }
    }

    /// Field-wise lower and upper bounds for every slot.
    pub fn constraints() -> (Config, Config) {
        let diamond = |split, barrier| DiamondTiming {
            split_00:  split,
            split_01:  split,
            split_10:  split,
            split_11:  split,
            barrier_0: barrier,
            barrier_1: barrier,
        };
        let ramp_cross = |split, barrier| RampCrossTiming {
            split,
            barrier_0: barrier,
            barrier_1: barrier,
        };
        let mins = Config {
            nb_ramp: 0.0,
            sb_ramp: 0.0,
            wx:  diamond(0.0, 0.0),
            ex:  diamond(0.0, 0.0),
            wrx: ramp_cross(0.0, 0.0),
            erx: ramp_cross(0.0, 0.0),
        };
        let maxs = Config {
            nb_ramp: 600.0 / 3600.0,
            sb_ramp: 600.0 / 3600.0,
            wx:  diamond(1.0, 120.0),
            ex:  diamond(1.0, 120.0),
            wrx: ramp_cross(1.0, 120.0),
            erx: ramp_cross(1.0, 120.0),
        };
        (mins, maxs)
    }

    // ── Flat-vector conversions ───────────────────────────────────────────

    /// Flatten into the fixed 20-slot layout.
    pub fn vectorize(&self) -> [f64; ACTION_DIM] {
        [
            self.nb_ramp,
            self.sb_ramp,
            self.wx.split_00,
            self.wx.split_01,
            self.wx.split_10,
            self.wx.split_11,
            self.wx.barrier_0,
            self.wx.barrier_1,
            self.ex.split_00,
            self.ex.split_01,
            self.ex.split_10,
            self.ex.split_11,
            self.ex.barrier_0,
            self.ex.barrier_1,
            self.wrx.split,
            self.wrx.barrier_0,
            self.wrx.barrier_1,
            self.erx.split,
            self.erx.barrier_0,
            self.erx.barrier_1,
        ]
    }

    /// Rebuild the structured record from a flat vector (`dictify`).
    pub fn from_vector(v: &[f64; ACTION_DIM]) -> Config {
        Config {
            nb_ramp: v[0],
            sb_ramp: v[1],
            wx: DiamondTiming {
                split_00:  v[2],
                split_01:  v[3],
                split_10:  v[4],
                split_11:  v[5],
                barrier_0: v[6],
                barrier_1: v[7],
            },
            ex: DiamondTiming {
                split_00:  v[8],
                split_01:  v[9],
                split_10:  v[10],
                split_11:  v[11],
                barrier_0: v[12],
                barrier_1: v[13],
            },
            wrx: RampCrossTiming { split: v[14], barrier_0: v[15], barrier_1: v[16] },
            erx: RampCrossTiming { split: v[17], barrier_0: v[18], barrier_1: v[19] },
        }
    }

    /// Apply a normalised action: each slot moves by
    /// `action · max_increment`, then clamps to its bounds.
    pub fn apply_action(&mut self, action: &[f64; ACTION_DIM]) {
        let (mins, maxs) = Config::constraints();
        let (lo, hi) = (mins.vectorize(), maxs.vectorize());
        let mut v = self.vectorize();
        for k in 0..ACTION_DIM {
            v[k] = (v[k] + action[k] * MAX_INCREMENTS[k]).clamp(lo[k], hi[k]);
        }
        *self = Config::from_vector(&v);
    }

    // ── Per-node parameter records ────────────────────────────────────────

    pub(crate) fn wx_params(&self) -> SignalParams {
        diamond_params(&self.wx)
    }

    pub(crate) fn ex_params(&self) -> SignalParams {
        diamond_params(&self.ex)
    }

    /// wrx adjusts ring 00 only; its other rings stay pinned.
    pub(crate) fn wrx_params(&self) -> SignalParams {
        SignalParams {
            split_00:  Some(self.wrx.split),
            barrier_0: Some(self.wrx.barrier_0),
            barrier_1: Some(self.wrx.barrier_1),
            ..Default::default()
        }
    }

    /// erx adjusts ring 01 only.
    pub(crate) fn erx_params(&self) -> SignalParams {
        SignalParams {
            split_01:  Some(self.erx.split),
            barrier_0: Some(self.erx.barrier_0),
            barrier_1: Some(self.erx.barrier_1),
            ..Default::default()
        }
    }
}

fn diamond_params(timing: &DiamondTiming) -> SignalParams {
    SignalParams {
        split_00:  Some(timing.split_00),
        split_01:  Some(timing.split_01),
        split_10:  Some(timing.split_10),
        split_11:  Some(timing.split_11),
        barrier_0: Some(timing.barrier_0),
        barrier_1: Some(timing.barrier_1),
    }
}
