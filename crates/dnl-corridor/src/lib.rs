//! `dnl-corridor` — the fixed study corridor for the `rust_dnl` engine.
//!
//! A freeway with two metered on-ramps crossing a signalised arterial:
//! 30 cell-transmission links, 26 nodes, four dual-ring intersections, and
//! 56 OD movements.  This crate freezes the geometry, the demand table, and
//! the configuration record the environment exposes to an agent.

pub mod config;
pub mod corridor;
pub mod volumes;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{ACTION_DIM, Config, DiamondTiming, MAX_INCREMENTS, RampCrossTiming};
pub use corridor::{Corridor, NUM_LINKS, NUM_NODES, TIMESTEP, links, nodes};
pub use volumes::{OD_VOLUMES, OdVolume};
