//! `dnl-core` — foundational types for the `rust_dnl` traffic engine.
//!
//! This crate is a dependency of every other `dnl-*` crate.  It intentionally
//! has no `dnl-*` dependencies and minimal external ones (`rand`/`rand_distr`
//! and `rustc-hash`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module    | Contents                                            |
//! |-----------|-----------------------------------------------------|
//! | [`ids`]   | `LinkId`, `NodeId`, `PathId`                        |
//! | [`units`] | mi/hr → ft/s and veh/hr → veh/timestep conversions  |
//! | [`path`]  | `PathSet` — link-sequence interner                  |
//! | [`rng`]   | `DemandRng` — seeded Poisson demand draws           |

pub mod ids;
pub mod path;
pub mod rng;
pub mod units;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use ids::{LinkId, NodeId, PathId};
pub use path::PathSet;
pub use rng::DemandRng;
