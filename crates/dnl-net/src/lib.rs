//! `dnl-net` — network container, DNL loop, and assignment for `rust_dnl`.
//!
//! [`Network`] owns the links, nodes, ODs and path-flow tables of one
//! episode and drives dynamic network loading timestep by timestep.  On top
//! of the loading loop sit travel-time inversion, the time-dependent
//! shortest-path solver, and the convex-combination dynamic traffic
//! assignment.

pub mod assign;
pub mod error;
pub mod network;
pub mod od;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use assign::TargetPathFlows;
pub use error::{NetError, NetResult};
pub use network::{Network, TRAVEL_TIME_TOL};
pub use od::OdPair;
