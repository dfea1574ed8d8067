//! `dnl-link` — link models for the `rust_dnl` traffic engine.
//!
//! A link is a directed road segment holding cumulative per-path entry and
//! exit counts plus one of four kinematic-wave flow models: point queue,
//! spatial queue, cell transmission, or link transmission.  Per timestep a
//! link answers two questions — how many vehicles *could* leave (sending
//! flow) and how many *could* enter (receiving flow) — and the node models
//! in `dnl-node` decide how many actually move.

pub mod link;
pub mod model;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use link::{ENTRY_TIME_TOL, Link, LinkParams, PathFlows};
pub use model::{Cell, LinkKind, LinkModel};
