//! `dnl-node` — node models for the `rust_dnl` traffic engine.
//!
//! Nodes decide how much of each link's sending flow actually crosses to
//! each downstream link per timestep, then move that flow while preserving
//! per-path FIFO.  Seven variants exist: origin and destination centroids,
//! series, diverge, merge, ramp meter, and the dual-ring signalised
//! intersection whose state machine lives in [`signal`].

pub mod error;
pub mod node;
pub mod signal;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{NodeError, NodeResult};
pub use node::{
    DisaggregateFlows, FlowMap, Node, NodeKind, Proportions, RampMeter, TransitionFlows,
};
pub use signal::{Barrier, Phase, Ring, SignalController, SignalParams};
