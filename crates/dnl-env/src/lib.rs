//! `dnl-env` — the RL-facing episode loop for the `rust_dnl` engine.
//!
//! Wraps the fixed corridor in a `reset`/`step` interface with a flat
//! observation vector, clamped configuration-delta actions, and the
//! `TFFT − TSTT` reward signal.

pub mod env;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use env::{Action, Env, STATE_DIM, State};
