use dnl_core::{LinkId, NodeId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("{node}: {kind} node cannot take {got_up} upstream / {got_down} downstream links")]
    Topology {
        node:     NodeId,
        kind:     &'static str,
        got_up:   usize,
        got_down: usize,
    },

    #[error("{node}: merge priority for {link} must be strictly positive")]
    NonPositivePriority { node: NodeId, link: LinkId },

    #[error("{node}: merge priority missing for upstream {link}")]
    MissingPriority { node: NodeId, link: LinkId },

    #[error("{node}: both rings feed {link} in the same sub-phase")]
    ConflictingPhases { node: NodeId, link: LinkId },
}

pub type NodeResult<T> = Result<T, NodeError>;
