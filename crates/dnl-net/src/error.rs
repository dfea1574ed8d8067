use dnl_core::NodeId;
use dnl_node::NodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error("no path from {origin} to {destination} departing at t={departure}")]
    NoPath {
        origin:      NodeId,
        destination: NodeId,
        departure:   i64,
    },

    #[error("network validation failed: {0}")]
    Validation(String),
}

pub type NetResult<T> = Result<T, NetError>;
