//! Analysis errors definition.

use fw_cfg::{BlockId, FlowRule, NodeId};
use std::convert::Infallible;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis is already running")]
    AlreadyRunning,

    #[error("backward propagation supports only the each-to-each flow rule, found {rule} on block {block}")]
    BackwardFlowRule { block: BlockId, rule: FlowRule },

    #[error("control flow graph has no reachable exit block")]
    NoReachableExit,

    #[error("node {node} is not part of block {block}")]
    NodeNotInBlock { node: NodeId, block: BlockId },

    #[error("store widening was requested but the store lattice does not support it")]
    WideningUnsupported,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("transfer function failure: {0}")]
    Transfer(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl From<Infallible> for AnalysisError {
    fn from(e: Infallible) -> Self {
        match e {}
    }
}
