//! Control flow graph construction errors.

use crate::blocks::BlockId;
use crate::nodes::NodeId;
use thiserror::Error;

pub type CfgResult<T> = Result<T, CfgError>;

#[derive(Debug, Error)]
pub enum CfgError {
    #[error("regular block {0} has no nodes")]
    EmptyBlock(BlockId),

    #[error("block {0} must have exactly one successor")]
    BadNormalSuccessor(BlockId),

    #[error("conditional block {0} must have exactly one then successor and one else successor")]
    BadBranchSuccessors(BlockId),

    #[error("block {0} cannot carry {1} edges")]
    ForbiddenEdge(BlockId, &'static str),

    #[error("exit block {0} cannot have successors")]
    ExitSuccessor(BlockId),

    #[error("node {0} is placed in more than one block")]
    NodeReused(NodeId),

    #[error("node {0} is not placed in any block")]
    NodeUnplaced(NodeId),

    #[error("block {0} does not carry a {1} flow rule")]
    FlowRuleKind(BlockId, &'static str),

    #[error("code block graphs take no formal parameters")]
    UnexpectedParameter,
}
