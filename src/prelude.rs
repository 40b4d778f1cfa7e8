//! Common imports for FlowWorks users.

pub use crate::errors::{FwError, FwResult};
pub use fw_cfg::{
    BinaryOp, Block, BlockId, Cfg, CfgBuilder, CfgError, ExceptionTag, FlowRule, Literal, NodeId,
    NodeKind, SpecialKind, TreeId, UnaryOp, UnderlyingAst, VarId,
};
pub use fw_dataflow::{
    AbstractValue, AnalysisError, BackwardAnalysis, BackwardTransfer, Dataflow, Direction,
    ForwardAnalysis, ForwardTransfer, Store, StoreKind, TransferFunction, TransferInput,
    TransferResult,
};
