//! Control flow graph view for the FlowWorks dataflow analyses.
//!
//! This crate defines the block and node taxonomy the analysis engine
//! operates over, together with a validating [`CfgBuilder`]. Building a
//! graph from source trees is the job of a front end; this crate only
//! materializes an already-planned graph and freezes it.

pub mod blocks;
pub mod builder;
pub mod errors;
pub mod graph;
pub mod nodes;

pub use blocks::{
    Block, BlockId, ConditionalBlock, Edge, ExceptionBlock, ExceptionTag, FlowRule, RegularBlock,
    SpecialBlock, SpecialKind,
};
pub use builder::CfgBuilder;
pub use errors::{CfgError, CfgResult};
pub use graph::Cfg;
pub use nodes::{
    BinaryOp, Literal, Local, Node, NodeId, NodeKind, TreeId, UnaryOp, UnderlyingAst, VarId,
};
