//! # FlowWorks
//!
//! `flowworks` is the main crate of the FlowWorks dataflow analysis
//! project. The project is subdivided into multiple crates, `flowworks`
//! acts as entry point by reexporting important structs and functions
//! from those sub-crates. Most of the reexports are done within the
//! [`prelude`] namespace.
//!
//! ## Library basics
//!
//! An analysis runs over a control flow graph assembled with the
//! [`CfgBuilder`](crate::cfg::CfgBuilder) API. The one-call entry points,
//! such as [`live_variables`], wire a transfer function to a solver and
//! return the queryable fixpoint:
//!
//! ```rust
//! use flowworks::prelude::*;
//!
//! let mut builder = CfgBuilder::method("sum");
//! let a = builder.parameter("a");
//! let b = builder.parameter("b");
//! let n_a = builder.node(NodeKind::LocalRef(a));
//! let n_b = builder.node(NodeKind::LocalRef(b));
//! let n_add = builder.node(NodeKind::Binary {
//!     op: BinaryOp::Add,
//!     lhs: n_a,
//!     rhs: n_b,
//! });
//! let n_ret = builder.node(NodeKind::Return {
//!     expression: Some(n_add),
//! });
//! let block = builder.regular_block(vec![n_a, n_b, n_add, n_ret]);
//! builder.edge(builder.entry(), block);
//! builder.edge(block, builder.regular_exit());
//! let cfg = builder.build()?;
//!
//! let mut result = flowworks::live_variables(&cfg)?;
//! let live = result.store_before(n_ret)?.unwrap();
//! assert_eq!(live.live_vars().len(), 2);
//! # Ok::<(), FwError>(())
//! ```
//!
//! Custom analyses implement the [`TransferFunction`] contract from
//! [`fw_dataflow`] over their own store and value lattices, and run it
//! through a [`ForwardAnalysis`](crate::dataflow::ForwardAnalysis) or a
//! [`BackwardAnalysis`](crate::dataflow::BackwardAnalysis).
//!
//! ## Sub-crates
//!
//!  - [`fw_cfg`] contains the control flow graph view: the block and node
//!    taxonomy, flow rules, exception tags, and the validating builder,
//!  - [`fw_dataflow`] contains the engine: lattice and transfer
//!    contracts, the forward and backward worklist solvers, widening,
//!    and the post-analysis query layer.
//!
//! [`TransferFunction`]: crate::dataflow::TransferFunction

pub mod errors;
pub mod prelude;

pub use fw_cfg as cfg;
pub use fw_dataflow as dataflow;

use crate::cfg::Cfg;
use crate::dataflow::livevar::LiveVarTransfer;
use crate::dataflow::{AnalysisResult, BackwardAnalysis, Dataflow};

/// Runs a live variable analysis over the given graph and returns the
/// queryable fixpoint.
///
/// # Errors
///
/// This function may generate errors raised by the backward solver, for
/// example when neither exit of the graph is reachable.
pub fn live_variables(cfg: &Cfg) -> AnalysisResult<Dataflow<'_, LiveVarTransfer>> {
    let mut analysis = BackwardAnalysis::new(cfg, LiveVarTransfer::new());
    analysis.perform_analysis()?;
    Ok(analysis.into_result())
}
