//! Worklist-based dataflow fixpoint engine for the FlowWorks project.
//!
//! The engine computes, for a control flow graph built with [`fw_cfg`], a
//! fixpoint mapping from every program point to an abstract store and
//! from every expression node to an abstract value. Clients supply the
//! lattice (an [`AbstractValue`] and a [`Store`] implementation) and a
//! [`TransferFunction`]; the engine supplies forward and backward
//! solvers, conditional then/else store threading, exceptional edge
//! propagation, widening for infinite lattices, and a replaying query
//! layer over the finished fixpoint.

pub mod backward;
pub mod errors;
pub mod flow;
pub mod forward;
pub mod lattice;
pub mod livevar;
pub mod result;
pub mod transfer;

mod widening;
mod worklist;

pub use backward::BackwardAnalysis;
pub use errors::{AnalysisError, AnalysisResult};
pub use flow::{Direction, StoreKind, TransferInput, TransferResult};
pub use forward::ForwardAnalysis;
pub use lattice::{AbstractValue, Store};
pub use result::Dataflow;
pub use transfer::{BackwardTransfer, ForwardTransfer, TransferFunction};
