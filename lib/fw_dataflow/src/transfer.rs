//! Transfer function contracts.

use crate::errors::AnalysisError;
use crate::flow::{TransferInput, TransferResult};
use crate::lattice::{AbstractValue, Store};
use fw_cfg::{Cfg, NodeId, UnderlyingAst, VarId};

/// A dataflow transfer function.
///
/// The function is a visitor over node variants: implementations match on
/// `cfg.node(node).kind()` and derive the outgoing store(s) from the
/// incoming one. The input is passed by value; mutating it in place and
/// returning it is the expected style, and the engine keeps its own copies
/// of whatever it must preserve.
pub trait TransferFunction {
    type Value: AbstractValue;
    type Store: Store;
    type Error: Into<AnalysisError>;

    /// Applies the node's effect to the incoming store.
    ///
    /// # Errors
    ///
    /// Returns a `Self::Error` when the node cannot be transferred over
    /// the given store; the failure aborts the running analysis.
    fn transfer_node(
        &mut self,
        node: NodeId,
        cfg: &Cfg,
        input: TransferInput<Self::Store>,
    ) -> Result<TransferResult<Self::Value, Self::Store>, Self::Error>;
}

/// Initial-store hook of forward analyses.
pub trait ForwardTransfer: TransferFunction {
    /// Store seeded at the entry block.
    fn initial_store(&mut self, ast: &UnderlyingAst, parameters: &[VarId]) -> Self::Store;
}

/// Initial-store hooks of backward analyses.
pub trait BackwardTransfer: TransferFunction {
    /// Store seeded at the regular exit block.
    fn initial_normal_exit_store(
        &mut self,
        ast: &UnderlyingAst,
        return_nodes: &[NodeId],
    ) -> Self::Store;

    /// Store seeded at the exceptional exit block.
    fn initial_exceptional_exit_store(&mut self, ast: &UnderlyingAst) -> Self::Store;
}
