//! Post-analysis query layer.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::flow::{Direction, TransferInput, TransferResult};
use crate::lattice::{AbstractValue, Store};
use crate::transfer::TransferFunction;
use fw_cfg::{Block, BlockId, Cfg, NodeId, TreeId, VarId};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StorePoint {
    Before,
    After,
}

/// Result object of a finished analysis.
///
/// Retains the final per-block inputs and node values and answers
/// before/after queries at arbitrary nodes by replaying the transfer
/// function across the containing block, memoizing one transfer result
/// per node. Queries on blocks the solver never reached return `None`.
pub struct Dataflow<'c, T: TransferFunction> {
    pub(crate) cfg: &'c Cfg,
    pub(crate) transfer: T,
    pub(crate) direction: Direction,
    pub(crate) node_values: BTreeMap<NodeId, T::Value>,
    pub(crate) stores: BTreeMap<BlockId, TransferInput<T::Store>>,
    pub(crate) final_local_values: BTreeMap<VarId, T::Value>,
    pub(crate) return_results: BTreeMap<NodeId, TransferResult<T::Value, T::Store>>,
    pub(crate) exception_stores: BTreeMap<BlockId, T::Store>,
    pub(crate) entry_store: Option<T::Store>,
    pub(crate) cache: BTreeMap<BlockId, BTreeMap<NodeId, TransferResult<T::Value, T::Store>>>,
}

impl<'c, T: TransferFunction> Dataflow<'c, T> {
    #[must_use]
    pub fn cfg(&self) -> &'c Cfg {
        self.cfg
    }

    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Abstract value computed for the node, if any.
    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&T::Value> {
        self.node_values.get(&node)
    }

    /// Join of the values of every node produced from the tree.
    #[must_use]
    pub fn tree_value(&self, tree: TreeId) -> Option<T::Value> {
        let nodes = self.cfg.nodes_for_tree(tree)?;
        let mut merged: Option<T::Value> = None;
        for node in nodes {
            if let Some(value) = self.node_values.get(node) {
                merged = Some(match merged {
                    Some(merged) => merged.least_upper_bound(value),
                    None => value.clone(),
                });
            }
        }
        merged
    }

    #[must_use]
    pub fn nodes_for_tree(&self, tree: TreeId) -> Option<&BTreeSet<NodeId>> {
        self.cfg.nodes_for_tree(tree)
    }

    /// Values of assignments to effectively final locals.
    #[must_use]
    pub fn final_local_values(&self) -> &BTreeMap<VarId, T::Value> {
        &self.final_local_values
    }

    /// Transfer results recorded at return nodes; meaningful for forward
    /// analyses.
    #[must_use]
    pub fn return_statement_stores(&self) -> &BTreeMap<NodeId, TransferResult<T::Value, T::Store>> {
        &self.return_results
    }

    /// Store that reached the entry; meaningful for backward analyses.
    #[must_use]
    pub fn entry_store(&self) -> Option<&T::Store> {
        self.entry_store.as_ref()
    }

    /// Store immediately before the node.
    ///
    /// # Errors
    ///
    /// Fails when a replayed transfer fails, or on the contract violation
    /// of a node missing from its own block.
    pub fn store_before(&mut self, node: NodeId) -> AnalysisResult<Option<T::Store>> {
        self.run_analysis_for(node, StorePoint::Before)
    }

    /// Store immediately after the node.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`store_before`](Dataflow::store_before).
    pub fn store_after(&mut self, node: NodeId) -> AnalysisResult<Option<T::Store>> {
        self.run_analysis_for(node, StorePoint::After)
    }

    /// Join of the before stores of every node produced from the tree.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`store_before`](Dataflow::store_before).
    pub fn tree_store_before(&mut self, tree: TreeId) -> AnalysisResult<Option<T::Store>> {
        self.tree_store(tree, StorePoint::Before)
    }

    /// Join of the after stores of every node produced from the tree.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`store_before`](Dataflow::store_before).
    pub fn tree_store_after(&mut self, tree: TreeId) -> AnalysisResult<Option<T::Store>> {
        self.tree_store(tree, StorePoint::After)
    }

    fn tree_store(&mut self, tree: TreeId, point: StorePoint) -> AnalysisResult<Option<T::Store>> {
        let Some(nodes) = self.cfg.nodes_for_tree(tree) else {
            return Ok(None);
        };
        let nodes: Vec<NodeId> = nodes.iter().copied().collect();
        let mut merged: Option<T::Store> = None;
        for node in nodes {
            if let Some(store) = self.run_analysis_for(node, point)? {
                merged = Some(match merged {
                    Some(merged) => merged.least_upper_bound(&store),
                    None => store,
                });
            }
        }
        Ok(merged)
    }

    /// Store at the start of the block: the before store of its first
    /// node, or the recorded input for nodeless blocks.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`store_before`](Dataflow::store_before).
    pub fn block_store_before(&mut self, block: BlockId) -> AnalysisResult<Option<T::Store>> {
        match self.cfg.block(block).nodes().first().copied() {
            Some(node) => self.store_before(node),
            None => Ok(self.stores.get(&block).map(TransferInput::regular_store)),
        }
    }

    /// Store at the end of the block: the after store of its last node,
    /// or the recorded input for nodeless blocks.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`store_before`](Dataflow::store_before).
    pub fn block_store_after(&mut self, block: BlockId) -> AnalysisResult<Option<T::Store>> {
        match self.cfg.block(block).nodes().last().copied() {
            Some(node) => self.store_after(node),
            None => Ok(self.stores.get(&block).map(TransferInput::regular_store)),
        }
    }

    fn run_analysis_for(
        &mut self,
        node: NodeId,
        point: StorePoint,
    ) -> AnalysisResult<Option<T::Store>> {
        let block = self.cfg.node(node).block();
        let Some(input) = self.stores.get(&block).cloned() else {
            return Ok(None);
        };
        match self.direction {
            Direction::Forward => self.replay_forward(block, input, node, point).map(Some),
            Direction::Backward => self.replay_backward(block, input, node, point).map(Some),
        }
    }

    fn replay_forward(
        &mut self,
        block: BlockId,
        input: TransferInput<T::Store>,
        target: NodeId,
        point: StorePoint,
    ) -> AnalysisResult<T::Store> {
        let cfg = self.cfg;
        let mut input = input;
        for &node in cfg.block(block).nodes() {
            if node == target && point == StorePoint::Before {
                return Ok(input.regular_store());
            }
            let result = self.cached_transfer(block, node, input)?;
            if node == target {
                return Ok(result.regular_store());
            }
            input = result.into_stores();
        }
        Err(AnalysisError::NodeNotInBlock {
            node: target,
            block,
        })
    }

    fn replay_backward(
        &mut self,
        block: BlockId,
        input: TransferInput<T::Store>,
        target: NodeId,
        point: StorePoint,
    ) -> AnalysisResult<T::Store> {
        let cfg = self.cfg;
        let mut store = input.regular_store();
        for &node in cfg.block(block).nodes().iter().rev() {
            if node == target && point == StorePoint::After {
                return Ok(store);
            }
            let result = self.cached_transfer(block, node, TransferInput::Regular(store))?;
            let mut before = result.regular_store();
            if node == target {
                // Before an exception block the accumulated exception
                // store applies as well.
                if matches!(cfg.block(block), Block::Exception(_)) {
                    if let Some(exception_store) = self.exception_stores.get(&block) {
                        before = before.least_upper_bound(exception_store);
                    }
                }
                return Ok(before);
            }
            store = before;
        }
        Err(AnalysisError::NodeNotInBlock {
            node: target,
            block,
        })
    }

    fn cached_transfer(
        &mut self,
        block: BlockId,
        node: NodeId,
        input: TransferInput<T::Store>,
    ) -> AnalysisResult<TransferResult<T::Value, T::Store>> {
        if let Some(result) = self.cache.get(&block).and_then(|results| results.get(&node)) {
            return Ok(result.clone());
        }
        let result = self
            .transfer
            .transfer_node(node, self.cfg, input)
            .map_err(Into::into)?;
        self.cache
            .entry(block)
            .or_default()
            .insert(node, result.clone());
        Ok(result)
    }
}
