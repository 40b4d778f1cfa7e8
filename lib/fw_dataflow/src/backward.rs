//! Backward dataflow fixpoint solver.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::flow::{Direction, TransferInput, TransferResult};
use crate::lattice::{AbstractValue, Store};
use crate::result::Dataflow;
use crate::transfer::BackwardTransfer;
use crate::worklist::Worklist;
use fw_cfg::{Block, BlockId, Cfg, FlowRule, NodeId, NodeKind, SpecialKind, VarId};
use std::collections::BTreeMap;

/// Backward worklist solver threading stores from the exits toward the
/// entry.
///
/// Exceptional edges lose their cause tags in this direction: every
/// exception block accumulates a single exception store folded over all
/// of its exceptional successors.
pub struct BackwardAnalysis<'c, T: BackwardTransfer> {
    cfg: &'c Cfg,
    transfer: T,
    worklist: Worklist,
    inputs: BTreeMap<BlockId, TransferInput<T::Store>>,
    out_stores: BTreeMap<BlockId, T::Store>,
    exception_stores: BTreeMap<BlockId, T::Store>,
    node_values: BTreeMap<NodeId, T::Value>,
    final_local_values: BTreeMap<VarId, T::Value>,
    return_results: BTreeMap<NodeId, TransferResult<T::Value, T::Store>>,
    entry_store: Option<T::Store>,
    is_running: bool,
}

impl<'c, T: BackwardTransfer> BackwardAnalysis<'c, T> {
    pub fn new(cfg: &'c Cfg, transfer: T) -> Self {
        Self {
            cfg,
            transfer,
            worklist: Worklist::backward(cfg),
            inputs: BTreeMap::new(),
            out_stores: BTreeMap::new(),
            exception_stores: BTreeMap::new(),
            node_values: BTreeMap::new(),
            final_local_values: BTreeMap::new(),
            return_results: BTreeMap::new(),
            entry_store: None,
            is_running: false,
        }
    }

    #[must_use]
    pub fn cfg(&self) -> &'c Cfg {
        self.cfg
    }

    /// Abstract value computed for the node, if any.
    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&T::Value> {
        self.node_values.get(&node)
    }

    /// Store that reached the entry block, once the fixpoint is reached.
    #[must_use]
    pub fn entry_store(&self) -> Option<&T::Store> {
        self.entry_store.as_ref()
    }

    /// Runs the solver to its fixpoint.
    ///
    /// # Errors
    ///
    /// Fails when neither exit is reachable, when a block carries a flow
    /// rule other than each-to-each, and on transfer function failures.
    pub fn perform_analysis(&mut self) -> AnalysisResult<()> {
        if self.is_running {
            return Err(AnalysisError::AlreadyRunning);
        }
        self.is_running = true;
        let outcome = self.run();
        self.is_running = false;
        outcome
    }

    /// Consumes the finished solver into its queryable result.
    #[must_use]
    pub fn into_result(self) -> Dataflow<'c, T> {
        Dataflow {
            cfg: self.cfg,
            transfer: self.transfer,
            direction: Direction::Backward,
            node_values: self.node_values,
            stores: self.inputs,
            final_local_values: self.final_local_values,
            return_results: self.return_results,
            exception_stores: self.exception_stores,
            entry_store: self.entry_store,
            cache: BTreeMap::new(),
        }
    }

    fn run(&mut self) -> AnalysisResult<()> {
        self.init()?;
        while let Some(block) = self.worklist.pop() {
            log::debug!("---- block {block}");
            self.perform_block(block)?;
        }
        Ok(())
    }

    fn init(&mut self) -> AnalysisResult<()> {
        self.worklist = Worklist::backward(self.cfg);
        self.inputs.clear();
        self.out_stores.clear();
        self.exception_stores.clear();
        self.node_values.clear();
        self.final_local_values.clear();
        self.return_results.clear();
        self.entry_store = None;

        let mut seeded = false;
        let regular_exit = self.cfg.regular_exit_block();
        if self.worklist.is_reachable(regular_exit) {
            let store = self
                .transfer
                .initial_normal_exit_store(self.cfg.underlying_ast(), self.cfg.return_nodes());
            log::debug!("normal exit store: {store}");
            self.out_stores.insert(regular_exit, store.clone());
            self.inputs
                .insert(regular_exit, TransferInput::Regular(store));
            self.worklist.push(regular_exit);
            seeded = true;
        }
        let exceptional_exit = self.cfg.exceptional_exit_block();
        if self.worklist.is_reachable(exceptional_exit) {
            let store = self
                .transfer
                .initial_exceptional_exit_store(self.cfg.underlying_ast());
            log::debug!("exceptional exit store: {store}");
            self.out_stores.insert(exceptional_exit, store.clone());
            self.inputs
                .insert(exceptional_exit, TransferInput::Regular(store));
            self.worklist.push(exceptional_exit);
            seeded = true;
        }
        if !seeded {
            return Err(AnalysisError::NoReachableExit);
        }
        Ok(())
    }

    fn input(&self, block: BlockId) -> AnalysisResult<TransferInput<T::Store>> {
        self.inputs
            .get(&block)
            .cloned()
            .ok_or_else(|| AnalysisError::Internal(format!("no input recorded for block {block}")))
    }

    fn perform_block(&mut self, id: BlockId) -> AnalysisResult<()> {
        let cfg = self.cfg;
        match cfg.block(id) {
            Block::Regular(b) => {
                Self::ensure_each_to_each(id, b.flow_rule())?;
                let mut input = self.input(id)?;
                for &node in b.nodes().iter().rev() {
                    let result = self.call_transfer(node, input)?;
                    input = TransferInput::Regular(result.regular_store());
                }
                let store = input.regular_store();
                for pred in cfg.predecessors(id) {
                    self.add_store_after(pred, id, store.clone());
                }
            }
            Block::Conditional(_) => {
                let input = self.input(id)?;
                let store = input.regular_store();
                for pred in cfg.predecessors(id) {
                    self.add_store_after(pred, id, store.clone());
                }
            }
            Block::Exception(b) => {
                let input = self.input(id)?;
                let result = self.call_transfer(b.node(), input)?;
                // All exceptional successor contributions were folded into
                // one store; the cause tags are gone in this direction.
                let mut store = result.regular_store();
                if let Some(exception_store) = self.exception_stores.get(&id) {
                    store = store.least_upper_bound(exception_store);
                }
                for pred in cfg.predecessors(id) {
                    self.add_store_after(pred, id, store.clone());
                }
            }
            Block::Special(b) => match b.kind() {
                SpecialKind::Entry => {
                    self.entry_store = self.out_stores.get(&id).cloned();
                }
                SpecialKind::Exit | SpecialKind::ExceptionalExit => {
                    Self::ensure_each_to_each(id, b.flow_rule())?;
                    let input = self.input(id)?;
                    let store = input.regular_store();
                    for pred in cfg.predecessors(id) {
                        self.add_store_after(pred, id, store.clone());
                    }
                }
            },
        }
        Ok(())
    }

    fn ensure_each_to_each(block: BlockId, rule: FlowRule) -> AnalysisResult<()> {
        if rule == FlowRule::EachToEach {
            Ok(())
        } else {
            Err(AnalysisError::BackwardFlowRule { block, rule })
        }
    }

    fn call_transfer(
        &mut self,
        node: NodeId,
        input: TransferInput<T::Store>,
    ) -> AnalysisResult<TransferResult<T::Value, T::Store>> {
        log::trace!("transfer node {node}");
        log::trace!("    after:  {}", input.regular_store());
        let result = self
            .transfer
            .transfer_node(node, self.cfg, input)
            .map_err(Into::into)?;
        log::trace!("    before: {}", result.regular_store());

        if let Some(value) = result.value() {
            let merged = match self.node_values.get(&node) {
                Some(old) => old.least_upper_bound(value),
                None => value.clone(),
            };
            self.node_values.insert(node, merged);
        }
        match self.cfg.node(node).kind() {
            NodeKind::Return { .. } => {
                self.return_results.insert(node, result.clone());
            }
            NodeKind::Assign { target, .. } => {
                if let NodeKind::LocalRef(var) = self.cfg.node(*target).kind() {
                    if self.cfg.local(*var).is_effectively_final() {
                        if let Some(value) = result.value() {
                            self.final_local_values.insert(*var, value.clone());
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(result)
    }

    /// Merges a store flowing out of block `from` into the right bucket
    /// of the predecessor: the accumulated exception store when `from` is
    /// one of the predecessor's exceptional successors, the out store
    /// otherwise. Exceptional contributions never touch the
    /// predecessor's input; the exception block folds them in after its
    /// own node transfer.
    fn add_store_after(&mut self, pred: BlockId, from: BlockId, store: T::Store) {
        if self.cfg.is_exceptional_successor(pred, from) {
            let previous = self.exception_stores.get(&pred);
            let merged = match previous {
                Some(previous) => store.least_upper_bound(previous),
                None => store,
            };
            if previous != Some(&merged) {
                log::trace!("exception store of block {pred} updated: {merged}");
                self.exception_stores.insert(pred, merged);
                self.worklist.push(pred);
            }
        } else {
            let previous = self.out_stores.get(&pred);
            let merged = match previous {
                Some(previous) => store.least_upper_bound(previous),
                None => store,
            };
            if previous != Some(&merged) {
                log::trace!("store of block {pred} updated: {merged}");
                self.out_stores.insert(pred, merged.clone());
                self.inputs.insert(pred, TransferInput::Regular(merged));
                self.worklist.push(pred);
            }
        }
    }
}
