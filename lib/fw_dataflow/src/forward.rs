//! Forward dataflow fixpoint solver.

use crate::errors::{AnalysisError, AnalysisResult};
use crate::flow::{Direction, StoreKind, TransferInput, TransferResult};
use crate::lattice::{AbstractValue, Store};
use crate::result::Dataflow;
use crate::transfer::ForwardTransfer;
use crate::widening::WideningController;
use crate::worklist::Worklist;
use fw_cfg::{Block, BlockId, Cfg, FlowRule, NodeId, NodeKind, VarId};
use std::collections::BTreeMap;

/// Joins a newly propagated store into the previous one at a block
/// boundary, widening instead when the widening controller asked for it.
///
/// # Errors
///
/// Returns [`AnalysisError::WideningUnsupported`] when widening is
/// requested but the store lattice does not implement it.
fn merge_stores<S: Store>(new: S, previous: Option<&S>, widen: bool) -> AnalysisResult<S> {
    match previous {
        None => Ok(new),
        Some(previous) if widen => new
            .widened_upper_bound(previous)
            .ok_or(AnalysisError::WideningUnsupported),
        Some(previous) => Ok(new.least_upper_bound(previous)),
    }
}

/// Forward worklist solver threading stores from the entry toward the
/// exits.
///
/// The analysis owns all per-block state; a finished run is turned into a
/// queryable [`Dataflow`] with [`into_result`](ForwardAnalysis::into_result).
pub struct ForwardAnalysis<'c, T: ForwardTransfer> {
    cfg: &'c Cfg,
    transfer: T,
    widening: WideningController,
    worklist: Worklist,
    inputs: BTreeMap<BlockId, TransferInput<T::Store>>,
    then_stores: BTreeMap<BlockId, T::Store>,
    else_stores: BTreeMap<BlockId, T::Store>,
    node_values: BTreeMap<NodeId, T::Value>,
    final_local_values: BTreeMap<VarId, T::Value>,
    return_results: BTreeMap<NodeId, TransferResult<T::Value, T::Store>>,
    is_running: bool,
}

impl<'c, T: ForwardTransfer> ForwardAnalysis<'c, T> {
    /// Creates a solver over the given graph.
    ///
    /// `max_count_before_widening` bounds the number of plain joins per
    /// block before merges switch to the widened join; pass `-1` for
    /// lattices of finite height.
    pub fn new(cfg: &'c Cfg, transfer: T, max_count_before_widening: i32) -> Self {
        Self {
            cfg,
            transfer,
            widening: WideningController::new(max_count_before_widening),
            worklist: Worklist::forward(cfg),
            inputs: BTreeMap::new(),
            then_stores: BTreeMap::new(),
            else_stores: BTreeMap::new(),
            node_values: BTreeMap::new(),
            final_local_values: BTreeMap::new(),
            return_results: BTreeMap::new(),
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

    /// Transfer results recorded at return nodes.
    #[must_use]
    pub fn return_statement_stores(&self) -> &BTreeMap<NodeId, TransferResult<T::Value, T::Store>> {
        &self.return_results
    }

    /// Runs the solver to its fixpoint.
    ///
    /// # Errors
    ///
    /// Fails on engine contract violations and on transfer function
    /// failures; in the latter case the partial state is discarded on the
    /// next run and the solver stays usable.
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
            direction: Direction::Forward,
            node_values: self.node_values,
            stores: self.inputs,
            final_local_values: self.final_local_values,
            return_results: self.return_results,
            exception_stores: BTreeMap::new(),
            entry_store: None,
            cache: BTreeMap::new(),
        }
    }

    fn run(&mut self) -> AnalysisResult<()> {
        self.init();
        while let Some(block) = self.worklist.pop() {
            log::debug!("---- block {block}");
            self.perform_block(block)?;
        }
        Ok(())
    }

    fn init(&mut self) {
        self.worklist = Worklist::forward(self.cfg);
        self.inputs.clear();
        self.then_stores.clear();
        self.else_stores.clear();
        self.node_values.clear();
        self.final_local_values.clear();
        self.return_results.clear();
        self.widening.reset();

        let entry = self.cfg.entry_block();
        let initial = self
            .transfer
            .initial_store(self.cfg.underlying_ast(), self.cfg.parameters());
        log::debug!("initial store: {initial}");
        self.then_stores.insert(entry, initial.clone());
        self.else_stores.insert(entry, initial.clone());
        self.inputs.insert(entry, TransferInput::Regular(initial));
        self.worklist.push(entry);
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
                let mut input = self.input(id)?;
                for &node in b.nodes() {
                    let result = self.call_transfer(node, input)?;
                    input = result.into_stores();
                }
                let succ = self.normal_successor(id)?;
                self.propagate_stores_to(succ, input, b.flow_rule())?;
            }
            Block::Conditional(b) => {
                let input = self.input(id)?;
                let then_succ = cfg.then_successor(id).ok_or_else(|| {
                    AnalysisError::Internal(format!("block {id} has no then successor"))
                })?;
                let else_succ = cfg.else_successor(id).ok_or_else(|| {
                    AnalysisError::Internal(format!("block {id} has no else successor"))
                })?;
                self.propagate_stores_to(then_succ, input.clone(), b.then_flow_rule())?;
                self.propagate_stores_to(else_succ, input, b.else_flow_rule())?;
            }
            Block::Exception(b) => {
                let input = self.input(id)?;
                let store_before = input.regular_store();
                let result = self.call_transfer(b.node(), input)?;
                let succ = self.normal_successor(id)?;
                self.propagate_stores_to(succ, result.stores().clone(), b.flow_rule())?;
                for (tag, successors) in cfg.exceptional_successors(id) {
                    // A node may complete abruptly before any of its
                    // effects happened, so the fallback is the store at
                    // block entry, not the transfer output.
                    let store = match result.exceptional_store(&tag) {
                        Some(store) => store.clone(),
                        None => store_before.clone(),
                    };
                    for succ in successors {
                        self.add_store_before(succ, store.clone(), StoreKind::Both)?;
                    }
                }
            }
            Block::Special(b) => {
                if let Some(input) = self.inputs.get(&id).cloned() {
                    if let Some(succ) = cfg.normal_successor(id) {
                        self.propagate_stores_to(succ, input, b.flow_rule())?;
                    }
                }
            }
        }
        Ok(())
    }

    fn normal_successor(&self, block: BlockId) -> AnalysisResult<BlockId> {
        self.cfg.normal_successor(block).ok_or_else(|| {
            AnalysisError::Internal(format!("block {block} has no normal successor"))
        })
    }

    fn call_transfer(
        &mut self,
        node: NodeId,
        input: TransferInput<T::Store>,
    ) -> AnalysisResult<TransferResult<T::Value, T::Store>> {
        log::trace!("transfer node {node}");
        log::trace!("    before: {}", input.regular_store());
        let result = self
            .transfer
            .transfer_node(node, self.cfg, input)
            .map_err(Into::into)?;
        log::trace!("    after:  {}", result.regular_store());

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

    fn propagate_stores_to(
        &mut self,
        succ: BlockId,
        input: TransferInput<T::Store>,
        rule: FlowRule,
    ) -> AnalysisResult<()> {
        match rule {
            FlowRule::EachToEach => match input {
                TransferInput::Regular(store) => {
                    self.add_store_before(succ, store, StoreKind::Both)
                }
                TransferInput::Split { then, els } => {
                    self.add_store_before(succ, then, StoreKind::Then)?;
                    self.add_store_before(succ, els, StoreKind::Else)
                }
            },
            FlowRule::ThenToBoth => {
                self.add_store_before(succ, input.into_then_store(), StoreKind::Both)
            }
            FlowRule::ElseToBoth => {
                self.add_store_before(succ, input.into_else_store(), StoreKind::Both)
            }
            FlowRule::ThenToThen => {
                self.add_store_before(succ, input.into_then_store(), StoreKind::Then)
            }
            FlowRule::ElseToElse => {
                self.add_store_before(succ, input.into_else_store(), StoreKind::Else)
            }
        }
    }

    fn add_store_before(
        &mut self,
        block: BlockId,
        store: T::Store,
        kind: StoreKind,
    ) -> AnalysisResult<()> {
        let widen = self.widening.should_widen(block);
        match kind {
            // The common case keeps then and else shared: both sides are
            // equal, so one merge updates both.
            StoreKind::Both
                if self.then_stores.get(&block) == self.else_stores.get(&block) =>
            {
                let previous = self.then_stores.get(&block);
                let merged = merge_stores(store, previous, widen)?;
                if previous != Some(&merged) {
                    log::trace!("store of block {block} updated: {merged}");
                    self.then_stores.insert(block, merged.clone());
                    self.else_stores.insert(block, merged.clone());
                    self.inputs.insert(block, TransferInput::Regular(merged));
                    self.worklist.push(block);
                }
            }
            StoreKind::Both => {
                let new_then = merge_stores(store.clone(), self.then_stores.get(&block), widen)?;
                let new_else = merge_stores(store, self.else_stores.get(&block), widen)?;
                let changed = self.then_stores.get(&block) != Some(&new_then)
                    || self.else_stores.get(&block) != Some(&new_else);
                if changed {
                    self.then_stores.insert(block, new_then.clone());
                    self.else_stores.insert(block, new_else.clone());
                    self.inputs.insert(
                        block,
                        TransferInput::Split {
                            then: new_then,
                            els: new_else,
                        },
                    );
                    self.worklist.push(block);
                }
            }
            StoreKind::Then => {
                let new_then = merge_stores(store, self.then_stores.get(&block), widen)?;
                if self.then_stores.get(&block) != Some(&new_then) {
                    self.then_stores.insert(block, new_then.clone());
                    // The block becomes processable only once both sides
                    // have arrived.
                    if let Some(els) = self.else_stores.get(&block).cloned() {
                        self.inputs.insert(
                            block,
                            TransferInput::Split {
                                then: new_then,
                                els,
                            },
                        );
                        self.worklist.push(block);
                    }
                }
            }
            StoreKind::Else => {
                let new_else = merge_stores(store, self.else_stores.get(&block), widen)?;
                if self.else_stores.get(&block) != Some(&new_else) {
                    self.else_stores.insert(block, new_else.clone());
                    if let Some(then) = self.then_stores.get(&block).cloned() {
                        self.inputs.insert(
                            block,
                            TransferInput::Split {
                                then,
                                els: new_else,
                            },
                        );
                        self.worklist.push(block);
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferFunction;
    use fw_cfg::{CfgBuilder, ExceptionTag, Literal, UnderlyingAst};
    use std::collections::BTreeSet;
    use std::convert::Infallible;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq, Default)]
    struct TagStore(BTreeSet<String>);

    impl TagStore {
        fn with(mut self, tag: &str) -> Self {
            self.0.insert(tag.to_string());
            self
        }

        fn of(tags: &[&str]) -> Self {
            Self(tags.iter().map(|t| (*t).to_string()).collect())
        }
    }

    impl fmt::Display for TagStore {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{:?}", self.0)
        }
    }

    impl Store for TagStore {
        fn least_upper_bound(&self, other: &Self) -> Self {
            Self(self.0.union(&other.0).cloned().collect())
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    struct TagValue(BTreeSet<String>);

    impl AbstractValue for TagValue {
        fn least_upper_bound(&self, other: &Self) -> Self {
            Self(self.0.union(&other.0).cloned().collect())
        }
    }

    /// Records which node variants were crossed; splits on instance-of
    /// checks and raises on calls.
    struct TagTransfer;

    impl TransferFunction for TagTransfer {
        type Value = TagValue;
        type Store = TagStore;
        type Error = Infallible;

        fn transfer_node(
            &mut self,
            node: NodeId,
            cfg: &Cfg,
            input: TransferInput<TagStore>,
        ) -> Result<TransferResult<TagValue, TagStore>, Infallible> {
            let store = input.regular_store();
            let result = match cfg.node(node).kind() {
                NodeKind::LocalRef(var) => {
                    let store = store.with(&var.to_string());
                    let value = TagValue(store.0.clone());
                    TransferResult::regular(store).with_value(value)
                }
                NodeKind::InstanceOf { .. } => {
                    TransferResult::conditional(store.clone().with("then"), store.with("else"))
                }
                NodeKind::Call { .. } => {
                    let mut exceptional = BTreeMap::new();
                    exceptional.insert(ExceptionTag::new("failure"), store.clone().with("raised"));
                    TransferResult::regular(store.with("called"))
                        .with_exceptional_stores(exceptional)
                }
                NodeKind::Throw { .. } => TransferResult::regular(store.with("thrown")),
                NodeKind::Assign { .. } => {
                    let value = TagValue(std::iter::once("assigned".to_string()).collect());
                    TransferResult::regular(store).with_value(value)
                }
                _ => TransferResult::regular(store),
            };
            Ok(result)
        }
    }

    impl ForwardTransfer for TagTransfer {
        fn initial_store(&mut self, _ast: &UnderlyingAst, _parameters: &[VarId]) -> TagStore {
            TagStore::default()
        }
    }

    #[test]
    fn straight_line_threads_stores() {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let y = b.local("y");
        let n1 = b.node(NodeKind::LocalRef(x));
        let n2 = b.node(NodeKind::LocalRef(y));
        let rb1 = b.regular_block(vec![n1]);
        let rb2 = b.regular_block(vec![n2]);
        b.edge(b.entry(), rb1);
        b.edge(rb1, rb2);
        b.edge(rb2, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        assert_eq!(
            analysis.value(n2),
            Some(&TagValue(TagStore::of(&["v0", "v1"]).0))
        );

        let mut result = analysis.into_result();
        assert_eq!(result.store_before(n1).unwrap(), Some(TagStore::default()));
        assert_eq!(result.store_after(n1).unwrap(), Some(TagStore::of(&["v0"])));
        assert_eq!(result.store_before(n2).unwrap(), Some(TagStore::of(&["v0"])));
        assert_eq!(
            result.store_after(n2).unwrap(),
            Some(TagStore::of(&["v0", "v1"]))
        );
        assert_eq!(
            result.block_store_before(cfg.regular_exit_block()).unwrap(),
            Some(TagStore::of(&["v0", "v1"]))
        );
    }

    fn branching_cfg() -> (Cfg, NodeId, NodeId) {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x = b.node(NodeKind::LocalRef(x));
        let n_test = b.node(NodeKind::InstanceOf { operand: n_x });
        let rb = b.regular_block(vec![n_x, n_test]);
        let cond = b.conditional_block();
        let n_then = b.node(NodeKind::Literal(Literal::Bool(true)));
        let rb_then = b.regular_block(vec![n_then]);
        let n_else = b.node(NodeKind::Literal(Literal::Bool(false)));
        let rb_else = b.regular_block(vec![n_else]);
        b.edge(b.entry(), rb);
        b.edge(rb, cond);
        b.then_edge(cond, rb_then);
        b.else_edge(cond, rb_else);
        b.edge(rb_then, b.regular_exit());
        b.edge(rb_else, b.regular_exit());
        (b.build().unwrap(), n_then, n_else)
    }

    #[test]
    fn conditional_split_reaches_matching_branch() {
        let (cfg, n_then, n_else) = branching_cfg();
        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let mut result = analysis.into_result();

        let then_store = result.store_before(n_then).unwrap().unwrap();
        assert!(then_store.0.contains("then"));
        assert!(!then_store.0.contains("else"));

        let else_store = result.store_before(n_else).unwrap().unwrap();
        assert!(else_store.0.contains("else"));
        assert!(!else_store.0.contains("then"));

        let exit_store = result
            .block_store_before(cfg.regular_exit_block())
            .unwrap()
            .unwrap();
        assert!(exit_store.0.contains("then"));
        assert!(exit_store.0.contains("else"));
    }

    #[test]
    fn then_to_then_updates_only_the_then_side() {
        let (cfg, _, _) = branching_cfg();
        let target = cfg
            .then_successor(
                cfg.blocks()
                    .find(|b| matches!(b, Block::Conditional(_)))
                    .unwrap()
                    .id(),
            )
            .unwrap();
        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);

        let split = TransferInput::Split {
            then: TagStore::of(&["t"]),
            els: TagStore::of(&["e"]),
        };
        analysis
            .propagate_stores_to(target, split.clone(), FlowRule::ThenToThen)
            .unwrap();
        assert_eq!(analysis.then_stores.get(&target), Some(&TagStore::of(&["t"])));
        assert_eq!(analysis.else_stores.get(&target), None);
        assert!(analysis.inputs.get(&target).is_none());
        assert_eq!(analysis.worklist.pop(), None);

        analysis
            .propagate_stores_to(target, split, FlowRule::ElseToElse)
            .unwrap();
        assert_eq!(analysis.else_stores.get(&target), Some(&TagStore::of(&["e"])));
        assert!(matches!(
            analysis.inputs.get(&target),
            Some(TransferInput::Split { .. })
        ));
        assert_eq!(analysis.worklist.pop(), Some(target));
    }

    fn exceptional_cfg(call: bool) -> (Cfg, NodeId, NodeId, NodeId) {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x = b.node(NodeKind::LocalRef(x));
        let rb = b.regular_block(vec![n_x]);
        let raising = if call {
            NodeKind::Call {
                receiver: None,
                method: "f".to_string(),
                arguments: vec![],
            }
        } else {
            NodeKind::Throw { expression: n_x }
        };
        let n_raise = b.node(raising);
        let eb = b.exception_block(n_raise);
        let n_ok = b.node(NodeKind::Literal(Literal::Bool(true)));
        let rb_ok = b.regular_block(vec![n_ok]);
        let n_handler = b.node(NodeKind::Literal(Literal::Bool(false)));
        let rb_handler = b.regular_block(vec![n_handler]);
        b.edge(b.entry(), rb);
        b.edge(rb, eb);
        b.edge(eb, rb_ok);
        b.exceptional_edge(eb, ExceptionTag::new("failure"), rb_handler);
        b.edge(rb_ok, b.regular_exit());
        b.edge(rb_handler, b.regular_exit());
        (b.build().unwrap(), n_raise, n_ok, n_handler)
    }

    #[test]
    fn provided_exceptional_store_reaches_the_handler() {
        let (cfg, _, n_ok, n_handler) = exceptional_cfg(true);
        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let mut result = analysis.into_result();

        assert_eq!(
            result.store_before(n_ok).unwrap(),
            Some(TagStore::of(&["v0", "called"]))
        );
        assert_eq!(
            result.store_before(n_handler).unwrap(),
            Some(TagStore::of(&["v0", "raised"]))
        );
    }

    #[test]
    fn missing_exceptional_store_falls_back_to_block_entry() {
        let (cfg, _, n_ok, n_handler) = exceptional_cfg(false);
        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let mut result = analysis.into_result();

        assert_eq!(
            result.store_before(n_ok).unwrap(),
            Some(TagStore::of(&["v0", "thrown"]))
        );
        // The handler sees the state before the throwing node executed.
        assert_eq!(
            result.store_before(n_handler).unwrap(),
            Some(TagStore::of(&["v0"]))
        );
    }

    #[test]
    fn records_return_results() {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x = b.node(NodeKind::LocalRef(x));
        let n_ret = b.node(NodeKind::Return {
            expression: Some(n_x),
        });
        let rb = b.regular_block(vec![n_x, n_ret]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let recorded: Vec<NodeId> = analysis.return_statement_stores().keys().copied().collect();
        assert_eq!(recorded, vec![n_ret]);
        assert!(cfg.return_nodes().contains(&n_ret));
    }

    #[test]
    fn records_effectively_final_local_values() {
        let mut b = CfgBuilder::method("m");
        let t = b.local("t");
        b.mark_effectively_final(t);
        let n_lit = b.node(NodeKind::Literal(Literal::Int(1)));
        let n_target = b.node(NodeKind::LocalRef(t));
        let n_assign = b.node(NodeKind::Assign {
            target: n_target,
            expression: n_lit,
        });
        let rb = b.regular_block(vec![n_lit, n_target, n_assign]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let result = analysis.into_result();
        assert_eq!(
            result.final_local_values().get(&t),
            Some(&TagValue(std::iter::once("assigned".to_string()).collect()))
        );
    }

    #[test]
    fn rerunning_at_the_fixpoint_changes_nothing() {
        let (cfg, _, _) = branching_cfg();
        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, -1);
        analysis.perform_analysis().unwrap();
        let then_stores = analysis.then_stores.clone();
        let else_stores = analysis.else_stores.clone();
        let node_values = analysis.node_values.clone();

        analysis.perform_analysis().unwrap();
        assert_eq!(analysis.then_stores, then_stores);
        assert_eq!(analysis.else_stores, else_stores);
        assert_eq!(analysis.node_values, node_values);
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum CountStore {
        Count(u64),
        Top,
    }

    impl fmt::Display for CountStore {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            match self {
                Self::Count(n) => write!(f, "{n}"),
                Self::Top => write!(f, "top"),
            }
        }
    }

    impl Store for CountStore {
        fn least_upper_bound(&self, other: &Self) -> Self {
            match (self, other) {
                (Self::Count(a), Self::Count(b)) => Self::Count(*a.max(b)),
                _ => Self::Top,
            }
        }

        fn widened_upper_bound(&self, _previous: &Self) -> Option<Self> {
            Some(Self::Top)
        }
    }

    /// Client over an infinite ascending chain: every crossed local read
    /// bumps the counter.
    struct CountTransfer;

    impl TransferFunction for CountTransfer {
        type Value = TagValue;
        type Store = CountStore;
        type Error = Infallible;

        fn transfer_node(
            &mut self,
            node: NodeId,
            cfg: &Cfg,
            input: TransferInput<CountStore>,
        ) -> Result<TransferResult<TagValue, CountStore>, Infallible> {
            let store = match (cfg.node(node).kind(), input.regular_store()) {
                (NodeKind::LocalRef(_), CountStore::Count(n)) => CountStore::Count(n + 1),
                (_, store) => store,
            };
            Ok(TransferResult::regular(store))
        }
    }

    impl ForwardTransfer for CountTransfer {
        fn initial_store(&mut self, _ast: &UnderlyingAst, _parameters: &[VarId]) -> CountStore {
            CountStore::Count(0)
        }
    }

    fn looping_cfg() -> Cfg {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x = b.node(NodeKind::LocalRef(x));
        let rb = b.regular_block(vec![n_x]);
        let cond = b.conditional_block();
        b.edge(b.entry(), rb);
        b.edge(rb, cond);
        b.then_edge(cond, rb);
        b.else_edge(cond, b.regular_exit());
        b.build().unwrap()
    }

    #[test]
    fn widening_terminates_an_infinite_chain() {
        let cfg = looping_cfg();
        let mut analysis = ForwardAnalysis::new(&cfg, CountTransfer, 3);
        analysis.perform_analysis().unwrap();
        let mut result = analysis.into_result();
        assert_eq!(
            result.block_store_before(cfg.regular_exit_block()).unwrap(),
            Some(CountStore::Top)
        );
    }

    #[test]
    fn widening_without_support_is_an_error() {
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x = b.node(NodeKind::LocalRef(x));
        let rb = b.regular_block(vec![n_x]);
        b.edge(b.entry(), rb);
        b.edge(rb, rb);
        let cfg = b.build().unwrap();

        let mut analysis = ForwardAnalysis::new(&cfg, TagTransfer, 0);
        assert!(matches!(
            analysis.perform_analysis(),
            Err(AnalysisError::WideningUnsupported)
        ));
    }
}
