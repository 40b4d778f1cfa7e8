//! Control flow graph representation.

use crate::blocks::{Block, BlockId, Edge, ExceptionTag};
use crate::nodes::{Local, Node, NodeId, TreeId, UnderlyingAst, VarId};
use petgraph::graph::DiGraph;
use petgraph::visit::{DfsPostOrder, EdgeRef};
use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet};

/// An immutable control flow graph of a method-like program unit.
///
/// The graph always contains the three sentinel special blocks (entry,
/// regular exit, exceptional exit); whether an exit is actually reachable
/// is a property of the depth-first order, not of the block's existence.
#[derive(Debug)]
pub struct Cfg {
    pub(crate) graph: DiGraph<Block, Edge>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) locals: Vec<Local>,
    pub(crate) trees: BTreeMap<TreeId, BTreeSet<NodeId>>,
    pub(crate) entry: BlockId,
    pub(crate) regular_exit: BlockId,
    pub(crate) exceptional_exit: BlockId,
    pub(crate) return_nodes: Vec<NodeId>,
    pub(crate) underlying: UnderlyingAst,
}

impl Cfg {
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    #[must_use]
    pub fn regular_exit_block(&self) -> BlockId {
        self.regular_exit
    }

    #[must_use]
    pub fn exceptional_exit_block(&self) -> BlockId {
        self.exceptional_exit
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.graph[id.0]
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn local(&self, id: VarId) -> &Local {
        &self.locals[id.index()]
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.graph.node_weights()
    }

    #[must_use]
    pub fn underlying_ast(&self) -> &UnderlyingAst {
        &self.underlying
    }

    /// Formal parameters of the underlying method or lambda.
    #[must_use]
    pub fn parameters(&self) -> &[VarId] {
        self.underlying.parameters()
    }

    /// All placed return nodes, in placement order.
    #[must_use]
    pub fn return_nodes(&self) -> &[NodeId] {
        &self.return_nodes
    }

    /// Nodes produced from the given source tree.
    #[must_use]
    pub fn nodes_for_tree(&self, tree: TreeId) -> Option<&BTreeSet<NodeId>> {
        self.trees.get(&tree)
    }

    /// The unique successor reached on normal completion.
    #[must_use]
    pub fn normal_successor(&self, block: BlockId) -> Option<BlockId> {
        self.graph
            .edges(block.0)
            .find(|e| matches!(e.weight(), Edge::Normal))
            .map(|e| BlockId(e.target()))
    }

    #[must_use]
    pub fn then_successor(&self, block: BlockId) -> Option<BlockId> {
        self.graph
            .edges(block.0)
            .find(|e| matches!(e.weight(), Edge::Then))
            .map(|e| BlockId(e.target()))
    }

    #[must_use]
    pub fn else_successor(&self, block: BlockId) -> Option<BlockId> {
        self.graph
            .edges(block.0)
            .find(|e| matches!(e.weight(), Edge::Else))
            .map(|e| BlockId(e.target()))
    }

    /// Exceptional successor sets of an exception block, grouped by cause
    /// tag.
    #[must_use]
    pub fn exceptional_successors(
        &self,
        block: BlockId,
    ) -> BTreeMap<ExceptionTag, BTreeSet<BlockId>> {
        let mut successors: BTreeMap<ExceptionTag, BTreeSet<BlockId>> = BTreeMap::new();
        for edge in self.graph.edges(block.0) {
            if let Edge::Exceptional(tag) = edge.weight() {
                successors
                    .entry(tag.clone())
                    .or_default()
                    .insert(BlockId(edge.target()));
            }
        }
        successors
    }

    /// Whether `block` is one of `pred`'s exceptional successors.
    #[must_use]
    pub fn is_exceptional_successor(&self, pred: BlockId, block: BlockId) -> bool {
        self.graph
            .edges_connecting(pred.0, block.0)
            .any(|e| matches!(e.weight(), Edge::Exceptional(_)))
    }

    /// All predecessor blocks, without duplicates.
    #[must_use]
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        let preds: BTreeSet<BlockId> = self
            .graph
            .edges_directed(block.0, Direction::Incoming)
            .map(|e| BlockId(e.source()))
            .collect();
        preds.into_iter().collect()
    }

    /// Blocks reachable from the entry, in depth-first post-order.
    #[must_use]
    pub fn depth_first_postorder(&self) -> Vec<BlockId> {
        let mut order = Vec::with_capacity(self.graph.node_count());
        let mut dfs = DfsPostOrder::new(&self.graph, self.entry.0);
        while let Some(ix) = dfs.next(&self.graph) {
            order.push(BlockId(ix));
        }
        order
    }
}
