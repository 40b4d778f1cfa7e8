//! Programmatic construction of control flow graphs.

use crate::blocks::{
    Block, BlockId, ConditionalBlock, Edge, ExceptionBlock, ExceptionTag, FlowRule, RegularBlock,
    SpecialBlock, SpecialKind,
};
use crate::errors::{CfgError, CfgResult};
use crate::graph::Cfg;
use crate::nodes::{Local, Node, NodeId, NodeKind, TreeId, UnderlyingAst, VarId};
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
enum AstKind {
    Method(String),
    Lambda,
    ArbitraryCode,
}

struct PendingNode {
    kind: NodeKind,
    tree: Option<TreeId>,
    block: Option<BlockId>,
}

/// Builder assembling a [`Cfg`] block by block.
///
/// Construction is lenient; all structural checks run in [`build`], which
/// reports the first violation. The entry, regular exit and exceptional
/// exit sentinels exist from the start and only need wiring.
///
/// [`build`]: CfgBuilder::build
pub struct CfgBuilder {
    graph: DiGraph<Block, Edge>,
    nodes: Vec<PendingNode>,
    locals: Vec<Local>,
    parameters: Vec<VarId>,
    ast: AstKind,
    next_tree: u32,
    entry: BlockId,
    regular_exit: BlockId,
    exceptional_exit: BlockId,
    violations: Vec<CfgError>,
}

impl CfgBuilder {
    fn new(ast: AstKind) -> Self {
        let mut graph = DiGraph::new();
        let entry = Self::add_special(&mut graph, SpecialKind::Entry);
        let regular_exit = Self::add_special(&mut graph, SpecialKind::Exit);
        let exceptional_exit = Self::add_special(&mut graph, SpecialKind::ExceptionalExit);
        Self {
            graph,
            nodes: Vec::new(),
            locals: Vec::new(),
            parameters: Vec::new(),
            ast,
            next_tree: 0,
            entry,
            regular_exit,
            exceptional_exit,
            violations: Vec::new(),
        }
    }

    fn add_special(graph: &mut DiGraph<Block, Edge>, kind: SpecialKind) -> BlockId {
        let ix = graph.add_node(Block::Special(SpecialBlock {
            id: BlockId(petgraph::graph::NodeIndex::end()),
            kind,
            flow_rule: FlowRule::default(),
        }));
        let id = BlockId(ix);
        if let Block::Special(b) = &mut graph[ix] {
            b.id = id;
        }
        id
    }

    /// Starts the graph of a method body.
    #[must_use]
    pub fn method(name: &str) -> Self {
        Self::new(AstKind::Method(name.to_string()))
    }

    /// Starts the graph of a lambda body.
    #[must_use]
    pub fn lambda() -> Self {
        Self::new(AstKind::Lambda)
    }

    /// Starts the graph of an arbitrary code block.
    #[must_use]
    pub fn arbitrary_code() -> Self {
        Self::new(AstKind::ArbitraryCode)
    }

    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    #[must_use]
    pub fn regular_exit(&self) -> BlockId {
        self.regular_exit
    }

    #[must_use]
    pub fn exceptional_exit(&self) -> BlockId {
        self.exceptional_exit
    }

    /// Declares a local variable.
    pub fn local(&mut self, name: &str) -> VarId {
        let id = VarId(self.locals.len() as u32);
        self.locals.push(Local {
            name: name.to_string(),
            effectively_final: false,
        });
        id
    }

    /// Declares a formal parameter of the underlying method or lambda.
    pub fn parameter(&mut self, name: &str) -> VarId {
        if matches!(self.ast, AstKind::ArbitraryCode) {
            self.violations.push(CfgError::UnexpectedParameter);
        }
        let id = self.local(name);
        self.parameters.push(id);
        id
    }

    /// Flags a local as assigned at most once on every path.
    pub fn mark_effectively_final(&mut self, var: VarId) {
        self.locals[var.index()].effectively_final = true;
    }

    /// Allocates a fresh source tree handle.
    pub fn tree(&mut self) -> TreeId {
        let id = TreeId(self.next_tree);
        self.next_tree += 1;
        id
    }

    /// Creates a node without a source tree.
    pub fn node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PendingNode {
            kind,
            tree: None,
            block: None,
        });
        id
    }

    /// Creates a node attached to a source tree.
    pub fn node_at(&mut self, kind: NodeKind, tree: TreeId) -> NodeId {
        let id = self.node(kind);
        self.nodes[id.index()].tree = Some(tree);
        id
    }

    fn place(&mut self, node: NodeId, block: BlockId) {
        let pending = &mut self.nodes[node.index()];
        if pending.block.is_some() {
            self.violations.push(CfgError::NodeReused(node));
        } else {
            pending.block = Some(block);
        }
    }

    /// Adds a regular block holding the given nodes in execution order.
    pub fn regular_block(&mut self, nodes: Vec<NodeId>) -> BlockId {
        let ix = self.graph.add_node(Block::Regular(RegularBlock {
            id: BlockId(petgraph::graph::NodeIndex::end()),
            nodes: nodes.clone(),
            flow_rule: FlowRule::default(),
        }));
        let id = BlockId(ix);
        if let Block::Regular(b) = &mut self.graph[ix] {
            b.id = id;
        }
        if nodes.is_empty() {
            self.violations.push(CfgError::EmptyBlock(id));
        }
        for node in nodes {
            self.place(node, id);
        }
        id
    }

    /// Adds a conditional block with the default then/else flow rules.
    pub fn conditional_block(&mut self) -> BlockId {
        let ix = self.graph.add_node(Block::Conditional(ConditionalBlock {
            id: BlockId(petgraph::graph::NodeIndex::end()),
            then_flow_rule: FlowRule::ThenToBoth,
            else_flow_rule: FlowRule::ElseToBoth,
        }));
        let id = BlockId(ix);
        if let Block::Conditional(b) = &mut self.graph[ix] {
            b.id = id;
        }
        id
    }

    /// Adds an exception block around the given node.
    pub fn exception_block(&mut self, node: NodeId) -> BlockId {
        let ix = self.graph.add_node(Block::Exception(ExceptionBlock {
            id: BlockId(petgraph::graph::NodeIndex::end()),
            node,
            flow_rule: FlowRule::default(),
        }));
        let id = BlockId(ix);
        if let Block::Exception(b) = &mut self.graph[ix] {
            b.id = id;
        }
        self.place(node, id);
        id
    }

    /// Wires the normal successor edge of a block.
    pub fn edge(&mut self, from: BlockId, to: BlockId) {
        self.graph.add_edge(from.0, to.0, Edge::Normal);
    }

    /// Wires the then successor of a conditional block.
    pub fn then_edge(&mut self, from: BlockId, to: BlockId) {
        self.graph.add_edge(from.0, to.0, Edge::Then);
    }

    /// Wires the else successor of a conditional block.
    pub fn else_edge(&mut self, from: BlockId, to: BlockId) {
        self.graph.add_edge(from.0, to.0, Edge::Else);
    }

    /// Wires an exceptional successor of an exception block for the given
    /// cause tag.
    pub fn exceptional_edge(&mut self, from: BlockId, tag: ExceptionTag, to: BlockId) {
        self.graph.add_edge(from.0, to.0, Edge::Exceptional(tag));
    }

    /// Sets the flow rule of a regular, exception or special block.
    pub fn set_flow_rule(&mut self, block: BlockId, rule: FlowRule) {
        match &mut self.graph[block.0] {
            Block::Regular(b) => b.flow_rule = rule,
            Block::Exception(b) => b.flow_rule = rule,
            Block::Special(b) => b.flow_rule = rule,
            Block::Conditional(_) => {
                self.violations
                    .push(CfgError::FlowRuleKind(block, "single-successor"));
            }
        }
    }

    /// Sets the then flow rule of a conditional block.
    pub fn set_then_flow_rule(&mut self, block: BlockId, rule: FlowRule) {
        match &mut self.graph[block.0] {
            Block::Conditional(b) => b.then_flow_rule = rule,
            _ => self.violations.push(CfgError::FlowRuleKind(block, "then")),
        }
    }

    /// Sets the else flow rule of a conditional block.
    pub fn set_else_flow_rule(&mut self, block: BlockId, rule: FlowRule) {
        match &mut self.graph[block.0] {
            Block::Conditional(b) => b.else_flow_rule = rule,
            _ => self.violations.push(CfgError::FlowRuleKind(block, "else")),
        }
    }

    /// Validates the graph and freezes it.
    ///
    /// # Errors
    ///
    /// Returns the first structural violation: misplaced or missing
    /// successor edges, empty regular blocks, nodes placed in zero or
    /// several blocks, or flow rules applied to the wrong block kind.
    pub fn build(mut self) -> CfgResult<Cfg> {
        self.check_edges();
        if !self.violations.is_empty() {
            return Err(self.violations.remove(0));
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut trees: BTreeMap<TreeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut return_nodes = Vec::new();
        for (index, pending) in self.nodes.into_iter().enumerate() {
            let id = NodeId(index as u32);
            let block = pending.block.ok_or(CfgError::NodeUnplaced(id))?;
            if let Some(tree) = pending.tree {
                trees.entry(tree).or_default().insert(id);
            }
            if matches!(pending.kind, NodeKind::Return { .. }) {
                return_nodes.push(id);
            }
            nodes.push(Node {
                kind: pending.kind,
                block,
                tree: pending.tree,
            });
        }

        let underlying = match self.ast {
            AstKind::Method(name) => UnderlyingAst::Method {
                name,
                parameters: self.parameters,
            },
            AstKind::Lambda => UnderlyingAst::Lambda {
                parameters: self.parameters,
            },
            AstKind::ArbitraryCode => UnderlyingAst::ArbitraryCode,
        };

        Ok(Cfg {
            graph: self.graph,
            nodes,
            locals: self.locals,
            trees,
            entry: self.entry,
            regular_exit: self.regular_exit,
            exceptional_exit: self.exceptional_exit,
            return_nodes,
            underlying,
        })
    }

    fn check_edges(&mut self) {
        for ix in self.graph.node_indices() {
            let id = BlockId(ix);
            let mut normal = 0usize;
            let mut then = 0usize;
            let mut els = 0usize;
            let mut exceptional = 0usize;
            for edge in self.graph.edges(ix) {
                match edge.weight() {
                    Edge::Normal => normal += 1,
                    Edge::Then => then += 1,
                    Edge::Else => els += 1,
                    Edge::Exceptional(_) => exceptional += 1,
                }
            }
            match &self.graph[ix] {
                Block::Regular(_) => {
                    if then + els > 0 {
                        self.violations.push(CfgError::ForbiddenEdge(id, "branch"));
                    }
                    if exceptional > 0 {
                        self.violations
                            .push(CfgError::ForbiddenEdge(id, "exceptional"));
                    }
                    if normal != 1 {
                        self.violations.push(CfgError::BadNormalSuccessor(id));
                    }
                }
                Block::Conditional(_) => {
                    if normal > 0 {
                        self.violations.push(CfgError::ForbiddenEdge(id, "normal"));
                    }
                    if exceptional > 0 {
                        self.violations
                            .push(CfgError::ForbiddenEdge(id, "exceptional"));
                    }
                    if then != 1 || els != 1 {
                        self.violations.push(CfgError::BadBranchSuccessors(id));
                    }
                }
                Block::Exception(_) => {
                    if then + els > 0 {
                        self.violations.push(CfgError::ForbiddenEdge(id, "branch"));
                    }
                    if normal != 1 {
                        self.violations.push(CfgError::BadNormalSuccessor(id));
                    }
                }
                Block::Special(b) => match b.kind {
                    SpecialKind::Entry => {
                        if then + els + exceptional > 0 {
                            self.violations.push(CfgError::ForbiddenEdge(id, "branch"));
                        }
                        if normal != 1 {
                            self.violations.push(CfgError::BadNormalSuccessor(id));
                        }
                    }
                    SpecialKind::Exit | SpecialKind::ExceptionalExit => {
                        if normal + then + els + exceptional > 0 {
                            self.violations.push(CfgError::ExitSuccessor(id));
                        }
                    }
                },
            }
        }
    }
}
