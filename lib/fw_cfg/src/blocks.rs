//! Basic block taxonomy, flow rules and edge roles.

use crate::nodes::NodeId;
use petgraph::graph::NodeIndex;
use std::fmt;

/// Unique block identifier.
///
/// Identifiers are stable for the lifetime of a [`Cfg`](crate::Cfg) and are
/// used as identity keys in all per-block analysis tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub(crate) NodeIndex);

impl BlockId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "b{}", self.0.index())
    }
}

/// Policy for deriving successor stores when leaving a block.
///
/// The rule selects which part of a possibly two-sided (then/else) store
/// reaches the successor, and on which side it lands there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowRule {
    /// Then store to then side, else store to else side. A one-sided store
    /// reaches both sides.
    #[default]
    EachToEach,
    /// The then store becomes both sides of the successor.
    ThenToBoth,
    /// The else store becomes both sides of the successor.
    ElseToBoth,
    /// The then store reaches only the then side of the successor.
    ThenToThen,
    /// The else store reaches only the else side of the successor.
    ElseToElse,
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::EachToEach => write!(f, "each-to-each"),
            Self::ThenToBoth => write!(f, "then-to-both"),
            Self::ElseToBoth => write!(f, "else-to-both"),
            Self::ThenToThen => write!(f, "then-to-then"),
            Self::ElseToElse => write!(f, "else-to-else"),
        }
    }
}

/// Cause tag carried by exceptional edges.
///
/// Tags are opaque to the engine; all exceptional edges of an exception
/// block that share a tag form that tag's successor set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExceptionTag(String);

impl ExceptionTag {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExceptionTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role of an edge in the block graph.
#[derive(Debug, Clone)]
pub enum Edge {
    Normal,
    Then,
    Else,
    Exceptional(ExceptionTag),
}

#[derive(Debug)]
pub enum Block {
    Regular(RegularBlock),
    Conditional(ConditionalBlock),
    Exception(ExceptionBlock),
    Special(SpecialBlock),
}

impl Block {
    #[must_use]
    pub fn id(&self) -> BlockId {
        match self {
            Self::Regular(b) => b.id,
            Self::Conditional(b) => b.id,
            Self::Exception(b) => b.id,
            Self::Special(b) => b.id,
        }
    }

    /// Nodes of the block in execution order.
    ///
    /// Conditional and special blocks hold no nodes and yield an empty
    /// slice.
    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Self::Regular(b) => &b.nodes,
            Self::Exception(b) => std::slice::from_ref(&b.node),
            Self::Conditional(_) | Self::Special(_) => &[],
        }
    }
}

/// Ordered sequence of at least one node with a single successor.
#[derive(Debug)]
pub struct RegularBlock {
    pub(crate) id: BlockId,
    pub(crate) nodes: Vec<NodeId>,
    pub(crate) flow_rule: FlowRule,
}

impl RegularBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    #[must_use]
    pub fn flow_rule(&self) -> FlowRule {
        self.flow_rule
    }
}

/// Nodeless branching point with a then successor and an else successor.
#[derive(Debug)]
pub struct ConditionalBlock {
    pub(crate) id: BlockId,
    pub(crate) then_flow_rule: FlowRule,
    pub(crate) else_flow_rule: FlowRule,
}

impl ConditionalBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn then_flow_rule(&self) -> FlowRule {
        self.then_flow_rule
    }

    #[must_use]
    pub fn else_flow_rule(&self) -> FlowRule {
        self.else_flow_rule
    }
}

/// Single node that may complete abruptly, with one normal successor and
/// per-tag sets of exceptional successors.
#[derive(Debug)]
pub struct ExceptionBlock {
    pub(crate) id: BlockId,
    pub(crate) node: NodeId,
    pub(crate) flow_rule: FlowRule,
}

impl ExceptionBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub fn flow_rule(&self) -> FlowRule {
        self.flow_rule
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialKind {
    Entry,
    Exit,
    ExceptionalExit,
}

impl fmt::Display for SpecialKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
            Self::ExceptionalExit => write!(f, "exceptional exit"),
        }
    }
}

/// Nodeless sentinel block marking the entry or one of the exits.
#[derive(Debug)]
pub struct SpecialBlock {
    pub(crate) id: BlockId,
    pub(crate) kind: SpecialKind,
    pub(crate) flow_rule: FlowRule,
}

impl SpecialBlock {
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> SpecialKind {
        self.kind
    }

    #[must_use]
    pub fn flow_rule(&self) -> FlowRule {
        self.flow_rule
    }
}
