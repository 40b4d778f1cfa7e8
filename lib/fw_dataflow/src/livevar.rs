//! Live variable analysis.
//!
//! A backward analysis whose store is the set of variables whose current
//! value may still be read. Assignments kill their target and generate
//! every use reachable within their right-hand side; any other node
//! generates the uses found in its operands.

use crate::flow::{TransferInput, TransferResult};
use crate::lattice::{AbstractValue, Store};
use crate::transfer::{BackwardTransfer, TransferFunction};
use fw_cfg::{Cfg, NodeId, NodeKind, UnderlyingAst, VarId};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;

/// A live variable: a local read or a field access.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LiveVar {
    Local(VarId),
    Field(String),
}

impl LiveVar {
    /// The live variable read by the node, if it is a base-case read.
    #[must_use]
    pub fn from_node(cfg: &Cfg, node: NodeId) -> Option<Self> {
        match cfg.node(node).kind() {
            NodeKind::LocalRef(var) => Some(Self::Local(*var)),
            NodeKind::FieldAccess { field, .. } => Some(Self::Field(field.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for LiveVar {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Local(var) => write!(f, "{var}"),
            Self::Field(name) => write!(f, "{name}"),
        }
    }
}

impl AbstractValue for LiveVar {
    /// Live variables are bare identities; the engine never has a reason
    /// to join two of them.
    fn least_upper_bound(&self, _other: &Self) -> Self {
        panic!("live variable values cannot be joined")
    }
}

/// Set of variables live at a program point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiveVarStore {
    live: BTreeSet<LiveVar>,
}

impl LiveVarStore {
    #[must_use]
    pub fn live_vars(&self) -> &BTreeSet<LiveVar> {
        &self.live
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    pub fn put_live_var(&mut self, var: LiveVar) {
        self.live.insert(var);
    }

    pub fn kill_live_var(&mut self, var: &LiveVar) {
        self.live.remove(var);
    }

    /// Generates every variable use structurally reachable within the
    /// expression rooted at `node`. Local reads and field accesses are
    /// the base cases; composite nodes recurse through their operands.
    pub fn add_use_in_expression(&mut self, cfg: &Cfg, node: NodeId) {
        match cfg.node(node).kind() {
            NodeKind::LocalRef(_) | NodeKind::FieldAccess { .. } => {
                if let Some(var) = LiveVar::from_node(cfg, node) {
                    self.put_live_var(var);
                }
            }
            kind => {
                for operand in kind.operands() {
                    self.add_use_in_expression(cfg, operand);
                }
            }
        }
    }
}

impl fmt::Display for LiveVarStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, var) in self.live.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}")?;
        }
        write!(f, "}}")
    }
}

impl Store for LiveVarStore {
    fn least_upper_bound(&self, other: &Self) -> Self {
        Self {
            live: self.live.union(&other.live).cloned().collect(),
        }
    }
}

/// Transfer function of the live variable analysis.
#[derive(Debug, Default)]
pub struct LiveVarTransfer;

impl LiveVarTransfer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TransferFunction for LiveVarTransfer {
    type Value = LiveVar;
    type Store = LiveVarStore;
    type Error = Infallible;

    fn transfer_node(
        &mut self,
        node: NodeId,
        cfg: &Cfg,
        input: TransferInput<LiveVarStore>,
    ) -> Result<TransferResult<LiveVar, LiveVarStore>, Infallible> {
        let mut store = input.regular_store();
        match cfg.node(node).kind() {
            NodeKind::Assign { target, expression } => {
                if let Some(var) = LiveVar::from_node(cfg, *target) {
                    store.kill_live_var(&var);
                }
                store.add_use_in_expression(cfg, *expression);
            }
            kind => {
                for operand in kind.operands() {
                    store.add_use_in_expression(cfg, operand);
                }
            }
        }
        Ok(TransferResult::regular(store))
    }
}

impl BackwardTransfer for LiveVarTransfer {
    fn initial_normal_exit_store(
        &mut self,
        _ast: &UnderlyingAst,
        _return_nodes: &[NodeId],
    ) -> LiveVarStore {
        LiveVarStore::default()
    }

    fn initial_exceptional_exit_store(&mut self, _ast: &UnderlyingAst) -> LiveVarStore {
        LiveVarStore::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backward::BackwardAnalysis;
    use crate::result::Dataflow;
    use fw_cfg::{BinaryOp, CfgBuilder, Literal};

    fn analyze(cfg: &Cfg) -> Dataflow<'_, LiveVarTransfer> {
        let mut analysis = BackwardAnalysis::new(cfg, LiveVarTransfer::new());
        analysis.perform_analysis().unwrap();
        analysis.into_result()
    }

    fn locals(vars: &[VarId]) -> BTreeSet<LiveVar> {
        vars.iter().map(|var| LiveVar::Local(*var)).collect()
    }

    fn live_before(result: &mut Dataflow<'_, LiveVarTransfer>, node: NodeId) -> BTreeSet<LiveVar> {
        result
            .store_before(node)
            .unwrap()
            .unwrap()
            .live_vars()
            .clone()
    }

    #[test]
    fn sum_into_fresh_local() {
        // int m(int a, int b) { int c = a + b; return c; }
        let mut b = CfgBuilder::method("m");
        let a = b.parameter("a");
        let bb = b.parameter("b");
        let c = b.local("c");
        let n_a = b.node(NodeKind::LocalRef(a));
        let n_b = b.node(NodeKind::LocalRef(bb));
        let n_add = b.node(NodeKind::Binary {
            op: BinaryOp::Add,
            lhs: n_a,
            rhs: n_b,
        });
        let n_c_target = b.node(NodeKind::LocalRef(c));
        let n_assign = b.node(NodeKind::Assign {
            target: n_c_target,
            expression: n_add,
        });
        let n_c = b.node(NodeKind::LocalRef(c));
        let n_ret = b.node(NodeKind::Return {
            expression: Some(n_c),
        });
        let rb = b.regular_block(vec![n_a, n_b, n_add, n_c_target, n_assign, n_c, n_ret]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        assert_eq!(live_before(&mut result, n_ret), locals(&[c]));
        assert_eq!(live_before(&mut result, n_assign), locals(&[a, bb]));
        assert_eq!(
            result.entry_store().unwrap().live_vars(),
            &locals(&[a, bb])
        );
    }

    #[test]
    fn self_update_keeps_the_variable_live() {
        // int m(int x) { x = x + 1; return x; }
        let mut b = CfgBuilder::method("m");
        let x = b.parameter("x");
        let n_x_use = b.node(NodeKind::LocalRef(x));
        let n_one = b.node(NodeKind::Literal(Literal::Int(1)));
        let n_add = b.node(NodeKind::Binary {
            op: BinaryOp::Add,
            lhs: n_x_use,
            rhs: n_one,
        });
        let n_x_target = b.node(NodeKind::LocalRef(x));
        let n_assign = b.node(NodeKind::Assign {
            target: n_x_target,
            expression: n_add,
        });
        let n_x = b.node(NodeKind::LocalRef(x));
        let n_ret = b.node(NodeKind::Return {
            expression: Some(n_x),
        });
        let rb = b.regular_block(vec![n_x_use, n_one, n_add, n_x_target, n_assign, n_x, n_ret]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        assert_eq!(live_before(&mut result, n_ret), locals(&[x]));
        assert_eq!(live_before(&mut result, n_assign), locals(&[x]));
        assert_eq!(result.entry_store().unwrap().live_vars(), &locals(&[x]));
    }

    #[test]
    fn branches_keep_their_own_uses() {
        // int m(int a, int b) { if (a > 0) return a; return b; }
        let mut b = CfgBuilder::method("m");
        let a = b.parameter("a");
        let bb = b.parameter("b");
        let n_a_cond = b.node(NodeKind::LocalRef(a));
        let n_zero = b.node(NodeKind::Literal(Literal::Int(0)));
        let n_gt = b.node(NodeKind::Binary {
            op: BinaryOp::Gt,
            lhs: n_a_cond,
            rhs: n_zero,
        });
        let rb = b.regular_block(vec![n_a_cond, n_zero, n_gt]);
        let cond = b.conditional_block();
        let n_a = b.node(NodeKind::LocalRef(a));
        let n_ret_a = b.node(NodeKind::Return {
            expression: Some(n_a),
        });
        let rb_then = b.regular_block(vec![n_a, n_ret_a]);
        let n_b = b.node(NodeKind::LocalRef(bb));
        let n_ret_b = b.node(NodeKind::Return {
            expression: Some(n_b),
        });
        let rb_else = b.regular_block(vec![n_b, n_ret_b]);
        b.edge(b.entry(), rb);
        b.edge(rb, cond);
        b.then_edge(cond, rb_then);
        b.else_edge(cond, rb_else);
        b.edge(rb_then, b.regular_exit());
        b.edge(rb_else, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        assert_eq!(live_before(&mut result, n_ret_a), locals(&[a]));
        assert_eq!(live_before(&mut result, n_ret_b), locals(&[bb]));
        assert_eq!(live_before(&mut result, n_gt), locals(&[a, bb]));
        assert_eq!(
            result.entry_store().unwrap().live_vars(),
            &locals(&[a, bb])
        );
    }

    #[test]
    fn array_access_uses_base_and_index() {
        // int m(int[] xs, int i) { return xs[i]; }
        let mut b = CfgBuilder::method("m");
        let xs = b.parameter("xs");
        let i = b.parameter("i");
        let n_xs = b.node(NodeKind::LocalRef(xs));
        let n_i = b.node(NodeKind::LocalRef(i));
        let n_access = b.node(NodeKind::ArrayAccess {
            array: n_xs,
            index: n_i,
        });
        let n_ret = b.node(NodeKind::Return {
            expression: Some(n_access),
        });
        let rb = b.regular_block(vec![n_xs, n_i, n_access, n_ret]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        assert_eq!(live_before(&mut result, n_ret), locals(&[xs, i]));
    }

    #[test]
    fn dead_assignments_leave_every_point_empty() {
        // void m() { int a = 1; int b = 2; }
        let mut b = CfgBuilder::method("m");
        let a = b.local("a");
        let bb = b.local("b");
        let n_one = b.node(NodeKind::Literal(Literal::Int(1)));
        let n_a_target = b.node(NodeKind::LocalRef(a));
        let n_assign_a = b.node(NodeKind::Assign {
            target: n_a_target,
            expression: n_one,
        });
        let n_two = b.node(NodeKind::Literal(Literal::Int(2)));
        let n_b_target = b.node(NodeKind::LocalRef(bb));
        let n_assign_b = b.node(NodeKind::Assign {
            target: n_b_target,
            expression: n_two,
        });
        let nodes = vec![n_one, n_a_target, n_assign_a, n_two, n_b_target, n_assign_b];
        let rb = b.regular_block(nodes.clone());
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        for node in nodes {
            assert!(result.store_before(node).unwrap().unwrap().is_empty());
            assert!(result.store_after(node).unwrap().unwrap().is_empty());
        }
        let entry_out = result
            .block_store_after(cfg.entry_block())
            .unwrap()
            .unwrap();
        assert!(entry_out.is_empty());
    }

    #[test]
    fn field_reads_are_tracked_by_name() {
        // int m() { return this.size; }
        let mut b = CfgBuilder::method("m");
        let n_field = b.node(NodeKind::FieldAccess {
            receiver: None,
            field: "size".to_string(),
        });
        let n_ret = b.node(NodeKind::Return {
            expression: Some(n_field),
        });
        let rb = b.regular_block(vec![n_field, n_ret]);
        b.edge(b.entry(), rb);
        b.edge(rb, b.regular_exit());
        let cfg = b.build().unwrap();

        let mut result = analyze(&cfg);
        let expected: BTreeSet<LiveVar> =
            std::iter::once(LiveVar::Field("size".to_string())).collect();
        assert_eq!(live_before(&mut result, n_ret), expected);
    }
}
