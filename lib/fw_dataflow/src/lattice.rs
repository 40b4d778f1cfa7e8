//! Lattice contracts implemented by analysis clients.

use fw_cfg::Node;
use std::fmt;

/// Element of the per-expression join semilattice.
///
/// Values are created by transfer functions and treated as immutable once
/// returned; the engine only ever merges them through
/// [`least_upper_bound`].
///
/// [`least_upper_bound`]: AbstractValue::least_upper_bound
pub trait AbstractValue: Clone + PartialEq + fmt::Debug {
    /// Joins two values. The operation is expected to be commutative,
    /// associative and idempotent.
    #[must_use]
    fn least_upper_bound(&self, other: &Self) -> Self;
}

/// Element of the per-program-point lattice.
///
/// Ownership of a store is transferred into every transfer function call;
/// the engine clones beforehand whenever it must preserve the previous
/// value, and it never hands out a store it keeps a reference to. The
/// `Display` rendering is the visualization hook used by solver logging.
pub trait Store: Clone + Eq + fmt::Display {
    /// Joins two stores. For any stores `x` and `y`,
    /// `x.least_upper_bound(&x) == x`,
    /// `x.least_upper_bound(&y) == y.least_upper_bound(&x)`, and the
    /// result is an upper bound of both.
    #[must_use]
    fn least_upper_bound(&self, other: &Self) -> Self;

    /// Widened join against the previous iterate, used instead of the
    /// plain join once a block has been revisited more than the widening
    /// threshold. Iterated application must stabilize in a bounded number
    /// of steps.
    ///
    /// Lattices of finite height keep the default, which reports widening
    /// as unsupported.
    #[must_use]
    fn widened_upper_bound(&self, _previous: &Self) -> Option<Self> {
        None
    }

    /// Conservative aliasing query available to transfer functions.
    fn can_alias(&self, _a: &Node, _b: &Node) -> bool {
        true
    }
}
