//! Store plumbing between transfer functions and the solvers.

use crate::lattice::Store;
use fw_cfg::ExceptionTag;
use std::collections::BTreeMap;
use std::fmt;

/// Direction of an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// Which side of a block's two-sided store an incoming merge targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Then,
    Else,
    Both,
}

/// Store handed to a transfer function: either a single store, or a
/// then/else pair downstream of a conditional split.
#[derive(Debug, Clone)]
pub enum TransferInput<S> {
    Regular(S),
    Split { then: S, els: S },
}

impl<S: Store> TransferInput<S> {
    /// The one-sided view of the input; the join of both sides for a
    /// split input.
    #[must_use]
    pub fn regular_store(&self) -> S {
        match self {
            Self::Regular(s) => s.clone(),
            Self::Split { then, els } => then.least_upper_bound(els),
        }
    }

    #[must_use]
    pub fn then_store(&self) -> &S {
        match self {
            Self::Regular(s) => s,
            Self::Split { then, .. } => then,
        }
    }

    #[must_use]
    pub fn else_store(&self) -> &S {
        match self {
            Self::Regular(s) => s,
            Self::Split { els, .. } => els,
        }
    }

    #[must_use]
    pub fn into_then_store(self) -> S {
        match self {
            Self::Regular(s) => s,
            Self::Split { then, .. } => then,
        }
    }

    #[must_use]
    pub fn into_else_store(self) -> S {
        match self {
            Self::Regular(s) => s,
            Self::Split { els, .. } => els,
        }
    }

    #[must_use]
    pub fn is_split(&self) -> bool {
        matches!(self, Self::Split { .. })
    }
}

/// Outcome of one transfer function call.
#[derive(Debug, Clone)]
pub struct TransferResult<V, S> {
    value: Option<V>,
    stores: TransferInput<S>,
    exceptional_stores: BTreeMap<ExceptionTag, S>,
    store_changed: bool,
}

impl<V, S: Store> TransferResult<V, S> {
    /// Result carrying a single output store.
    pub fn regular(store: S) -> Self {
        Self {
            value: None,
            stores: TransferInput::Regular(store),
            exceptional_stores: BTreeMap::new(),
            store_changed: false,
        }
    }

    /// Result carrying distinct then and else output stores.
    pub fn conditional(then: S, els: S) -> Self {
        Self {
            value: None,
            stores: TransferInput::Split { then, els },
            exceptional_stores: BTreeMap::new(),
            store_changed: false,
        }
    }

    /// Attaches the abstract value computed for the node.
    #[must_use]
    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }

    /// Attaches per-cause stores describing the state when the node
    /// completes abruptly.
    #[must_use]
    pub fn with_exceptional_stores(mut self, stores: BTreeMap<ExceptionTag, S>) -> Self {
        self.exceptional_stores = stores;
        self
    }

    /// Marks that the transfer function mutated the incoming store in
    /// place rather than replacing it.
    #[must_use]
    pub fn with_store_changed(mut self, changed: bool) -> Self {
        self.store_changed = changed;
        self
    }

    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// The one-sided view of the output store.
    #[must_use]
    pub fn regular_store(&self) -> S {
        self.stores.regular_store()
    }

    #[must_use]
    pub fn stores(&self) -> &TransferInput<S> {
        &self.stores
    }

    #[must_use]
    pub fn into_stores(self) -> TransferInput<S> {
        self.stores
    }

    #[must_use]
    pub fn exceptional_store(&self, tag: &ExceptionTag) -> Option<&S> {
        self.exceptional_stores.get(tag)
    }

    #[must_use]
    pub fn store_changed(&self) -> bool {
        self.store_changed
    }
}
