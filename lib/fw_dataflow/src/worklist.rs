//! Block worklist ordered by depth-first numbering.

use fixedbitset::FixedBitSet;
use fw_cfg::{BlockId, Cfg};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

/// Priority queue of blocks with set semantics.
///
/// Forward analyses dequeue in reverse post-order, backward analyses in
/// post-order, both derived from one depth-first pass over the graph from
/// its entry. A block absent from the numbering is unreachable; it sorts
/// last if it is ever queued.
pub(crate) struct Worklist {
    depth_first_order: BTreeMap<BlockId, usize>,
    queue: BinaryHeap<Reverse<(usize, BlockId)>>,
    queued: FixedBitSet,
}

impl Worklist {
    pub(crate) fn forward(cfg: &Cfg) -> Self {
        let postorder = cfg.depth_first_postorder();
        let len = postorder.len();
        let depth_first_order = postorder
            .into_iter()
            .enumerate()
            .map(|(i, block)| (block, len - 1 - i))
            .collect();
        Self::new(cfg, depth_first_order)
    }

    pub(crate) fn backward(cfg: &Cfg) -> Self {
        let depth_first_order = cfg
            .depth_first_postorder()
            .into_iter()
            .enumerate()
            .map(|(i, block)| (block, i))
            .collect();
        Self::new(cfg, depth_first_order)
    }

    fn new(cfg: &Cfg, depth_first_order: BTreeMap<BlockId, usize>) -> Self {
        Self {
            depth_first_order,
            queue: BinaryHeap::new(),
            queued: FixedBitSet::with_capacity(cfg.block_count()),
        }
    }

    /// Whether the block was reached by the depth-first pass.
    pub(crate) fn is_reachable(&self, block: BlockId) -> bool {
        self.depth_first_order.contains_key(&block)
    }

    pub(crate) fn push(&mut self, block: BlockId) {
        if self.queued.contains(block.index()) {
            return;
        }
        self.queued.insert(block.index());
        let rank = self
            .depth_first_order
            .get(&block)
            .copied()
            .unwrap_or(usize::MAX);
        self.queue.push(Reverse((rank, block)));
    }

    pub(crate) fn pop(&mut self) -> Option<BlockId> {
        let Reverse((_, block)) = self.queue.pop()?;
        self.queued.set(block.index(), false);
        Some(block)
    }
}
