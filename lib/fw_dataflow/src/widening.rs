//! Per-block widening decision.

use fw_cfg::BlockId;
use std::collections::BTreeMap;

/// Counts merges per block and decides when to switch from the plain join
/// to the widened join.
///
/// A negative threshold disables widening entirely, for clients whose
/// store lattice has finite height.
pub(crate) struct WideningController {
    threshold: i32,
    counts: BTreeMap<BlockId, i32>,
}

impl WideningController {
    pub(crate) fn new(threshold: i32) -> Self {
        Self {
            threshold,
            counts: BTreeMap::new(),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.counts.clear();
    }

    /// Consulted once per merge at the given block. Once the count reaches
    /// the threshold the counter resets and the merge must widen.
    pub(crate) fn should_widen(&mut self, block: BlockId) -> bool {
        if self.threshold < 0 {
            return false;
        }
        let count = self.counts.entry(block).or_insert(0);
        if *count >= self.threshold {
            *count = 0;
            true
        } else {
            *count += 1;
            false
        }
    }
}
