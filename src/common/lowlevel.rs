use super::Cell;

use std::cmp::Ordering;

/// Time-expanded search state. The time step equals `g_cost` since every
/// action, waiting included, costs one.
#[derive(Clone, Eq, Debug, PartialEq, Hash)]
pub(crate) struct LowLevelOpenNode {
    pub(crate) position: Cell,
    pub(crate) f_open_cost: usize,
    pub(crate) g_cost: usize,
}

impl Ord for LowLevelOpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.f_open_cost
            .cmp(&other.f_open_cost)
            // Higher g cost (time) has higher priority
            .then_with(|| other.g_cost.cmp(&self.g_cost))
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for LowLevelOpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
