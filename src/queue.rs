use std::collections::VecDeque;

use crate::lot::Lot;

/// Sorted queue of lots for a single asset.
///
/// A `VecDeque` is used for cheap removal from the front. The queue is re-sorted after every push,
/// so the front is always the earliest lot by the `Lot` ordering, which is what FIFO needs.
///
/// Push: O(N log N). Take oldest: O(n) in the number of lots taken.
#[derive(Debug, Default, Clone)]
pub struct LotQueue {
    items: VecDeque<Lot>,
}

impl LotQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `lots` and restores sorted order.
    pub fn push<I>(&mut self, lots: I)
    where
        I: IntoIterator<Item = Lot>,
    {
        self.items.extend(lots);
        self.items.make_contiguous().sort();
    }

    /// Removes and returns the `n` earliest lots. Returns everything that is left if there are
    /// fewer than `n`.
    pub fn take_oldest(&mut self, n: usize) -> Vec<Lot> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &Lot> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
