use std::iter::FusedIterator;

use crate::range_set::Interval;

/// Iterates over the consolidated intervals of a given set of possibly
/// overlapping, unsorted intervals.
///
/// Overlapping and touching intervals are coalesced. The intervals are
/// returned in ascending order, so collecting the iterator yields a
/// canonical interval list.
pub struct ConsolidatedIntervals<T> {
    reverse_sorted: Vec<Interval<T>>,
}

impl<T: Ord + Copy> ConsolidatedIntervals<T> {
    pub fn new(intervals: impl IntoIterator<Item = Interval<T>>) -> Self {
        let mut reverse_sorted: Vec<_> = intervals.into_iter().collect();
        reverse_sorted.sort_unstable_by(|a, b| b.start().cmp(&a.start()));
        Self { reverse_sorted }
    }
}

impl<T: Ord + Copy> Iterator for ConsolidatedIntervals<T> {
    type Item = Interval<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut curr = self.reverse_sorted.pop()?;

        while let Some(next) = self.reverse_sorted.last() {
            if !next.touches(&curr) {
                break;
            }
            curr = curr.hull(next);
            self.reverse_sorted.pop();
        }
        Some(curr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reverse_sorted.len();
        (remaining.min(1), Some(remaining))
    }
}

impl<T: Ord + Copy> FusedIterator for ConsolidatedIntervals<T> {}
