use std::{
    fmt::{self, Display},
    iter::{Sum, once},
    ops::{Range, Sub},
};

use derive_where::derive_where;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};

use crate::utils::range_consolidation::ConsolidatedIntervals;

/// Returned when a range is empty or inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRangeError<T> {
    pub start: T,
    pub end: T,
}

impl<T: Display> Display for InvalidRangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid range: end {} is not greater than start {}",
            self.end, self.start
        )
    }
}

impl<T: fmt::Debug + Display> std::error::Error for InvalidRangeError<T> {}

/// A non-empty half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    start: T,
    end: T,
}

impl<T: Ord + Copy> Interval<T> {
    pub fn new(start: T, end: T) -> Result<Self, InvalidRangeError<T>> {
        if end <= start {
            return Err(InvalidRangeError { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> T {
        self.start
    }

    pub fn end(&self) -> T {
        self.end
    }

    pub fn range(&self) -> Range<T> {
        self.start..self.end
    }

    /// Whether the two intervals overlap or share a boundary.
    pub fn touches(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }

    /// The smallest interval covering both.
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl<T: Ord + Copy> TryFrom<Range<T>> for Interval<T> {
    type Error = InvalidRangeError<T>;

    fn try_from(range: Range<T>) -> Result<Self, Self::Error> {
        Interval::new(range.start, range.end)
    }
}

impl<T> From<Interval<T>> for Range<T> {
    fn from(interval: Interval<T>) -> Self {
        interval.start..interval.end
    }
}

impl<T: Display> Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

impl<T: Serialize> Serialize for Interval<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.start, &self.end).serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for Interval<T>
where
    T: Deserialize<'de> + Ord + Copy + Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (start, end) = <(T, T)>::deserialize(deserializer)?;
        Interval::new(start, end).map_err(D::Error::custom)
    }
}

/// The minimal set of disjoint, non-adjacent half-open intervals covering
/// everything that was ever added to it.
///
/// Intervals are kept sorted by start, and there is always a gap of at
/// least one value between two consecutive intervals. Hence two sets
/// covering the same values always hold the same intervals, whatever
/// order they were built in.
#[derive_where(Default)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeSet<T> {
    intervals: Vec<Interval<T>>,
}

impl<T: Ord + Copy> RangeSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from arbitrary ranges, failing on the first empty or
    /// inverted one.
    pub fn try_from_ranges(
        ranges: impl IntoIterator<Item = Range<T>>,
    ) -> Result<Self, InvalidRangeError<T>> {
        let intervals: Vec<Interval<T>> = ranges
            .into_iter()
            .map(Interval::try_from)
            .collect::<Result<_, _>>()?;
        Ok(intervals.into_iter().collect())
    }

    /// Adds `[start, end)` to the set, coalescing it with every stored
    /// interval it overlaps or touches.
    ///
    /// Fails if `end <= start`, leaving the set untouched.
    pub fn add(&mut self, start: T, end: T) -> Result<(), InvalidRangeError<T>> {
        let interval = Interval::new(start, end)?;
        self.insert(interval);
        Ok(())
    }

    /// Same as [`RangeSet::add`], for an already validated interval.
    pub fn add_interval(&mut self, interval: Interval<T>) {
        self.insert(interval);
    }

    /// Adds every interval of `other` to this set. `other` is not modified.
    pub fn merge(&mut self, other: &RangeSet<T>) {
        for interval in &other.intervals {
            self.insert(*interval);
        }
    }

    /// Applies `f` to every interval in ascending order, collecting the
    /// results.
    pub fn map<U>(&self, mut f: impl FnMut(T, T) -> U) -> Vec<U> {
        self.intervals
            .iter()
            .map(|interval| f(interval.start, interval.end))
            .collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interval<T>> {
        self.intervals.iter()
    }

    pub fn intervals(&self) -> &[Interval<T>] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
    }

    /// Whether `value` lies inside one of the intervals.
    pub fn contains(&self, value: T) -> bool {
        let idx = self.intervals.partition_point(|i| i.end <= value);
        self.intervals.get(idx).is_some_and(|i| i.start <= value)
    }

    /// The number of values covered by the set.
    pub fn covered(&self) -> T
    where
        T: Sub<Output = T> + Sum<T>,
    {
        self.intervals.iter().map(|i| i.end - i.start).sum()
    }

    fn insert(&mut self, new: Interval<T>) {
        // Everything in `..first` ends strictly before `new`, and everything
        // in `last..` starts strictly after it. The rest gets coalesced.
        let first = self.intervals.partition_point(|i| i.end < new.start);
        let last = self.intervals.partition_point(|i| i.start <= new.end);

        let coalesced = self.intervals[first..last]
            .iter()
            .fold(new, |acc, i| acc.hull(i));

        log::trace!(
            "coalescing {} stored interval(s) into the new one",
            last - first
        );

        self.intervals = self.intervals[..first]
            .iter()
            .copied()
            .chain(once(coalesced))
            .chain(self.intervals[last..].iter().copied())
            .collect();
    }
}

impl<T: Ord + Copy> FromIterator<Interval<T>> for RangeSet<T> {
    fn from_iter<I: IntoIterator<Item = Interval<T>>>(iter: I) -> Self {
        Self {
            intervals: ConsolidatedIntervals::new(iter).collect(),
        }
    }
}

impl<T: Ord + Copy> Extend<Interval<T>> for RangeSet<T> {
    fn extend<I: IntoIterator<Item = Interval<T>>>(&mut self, iter: I) {
        let current = std::mem::take(&mut self.intervals);
        self.intervals = ConsolidatedIntervals::new(current.into_iter().chain(iter)).collect();
    }
}

impl<'a, T> IntoIterator for &'a RangeSet<T> {
    type Item = &'a Interval<T>;
    type IntoIter = std::slice::Iter<'a, Interval<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

impl<T: Display> Display for RangeSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.intervals.iter().format(", "))
    }
}

impl<T: Serialize> Serialize for RangeSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.intervals.serialize(serializer)
    }
}

impl<'de, T> Deserialize<'de> for RangeSet<T>
where
    T: Deserialize<'de> + Ord + Copy + Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let intervals = Vec::<Interval<T>>::deserialize(deserializer)?;
        let mut set = RangeSet::new();
        for interval in intervals {
            set.insert(interval);
        }
        Ok(set)
    }
}
