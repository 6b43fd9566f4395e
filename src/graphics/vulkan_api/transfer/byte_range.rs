/// A half-open range of bytes `[start, end)` within a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

/// What is left of a range after another range is cut out of it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Remainder {
    /// The cut covered the whole range.
    Empty,

    /// The cut removed the front or back of the range, or missed it.
    One(ByteRange),

    /// The cut landed in the interior, splitting the range in two.
    Two(ByteRange, ByteRange),
}

impl Remainder {
    /// The remaining ranges in address order.
    pub fn pieces(self) -> impl Iterator<Item = ByteRange> {
        let (first, second) = match self {
            Remainder::Empty => (None, None),
            Remainder::One(range) => (Some(range), None),
            Remainder::Two(front, back) => (Some(front), Some(back)),
        };
        first.into_iter().chain(second)
    }
}

impl ByteRange {
    /// The range of `size` bytes starting at `offset`.
    pub fn new(offset: u64, size: u64) -> Self {
        Self {
            start: offset,
            end: offset + size,
        }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when the ranges share at least one byte.
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when the ranges share a byte or touch end to end.
    pub fn touches(&self, other: &ByteRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Remove `cut` from this range.
    pub fn subtract(&self, cut: &ByteRange) -> Remainder {
        if !self.overlaps(cut) {
            return Remainder::One(*self);
        }
        let front = ByteRange {
            start: self.start,
            end: cut.start,
        };
        let back = ByteRange {
            start: cut.end,
            end: self.end,
        };
        match (front.is_empty(), back.is_empty()) {
            (true, true) => Remainder::Empty,
            (false, true) => Remainder::One(front),
            (true, false) => Remainder::One(back),
            (false, false) => Remainder::Two(front, back),
        }
    }
}

/// Sort the ranges and merge every pair which overlaps or touches, leaving
/// the smallest set of disjoint ranges which covers the same bytes.
pub fn merge_ranges(ranges: &mut Vec<ByteRange>) {
    ranges.retain(|range| !range.is_empty());
    ranges.sort_unstable();
    let mut merged: Vec<ByteRange> = Vec::with_capacity(ranges.len());
    for range in ranges.drain(..) {
        match merged.last_mut() {
            Some(last) if last.touches(&range) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    *ranges = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u64, end: u64) -> ByteRange {
        ByteRange { start, end }
    }

    #[test]
    fn subtracting_a_disjoint_range_keeps_everything() {
        assert_eq!(r(0, 10).subtract(&r(10, 20)), Remainder::One(r(0, 10)));
        assert_eq!(r(10, 20).subtract(&r(0, 10)), Remainder::One(r(10, 20)));
    }

    #[test]
    fn subtracting_a_covering_range_leaves_nothing() {
        assert_eq!(r(5, 10).subtract(&r(0, 10)), Remainder::Empty);
        assert_eq!(r(5, 10).subtract(&r(5, 10)), Remainder::Empty);
    }

    #[test]
    fn subtracting_an_edge_trims_the_range() {
        assert_eq!(r(0, 100).subtract(&r(50, 150)), Remainder::One(r(0, 50)));
        assert_eq!(r(50, 150).subtract(&r(0, 100)), Remainder::One(r(100, 150)));
    }

    #[test]
    fn subtracting_the_interior_splits_the_range() {
        let remainder = r(0, 100).subtract(&r(40, 60));
        assert_eq!(remainder, Remainder::Two(r(0, 40), r(60, 100)));
        assert_eq!(
            remainder.pieces().collect::<Vec<_>>(),
            vec![r(0, 40), r(60, 100)]
        );
    }

    #[test]
    fn merging_joins_overlapping_and_adjacent_ranges() {
        let mut ranges = vec![r(50, 60), r(0, 10), r(10, 20), r(15, 30), r(70, 80)];
        merge_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 30), r(50, 60), r(70, 80)]);
    }

    #[test]
    fn merging_drops_empty_ranges() {
        let mut ranges = vec![r(5, 5), r(1, 2)];
        merge_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(1, 2)]);
    }
}
