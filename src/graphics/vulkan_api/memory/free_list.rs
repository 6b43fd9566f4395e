use super::{align_up, AllocatorError};

/// A contiguous range of free bytes within a memory block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FreeRange {
    pub offset: u64,
    pub size: u64,
}

impl FreeRange {
    fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// The location of a new allocation inside a block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Placement {
    /// The aligned offset handed to the caller.
    pub offset: u64,

    /// Bytes between the start of the consumed free range and the aligned
    /// offset.
    pub padding: u64,
}

#[derive(Debug, Copy, Clone)]
struct FreeNode {
    range: FreeRange,
    next: Option<usize>,
}

/// An address-ordered singly linked list of free ranges.
///
/// Nodes live in a fixed-size arena which is sized when the list is created.
/// Unused node slots are tracked with a stack of indices so acquiring and
/// releasing a node is O(1).
#[derive(Debug)]
pub struct FreeList {
    nodes: Vec<FreeNode>,
    unused_nodes: Vec<usize>,
    head: Option<usize>,
}

impl FreeList {
    /// Create a freelist where the entire `size` is free.
    ///
    /// # Params
    ///
    /// * `size` - the number of bytes managed by the list
    /// * `node_capacity` - the maximum number of disjoint free ranges
    pub fn new(size: u64, node_capacity: usize) -> Self {
        debug_assert!(node_capacity > 0);
        let empty = FreeNode {
            range: FreeRange { offset: 0, size: 0 },
            next: None,
        };
        let mut nodes = vec![empty; node_capacity];
        nodes[0].range.size = size;
        Self {
            nodes,
            unused_nodes: (1..node_capacity).rev().collect(),
            head: Some(0),
        }
    }

    /// Find the first free range, in list order, which can hold `size` bytes
    /// at the requested alignment and carve the allocation out of it.
    ///
    /// A range is only considered when it holds at least `size + alignment`
    /// bytes. This can skip ranges which would fit once aligned, but means
    /// the check never needs to compute the padding.
    pub fn take_first_fit(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Option<Placement> {
        let required = size + alignment;
        let mut previous: Option<usize> = None;
        let mut current = self.head;
        while let Some(index) = current {
            let node = self.nodes[index];
            if node.range.size >= required {
                let offset = align_up(node.range.offset, alignment);
                let padding = offset - node.range.offset;
                let consumed = padding + size;
                if consumed == node.range.size {
                    self.unlink(previous, index);
                } else {
                    let range = &mut self.nodes[index].range;
                    range.offset += consumed;
                    range.size -= consumed;
                }
                return Some(Placement { offset, padding });
            }
            previous = current;
            current = node.next;
        }
        None
    }

    /// Return a range to the freelist, merging it with adjacent free ranges.
    pub fn release(
        &mut self,
        offset: u64,
        size: u64,
    ) -> Result<(), AllocatorError> {
        let released = FreeRange { offset, size };

        // find the neighbors which surround the released range by address
        let mut previous: Option<usize> = None;
        let mut next = self.head;
        while let Some(index) = next {
            if self.nodes[index].range.offset > offset {
                break;
            }
            previous = next;
            next = self.nodes[index].next;
        }

        let overlaps_previous = previous
            .map(|index| self.nodes[index].range.end() > offset)
            .unwrap_or(false);
        let overlaps_next = next
            .map(|index| released.end() > self.nodes[index].range.offset)
            .unwrap_or(false);
        if overlaps_previous || overlaps_next {
            return Err(AllocatorError::RangeAlreadyFree { offset, size });
        }

        let merges_previous = previous
            .map(|index| self.nodes[index].range.end() == offset)
            .unwrap_or(false);
        let merges_next = next
            .map(|index| self.nodes[index].range.offset == released.end())
            .unwrap_or(false);

        match (previous, next) {
            (Some(p), Some(n)) if merges_previous && merges_next => {
                self.nodes[p].range.size += size + self.nodes[n].range.size;
                self.unlink(Some(p), n);
            }
            (Some(p), _) if merges_previous => {
                self.nodes[p].range.size += size;
            }
            (_, Some(n)) if merges_next => {
                let range = &mut self.nodes[n].range;
                range.offset = offset;
                range.size += size;
            }
            _ => {
                let index = self.unused_nodes.pop().ok_or(
                    AllocatorError::FreeNodePoolExhausted(self.nodes.len()),
                )?;
                self.nodes[index] = FreeNode {
                    range: released,
                    next,
                };
                match previous {
                    Some(p) => self.nodes[p].next = Some(index),
                    None => self.head = Some(index),
                }
            }
        }

        debug_assert!(self.is_fully_merged());
        Ok(())
    }

    /// Iterate over the free ranges in list order.
    pub fn ranges(&self) -> impl Iterator<Item = FreeRange> + '_ {
        let mut current = self.head;
        std::iter::from_fn(move || {
            let index = current?;
            current = self.nodes[index].next;
            Some(self.nodes[index].range)
        })
    }

    /// The total number of free bytes in the list.
    pub fn free_bytes(&self) -> u64 {
        self.ranges().map(|range| range.size).sum()
    }

    /// The number of disjoint free ranges.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.unused_nodes.len()
    }

    /// True when no two free ranges touch. Adjacent ranges must always be
    /// merged, otherwise the block can fail requests it has room for.
    pub fn is_fully_merged(&self) -> bool {
        let ranges: Vec<FreeRange> = self.ranges().collect();
        ranges
            .windows(2)
            .all(|pair| pair[0].end() < pair[1].offset)
    }

    fn unlink(&mut self, previous: Option<usize>, index: usize) {
        let next = self.nodes[index].next;
        match previous {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        self.nodes[index].range.size = 0;
        self.nodes[index].next = None;
        self.unused_nodes.push(index);
    }
}
