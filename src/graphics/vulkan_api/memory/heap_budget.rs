use {super::AllocatorError, ash::vk};

/// Tracks how much of a device heap this application may use and how much
/// of it is in use.
///
/// Two numbers are tracked. `reserved` counts the device memory blocks
/// requested from the device and `allocated` counts the bytes handed out of
/// those blocks. Both are limited by the same capacity, which is discounted
/// from the real heap size so other processes keep some room.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeapBudget {
    heap_index: u32,
    capacity: u64,
    reserved: u64,
    allocated: u64,
}

impl HeapBudget {
    /// Create a budget for a device heap.
    ///
    /// # Params
    ///
    /// * `heap_index` - the device heap's index
    /// * `heap` - the heap's properties as reported by the physical device
    /// * `budget_percent` - the percentage of the heap this application may
    ///   use
    pub fn new(heap_index: u32, heap: vk::MemoryHeap, budget_percent: u64) -> Self {
        Self {
            heap_index,
            capacity: heap.size / 100 * budget_percent.min(100),
            reserved: 0,
            allocated: 0,
        }
    }

    /// Create a budget for every heap on the device.
    pub fn for_each_heap(
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        budget_percent: u64,
    ) -> Vec<Self> {
        memory_properties.memory_heaps
            [..memory_properties.memory_heap_count as usize]
            .iter()
            .enumerate()
            .map(|(index, heap)| Self::new(index as u32, *heap, budget_percent))
            .collect()
    }

    /// The heap's index on the device.
    pub fn heap_index(&self) -> u32 {
        self.heap_index
    }

    /// The number of bytes this application may use from the heap.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes requested from the device as memory blocks.
    pub fn reserved(&self) -> u64 {
        self.reserved
    }

    /// Bytes handed out as allocations from the heap's blocks.
    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    /// Account for a new device memory block.
    pub fn reserve_block(&mut self, size: u64) -> Result<(), AllocatorError> {
        self.check(size, self.reserved)?;
        self.reserved += size;
        Ok(())
    }

    /// Account for a device memory block which has been freed.
    pub fn release_block(&mut self, size: u64) {
        debug_assert!(self.reserved >= size);
        self.reserved -= size;
    }

    /// Account for bytes handed out from a block.
    ///
    /// Allocations always come from reserved blocks, so the allocated total
    /// can never pass the reserved total, which is already bounded by the
    /// capacity.
    pub fn record_allocation(&mut self, size: u64) {
        self.allocated += size;
        debug_assert!(self.allocated <= self.reserved);
    }

    /// Account for bytes returned to a block.
    pub fn record_free(&mut self, size: u64) {
        debug_assert!(self.allocated >= size);
        self.allocated -= size;
    }

    fn check(&self, requested: u64, in_use: u64) -> Result<(), AllocatorError> {
        if in_use + requested > self.capacity {
            return Err(AllocatorError::HeapBudgetExceeded {
                heap_index: self.heap_index,
                requested,
                in_use,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap(size: u64) -> vk::MemoryHeap {
        vk::MemoryHeap {
            size,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        }
    }

    #[test]
    fn capacity_is_discounted_from_the_heap_size() {
        let budget = HeapBudget::new(0, heap(1000), 80);
        assert_eq!(budget.capacity(), 800);
    }

    #[test]
    fn blocks_cannot_exceed_the_capacity() {
        let mut budget = HeapBudget::new(0, heap(1000), 50);
        budget.reserve_block(400).unwrap();

        let result = budget.reserve_block(200);

        assert!(matches!(
            result,
            Err(AllocatorError::HeapBudgetExceeded {
                heap_index: 0,
                requested: 200,
                in_use: 400,
                capacity: 500,
            })
        ));
        budget.release_block(400);
        budget.reserve_block(500).unwrap();
    }

    #[test]
    fn allocations_are_tracked_separately_from_blocks() {
        let mut budget = HeapBudget::new(1, heap(100), 100);
        budget.reserve_block(100).unwrap();
        budget.record_allocation(60);
        budget.record_allocation(40);
        assert_eq!(budget.allocated(), 100);

        budget.record_free(60);
        assert_eq!(budget.allocated(), 40);
        assert_eq!(budget.reserved(), 100);
    }
}
