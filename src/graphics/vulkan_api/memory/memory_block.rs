use {
    super::{
        free_list::{FreeList, FreeRange},
        Allocation, AllocatorError,
    },
    ash::vk,
};

/// One real device memory allocation which is split into many smaller
/// allocations.
#[derive(Debug)]
pub struct MemoryBlock {
    memory: Allocation,
    free_list: FreeList,
}

impl MemoryBlock {
    /// Wrap a device memory allocation so it can be sub-allocated.
    ///
    /// # Params
    ///
    /// * `memory` - the block's backing memory, as returned by the device
    ///   allocator
    /// * `free_node_capacity` - the maximum number of disjoint free ranges
    ///   the block can track
    pub fn new(memory: Allocation, free_node_capacity: usize) -> Self {
        let free_list = FreeList::new(memory.size_in_bytes(), free_node_capacity);
        Self { memory, free_list }
    }

    /// Attempt to allocate from this block.
    ///
    /// # Returns
    ///
    /// None when no free range in the block is large enough.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<Allocation> {
        let placement = self.free_list.take_first_fit(size, alignment)?;
        Some(self.memory.suballocate(
            placement.offset,
            size,
            placement.padding,
        ))
    }

    /// Return an allocation's region, padding included, to the freelist.
    pub fn free(&mut self, allocation: &Allocation) -> Result<(), AllocatorError> {
        let block_offset =
            allocation.region_offset() - self.memory.offset_in_bytes();
        self.free_list
            .release(block_offset, allocation.region_size())
    }

    /// True when the allocation was carved from this block.
    pub fn owns(&self, allocation: &Allocation) -> bool {
        unsafe {
            // SAFE because the handles are only compared
            self.memory.device_memory() == allocation.device_memory()
        }
    }

    /// The device memory handle which backs this block.
    pub fn device_memory(&self) -> vk::DeviceMemory {
        unsafe { self.memory.device_memory() }
    }

    /// The block's backing allocation.
    pub fn memory(&self) -> &Allocation {
        &self.memory
    }

    /// The block size in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.memory.size_in_bytes()
    }

    /// The total number of unallocated bytes in the block.
    pub fn free_bytes(&self) -> u64 {
        self.free_list.free_bytes()
    }

    /// The number of disjoint free ranges in the block.
    pub fn free_range_count(&self) -> usize {
        self.free_list.node_count()
    }

    /// The free ranges in list order.
    pub fn free_ranges(&self) -> Vec<FreeRange> {
        self.free_list.ranges().collect()
    }
}
