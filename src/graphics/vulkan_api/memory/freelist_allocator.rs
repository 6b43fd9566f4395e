use {
    super::{
        memory_block::MemoryBlock, Allocation, AllocatorError,
        GPUMemoryAllocator, HeapBudget,
    },
    ash::vk,
    indoc::indoc,
};

/// A snapshot of a freelist allocator's usage.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    pub memory_type_index: u32,
    pub block_count: usize,
    pub reserved_bytes: u64,
    pub free_bytes: u64,
    pub free_range_count: usize,
}

impl std::fmt::Display for AllocatorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type {}: {} blocks, {} of {} bytes free in {} ranges",
            self.memory_type_index,
            self.block_count,
            self.free_bytes,
            self.reserved_bytes,
            self.free_range_count,
        )
    }
}

/// Sub-allocates device memory of a single memory type from a growable set
/// of fixed-size blocks.
///
/// Requests are satisfied first-fit: blocks are searched in creation order
/// and the first free range with enough room is used. A new block is only
/// requested from the device when no existing block can satisfy a request.
#[derive(Debug)]
pub struct FreelistAllocator {
    memory_type_index: u32,
    heap_index: u32,
    block_size: u64,
    free_nodes_per_block: usize,
    blocks: Vec<MemoryBlock>,
}

// Public API
// ----------

impl FreelistAllocator {
    /// Create an allocator with no blocks.
    ///
    /// # Params
    ///
    /// * `memory_type_index` - the memory type every block is allocated with
    /// * `heap_index` - the heap that memory type draws from
    /// * `block_size` - the size of each device memory block
    /// * `free_nodes_per_block` - the free-range capacity of each block
    pub fn new(
        memory_type_index: u32,
        heap_index: u32,
        block_size: u64,
        free_nodes_per_block: usize,
    ) -> Self {
        Self {
            memory_type_index,
            heap_index,
            block_size,
            free_nodes_per_block,
            blocks: vec![],
        }
    }

    /// Allocate `size` bytes at the given alignment.
    ///
    /// # Params
    ///
    /// * `device_allocator` - used to request a new block when the existing
    ///   blocks are exhausted
    /// * `heap` - the budget for this allocator's heap
    /// * `size` - the number of bytes needed
    /// * `alignment` - the required alignment, a power of two
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the caller must free the allocation with this allocator when it
    ///     is no longer in use by the GPU
    ///   - `heap` must be the budget for this allocator's heap
    pub unsafe fn allocate<A>(
        &mut self,
        device_allocator: &mut A,
        heap: &mut HeapBudget,
        size: u64,
        alignment: u64,
    ) -> Result<Allocation, AllocatorError>
    where
        A: GPUMemoryAllocator + ?Sized,
    {
        debug_assert_eq!(heap.heap_index(), self.heap_index);
        let alignment = alignment.max(1);
        if size + alignment > self.block_size {
            return Err(AllocatorError::AllocationLargerThanBlock {
                size,
                alignment,
                block_size: self.block_size,
            });
        }

        let allocation = match self.allocate_from_blocks(size, alignment) {
            Some(allocation) => allocation,
            None => {
                self.add_block(device_allocator, heap)?;
                self.blocks
                    .last_mut()
                    .and_then(|block| block.allocate(size, alignment))
                    .ok_or(AllocatorError::AllocationLargerThanBlock {
                        size,
                        alignment,
                        block_size: self.block_size,
                    })?
            }
        };

        heap.record_allocation(allocation.region_size());
        Ok(allocation)
    }

    /// Return an allocation's memory to the block it came from.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the GPU must no longer be using the allocation
    ///   - the allocation must have been created by this allocator
    pub unsafe fn free(
        &mut self,
        heap: &mut HeapBudget,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        self.free_in_block(allocation)?;
        heap.record_free(allocation.region_size());
        log::trace!(
            "Freed {} bytes at offset {} from {:?}",
            allocation.size_in_bytes(),
            allocation.offset_in_bytes(),
            allocation.device_memory()
        );
        Ok(())
    }

    /// Release every block back to the device.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - every allocation from this allocator is invalid afterwards
    ///   - the GPU must not be using any of the memory
    pub unsafe fn destroy<A>(
        &mut self,
        device_allocator: &mut A,
        heap: &mut HeapBudget,
    ) -> Result<(), AllocatorError>
    where
        A: GPUMemoryAllocator + ?Sized,
    {
        for block in self.blocks.drain(..) {
            let leaked = block.size_in_bytes() - block.free_bytes();
            if leaked > 0 {
                log::warn!(
                    "Destroying a memory block with {} bytes still allocated",
                    leaked
                );
                heap.record_free(leaked);
            }
            device_allocator.free(block.memory())?;
            heap.release_block(block.size_in_bytes());
        }
        Ok(())
    }

    /// True when the allocation's memory belongs to one of this allocator's
    /// blocks.
    pub fn owns(&self, allocation: &Allocation) -> bool {
        self.blocks.iter().any(|block| block.owns(allocation))
    }

    /// The memory type used for every block.
    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    /// The heap every block is allocated from.
    pub fn heap_index(&self) -> u32 {
        self.heap_index
    }

    /// The number of device memory blocks owned by the allocator.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Summarize the allocator's memory usage.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            memory_type_index: self.memory_type_index,
            block_count: self.blocks.len(),
            reserved_bytes: self
                .blocks
                .iter()
                .map(MemoryBlock::size_in_bytes)
                .sum(),
            free_bytes: self.blocks.iter().map(MemoryBlock::free_bytes).sum(),
            free_range_count: self
                .blocks
                .iter()
                .map(MemoryBlock::free_range_count)
                .sum(),
        }
    }

    /// Every free range in every block as `(device_memory, offset, size)`.
    pub fn free_ranges(&self) -> Vec<(vk::DeviceMemory, u64, u64)> {
        self.blocks
            .iter()
            .flat_map(|block| {
                block.free_ranges().into_iter().map(move |range| {
                    (block.device_memory(), range.offset, range.size)
                })
            })
            .collect()
    }
}

// Private API
// -----------

impl FreelistAllocator {
    fn allocate_from_blocks(
        &mut self,
        size: u64,
        alignment: u64,
    ) -> Option<Allocation> {
        self.blocks
            .iter_mut()
            .find_map(|block| block.allocate(size, alignment))
    }

    fn free_in_block(
        &mut self,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        let block = self
            .blocks
            .iter_mut()
            .find(|block| block.owns(allocation))
            .ok_or_else(|| unsafe {
                AllocatorError::OwningBlockNotFound(allocation.device_memory())
            })?;
        block.free(allocation)
    }

    unsafe fn add_block<A>(
        &mut self,
        device_allocator: &mut A,
        heap: &mut HeapBudget,
    ) -> Result<(), AllocatorError>
    where
        A: GPUMemoryAllocator + ?Sized,
    {
        heap.reserve_block(self.block_size)?;
        let allocate_info = vk::MemoryAllocateInfo {
            memory_type_index: self.memory_type_index,
            allocation_size: self.block_size,
            ..Default::default()
        };
        let memory = match device_allocator.allocate(allocate_info, 1) {
            Ok(memory) => memory,
            Err(error) => {
                heap.release_block(self.block_size);
                return Err(error);
            }
        };
        log::info!(
            indoc!(
                "
                Created memory block {}
                  - memory type {} on heap {}
                  - {} bytes, host mapped: {}
                  - heap {} of {} bytes reserved"
            ),
            self.blocks.len(),
            self.memory_type_index,
            self.heap_index,
            self.block_size,
            memory.mapped_ptr().is_some(),
            heap.reserved(),
            heap.capacity(),
        );
        self.blocks
            .push(MemoryBlock::new(memory, self.free_nodes_per_block));
        Ok(())
    }
}
