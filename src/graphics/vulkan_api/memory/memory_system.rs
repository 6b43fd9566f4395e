use {
    super::{
        find_memory_type_index, Allocation, AllocatorError, AllocatorStats,
        FreelistAllocator, GPUMemoryAllocator, HeapBudget, MemoryConfig,
        MemoryLocation, PassthroughAllocator, UsageClass,
    },
    ash::vk,
    std::collections::HashMap,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct AllocatorKey {
    memory_type_index: u32,
    usage: UsageClass,
}

/// Owns one freelist allocator per memory type and usage class, and the
/// budget for every device heap.
///
/// Allocators are created lazily the first time a memory type and usage
/// class combination is requested.
pub struct MemorySystem<A: GPUMemoryAllocator = PassthroughAllocator> {
    device_allocator: A,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    heaps: Vec<HeapBudget>,
    allocators: HashMap<AllocatorKey, FreelistAllocator>,
    config: MemoryConfig,
}

// Public API
// ----------

impl<A: GPUMemoryAllocator> MemorySystem<A> {
    /// Create a new memory system.
    ///
    /// # Params
    ///
    /// * `device_allocator` - the allocator used to get whole memory blocks
    ///   from the device
    /// * `memory_properties` - the physical device's memory types and heaps
    /// * `config` - block sizes and budgets
    pub fn new(
        device_allocator: A,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        config: MemoryConfig,
    ) -> Self {
        let heaps = HeapBudget::for_each_heap(
            &memory_properties,
            config.heap_budget_percent,
        );
        Self {
            device_allocator,
            memory_properties,
            heaps,
            allocators: HashMap::new(),
            config,
        }
    }

    /// The configuration used for every allocator.
    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Allocate memory for a resource.
    ///
    /// # Params
    ///
    /// * `requirements` - the resource's memory requirements
    /// * `location` - where the memory should live
    /// * `usage` - which family of blocks the memory should come from
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the caller must free the allocation with `free_memory` once the
    ///     GPU is no longer using it
    pub unsafe fn allocate_memory(
        &mut self,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        usage: UsageClass,
    ) -> Result<Allocation, AllocatorError> {
        let memory_type_index = find_memory_type_index(
            &self.memory_properties,
            requirements.memory_type_bits,
            location.required_flags(),
        )?;
        let heap_index = self.memory_properties.memory_types
            [memory_type_index as usize]
            .heap_index;
        let key = AllocatorKey {
            memory_type_index,
            usage,
        };
        let block_size = self.config.block_size(usage);
        let free_nodes_per_block = self.config.free_nodes_per_block;

        let allocator = self.allocators.entry(key).or_insert_with(|| {
            FreelistAllocator::new(
                memory_type_index,
                heap_index,
                block_size,
                free_nodes_per_block,
            )
        });
        allocator.allocate(
            &mut self.device_allocator,
            &mut self.heaps[heap_index as usize],
            requirements.size,
            requirements.alignment,
        )
    }

    /// Return an allocation to the allocator it came from.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the GPU must no longer be using the allocation. Use the
    ///     destruction queue to defer frees until the GPU is done.
    pub unsafe fn free_memory(
        &mut self,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        let memory_type_index = allocation.memory_type_index();
        let allocator = self
            .allocators
            .values_mut()
            .filter(|allocator| {
                allocator.memory_type_index() == memory_type_index
            })
            .find(|allocator| allocator.owns(allocation))
            .ok_or_else(|| {
                AllocatorError::OwningBlockNotFound(allocation.device_memory())
            })?;
        let heap = &mut self.heaps[allocator.heap_index() as usize];
        allocator.free(heap, allocation)
    }

    /// The budget for every device heap.
    pub fn heaps(&self) -> &[HeapBudget] {
        &self.heaps
    }

    /// Usage statistics for every allocator, ordered by memory type and
    /// usage class.
    pub fn stats(&self) -> Vec<(UsageClass, AllocatorStats)> {
        let mut stats: Vec<(AllocatorKey, AllocatorStats)> = self
            .allocators
            .iter()
            .map(|(key, allocator)| (*key, allocator.stats()))
            .collect();
        stats.sort_by_key(|(key, _)| (key.memory_type_index, key.usage));
        stats
            .into_iter()
            .map(|(key, stats)| (key.usage, stats))
            .collect()
    }

    /// Free every memory block.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - every allocation from this memory system is invalid afterwards
    ///   - the device must be idle
    pub unsafe fn destroy(&mut self) -> Result<(), AllocatorError> {
        for allocator in self.allocators.values_mut() {
            let heap = &mut self.heaps[allocator.heap_index() as usize];
            allocator.destroy(&mut self.device_allocator, heap)?;
        }
        self.allocators.clear();
        Ok(())
    }
}
