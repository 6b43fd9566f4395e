//! Device memory sub-allocation.
//!
//! Device memory is requested from the Vulkan device in large blocks which
//! are then split into many small allocations with a freelist. Each
//! [FreelistAllocator] owns the blocks for a single memory type and usage
//! class, and the [MemorySystem] routes requests to the right allocator.

mod allocation;
mod free_list;
mod freelist_allocator;
mod heap_budget;
mod memory_block;
mod memory_system;
mod memory_type;
mod passthrough_allocator;
mod resources;

#[cfg(test)]
pub(crate) mod fake_device;

use {ash::vk, thiserror::Error};

pub use self::{
    allocation::Allocation,
    freelist_allocator::{AllocatorStats, FreelistAllocator},
    heap_budget::HeapBudget,
    memory_system::MemorySystem,
    memory_type::{find_memory_type_index, MemoryLocation},
    passthrough_allocator::PassthroughAllocator,
};

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error("Unable to allocate {} bytes of device memory {:?}", .size, .source)]
    LogicalDeviceAllocationFailed {
        size: u64,
        #[source]
        source: vk::Result,
    },

    #[error("Unable to map device memory {:?}", .0)]
    UnableToMapDeviceMemory(#[source] vk::Result),

    #[error(
        "No memory type could be found for flags {:?} and type bits {:#b}",
        .0,
        .1
    )]
    MemoryTypeNotFound(vk::MemoryPropertyFlags, u32),

    #[error(
        "Heap {} budget exceeded: {} bytes requested with {} of {} bytes in use",
        .heap_index,
        .requested,
        .in_use,
        .capacity
    )]
    HeapBudgetExceeded {
        heap_index: u32,
        requested: u64,
        in_use: u64,
        capacity: u64,
    },

    #[error(
        "Allocation of {} bytes (alignment {}) can never fit in a {} byte block",
        .size,
        .alignment,
        .block_size
    )]
    AllocationLargerThanBlock {
        size: u64,
        alignment: u64,
        block_size: u64,
    },

    #[error("The free-node pool for a memory block is exhausted ({} nodes)", .0)]
    FreeNodePoolExhausted(usize),

    #[error("The allocation's memory is not mapped into host memory")]
    MemoryNotMapped,

    #[error("The mapped pointer is not aligned for the type {}", .0)]
    MemoryNotAlignedForType(String),

    #[error(
        "Write of {} bytes at offset {} exceeds the allocation size of {}",
        .len,
        .offset,
        .size
    )]
    WriteOutOfBounds { offset: u64, len: u64, size: u64 },

    #[error("No memory block owns the device memory {:?}", .0)]
    OwningBlockNotFound(vk::DeviceMemory),

    #[error(
        "The range at offset {} with size {} overlaps memory which is already free",
        .offset,
        .size
    )]
    RangeAlreadyFree { offset: u64, size: u64 },
}

/// The interface for composable GPU Memory Allocators.
pub trait GPUMemoryAllocator {
    /// Allocate a block of device memory.
    ///
    /// # Safety
    ///
    /// Unsafe because the caller is responsible for calling free when the
    /// memory is no longer needed.
    unsafe fn allocate(
        &mut self,
        allocate_info: vk::MemoryAllocateInfo,
        alignment: u64,
    ) -> Result<Allocation, AllocatorError>;

    /// Free an allocated piece of device memory.
    ///
    /// # Safety
    ///
    /// Unsafe because the caller must ensure that no GPU operations refer to
    /// the allocation.
    unsafe fn free(&mut self, allocation: &Allocation)
        -> Result<(), AllocatorError>;
}

impl GPUMemoryAllocator for Box<dyn GPUMemoryAllocator> {
    unsafe fn allocate(
        &mut self,
        allocate_info: vk::MemoryAllocateInfo,
        alignment: u64,
    ) -> Result<Allocation, AllocatorError> {
        self.as_mut().allocate(allocate_info, alignment)
    }

    unsafe fn free(
        &mut self,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        self.as_mut().free(allocation)
    }
}

/// The kind of resource an allocation backs. Each usage class gets its own
/// set of blocks so images never share a block with buffers and small,
/// frequently churned buffers don't fragment the large-buffer blocks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UsageClass {
    SmallBuffer,
    LargeBuffer,
    Image,
}

impl UsageClass {
    /// Pick the usage class for a buffer of the given size.
    pub fn for_buffer(size_in_bytes: u64, config: &MemoryConfig) -> Self {
        if size_in_bytes <= config.small_buffer_threshold {
            UsageClass::SmallBuffer
        } else {
            UsageClass::LargeBuffer
        }
    }
}

/// Tunables for the memory system.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// The device memory block size for buffers at or below the small buffer
    /// threshold.
    pub small_buffer_block_size: u64,

    /// The device memory block size for buffers above the small buffer
    /// threshold.
    pub large_buffer_block_size: u64,

    /// The device memory block size for images.
    pub image_block_size: u64,

    /// Buffers with a size at or below this value are placed in the small
    /// buffer blocks.
    pub small_buffer_threshold: u64,

    /// The percentage of each device heap which this application is willing
    /// to use. The remainder is left for other processes.
    pub heap_budget_percent: u64,

    /// The number of free-range nodes reserved for each memory block. This
    /// bounds how fragmented a single block may become.
    pub free_nodes_per_block: usize,
}

impl MemoryConfig {
    /// The block size used for allocators of the given usage class.
    pub fn block_size(&self, usage: UsageClass) -> u64 {
        match usage {
            UsageClass::SmallBuffer => self.small_buffer_block_size,
            UsageClass::LargeBuffer => self.large_buffer_block_size,
            UsageClass::Image => self.image_block_size,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            small_buffer_block_size: 4 * MIB,
            large_buffer_block_size: 32 * MIB,
            image_block_size: 32 * MIB,
            small_buffer_threshold: 256 * 1024,
            heap_budget_percent: 80,
            free_nodes_per_block: 1024,
        }
    }
}

/// Round `value` up to the next multiple of `alignment`.
///
/// Alignment must be a power of two, which Vulkan guarantees for every
/// memory requirement.
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}
