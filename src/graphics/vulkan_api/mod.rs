mod destruction;
mod error;
mod memory;
mod raii;
mod render_device;
mod sync;
mod transfer;

pub use self::{
    destruction::{
        DestroyAfter, DestroyResource, DestructionQueue, PendingResource,
        ResourceReclaimer,
    },
    error::VulkanError,
    memory::{
        find_memory_type_index, Allocation, AllocatorError, AllocatorStats,
        FreelistAllocator, GPUMemoryAllocator, HeapBudget, MemoryConfig,
        MemoryLocation, MemorySystem, PassthroughAllocator, UsageClass,
    },
    raii::{CommandPool, TimelineSemaphore},
    render_device::{Queue, QueueFinder, RenderDevice},
    sync::FrameTimeline,
    transfer::{
        dedup_buffer_copies, merge_ranges, AcquireBarriers, BufferTransfer,
        BufferUpload, ByteRange, Consumer, ImageCopyBatch, ImageTransfer,
        ImageUpload,
        QueueFamilies, Remainder, TransferBatch, TransferMethod,
        TransferPlan, TransferQueue,
    },
};

/// The maximum number of frames the host may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: u64 = 2;
