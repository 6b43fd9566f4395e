use {
    ash::vk::{self, Handle},
    ccthw_gpu_memory::graphics::vulkan_api::{
        Allocation, AllocatorError, DestroyAfter, DestroyResource,
        DestructionQueue, GPUMemoryAllocator, MemoryConfig, MemoryLocation,
        MemorySystem, PendingResource, UsageClass, VulkanError,
    },
};

const MIB: u64 = 1024 * 1024;

/// Hands out synthetic device-local memory handles.
#[derive(Default)]
struct CountingDevice {
    next_handle: u64,
    live: usize,
}

impl GPUMemoryAllocator for CountingDevice {
    unsafe fn allocate(
        &mut self,
        allocate_info: vk::MemoryAllocateInfo,
        _alignment: u64,
    ) -> Result<Allocation, AllocatorError> {
        self.next_handle += 1;
        self.live += 1;
        Ok(Allocation::new(
            vk::DeviceMemory::from_raw(self.next_handle),
            0,
            allocate_info.allocation_size,
            allocate_info.memory_type_index,
            None,
        ))
    }

    unsafe fn free(
        &mut self,
        _allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        self.live -= 1;
        Ok(())
    }
}

/// Returns destroyed resources' memory to the memory system.
struct FreeToMemorySystem<'a> {
    memory: &'a mut MemorySystem<CountingDevice>,
    destroyed: Vec<PendingResource>,
}

impl DestroyResource for FreeToMemorySystem<'_> {
    unsafe fn destroy(
        &mut self,
        resource: PendingResource,
        allocation: Allocation,
    ) -> Result<(), VulkanError> {
        self.memory.free_memory(&allocation)?;
        self.destroyed.push(resource);
        Ok(())
    }
}

fn memory_system() -> MemorySystem<CountingDevice> {
    let mut properties = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 1,
        memory_heap_count: 1,
        ..Default::default()
    };
    properties.memory_types[0] = vk::MemoryType {
        property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        heap_index: 0,
    };
    properties.memory_heaps[0] = vk::MemoryHeap {
        size: 1024 * MIB,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };
    MemorySystem::new(
        CountingDevice::default(),
        properties,
        MemoryConfig::default(),
    )
}

fn allocate(memory: &mut MemorySystem<CountingDevice>) -> Allocation {
    let requirements = vk::MemoryRequirements {
        size: 4096,
        alignment: 256,
        memory_type_bits: 0b1,
    };
    unsafe {
        memory.allocate_memory(
            requirements,
            MemoryLocation::DeviceLocal,
            UsageClass::SmallBuffer,
        )
    }
    .unwrap()
}

fn buffer(raw: u64) -> PendingResource {
    PendingResource::Buffer(vk::Buffer::from_raw(raw))
}

#[test]
fn released_memory_returns_to_the_allocator_once_the_frame_completes() {
    let mut memory = memory_system();
    let mut queue = DestructionQueue::new(4, 1);

    let first = allocate(&mut memory);
    let second = allocate(&mut memory);
    queue.enqueue(buffer(1), first, 3, DestroyAfter::NextFrame);
    queue.enqueue(buffer(2), second, 3, DestroyAfter::CurrentFrame);
    assert_eq!(memory.heaps()[0].allocated(), 8192);

    let mut destroyer = FreeToMemorySystem {
        memory: &mut memory,
        destroyed: vec![],
    };
    let destroyed = unsafe { queue.poll(3, &mut destroyer) }.unwrap();
    assert_eq!(destroyed, 1);
    assert_eq!(destroyer.destroyed, vec![buffer(2)]);

    let destroyed = unsafe { queue.poll(4, &mut destroyer) }.unwrap();
    assert_eq!(destroyed, 1);
    assert_eq!(destroyer.destroyed, vec![buffer(2), buffer(1)]);

    assert_eq!(queue.pending_count(), 0);
    assert_eq!(memory.heaps()[0].allocated(), 0);
    let stats = memory.stats();
    assert_eq!(stats[0].1.free_bytes, stats[0].1.reserved_bytes);
}

#[test]
fn a_burst_of_releases_drains_through_the_overflow_list() {
    let mut memory = memory_system();
    let mut queue = DestructionQueue::new(2, 1);

    for raw in 0..10 {
        let allocation = allocate(&mut memory);
        queue.enqueue(buffer(raw), allocation, 7, DestroyAfter::CurrentFrame);
    }
    assert_eq!(queue.overflow_count(), 8);

    let mut destroyer = FreeToMemorySystem {
        memory: &mut memory,
        destroyed: vec![],
    };
    let destroyed = unsafe { queue.poll(7, &mut destroyer) }.unwrap();

    assert_eq!(destroyed, 10);
    assert_eq!(queue.pending_count(), 0);
    assert!(queue.overflow_capacity() < 8);
    assert_eq!(memory.heaps()[0].allocated(), 0);
}
