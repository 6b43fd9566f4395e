//! A stand-in for the Vulkan device which hands out synthetic memory
//! handles. Host visible memory types are backed by real host memory so
//! mapped pointers can be written and inspected.

use {
    super::{Allocation, AllocatorError, GPUMemoryAllocator},
    ash::vk::{self, Handle},
    std::{collections::HashMap, ffi::c_void},
};

#[derive(Debug, Default)]
pub struct FakeDeviceAllocator {
    next_handle: u64,
    host_visible_type_bits: u32,
    live: HashMap<u64, Option<Vec<u8>>>,
    pub total_allocations: usize,
}

impl FakeDeviceAllocator {
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Default::default()
        }
    }

    /// Memory types whose bit is set get host-backed mapped pointers.
    pub fn with_host_visible_types(host_visible_type_bits: u32) -> Self {
        Self {
            host_visible_type_bits,
            ..Self::new()
        }
    }

    /// The number of device memory objects which have not been freed.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// The host bytes which back a host-visible device memory object.
    pub fn host_bytes(&self, memory: vk::DeviceMemory) -> Option<&[u8]> {
        self.live
            .get(&memory.as_raw())
            .and_then(|bytes| bytes.as_deref())
    }
}

impl GPUMemoryAllocator for FakeDeviceAllocator {
    unsafe fn allocate(
        &mut self,
        allocate_info: vk::MemoryAllocateInfo,
        _alignment: u64,
    ) -> Result<Allocation, AllocatorError> {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.total_allocations += 1;

        let host_visible = self.host_visible_type_bits
            & (1 << allocate_info.memory_type_index)
            != 0;
        let mut backing = host_visible
            .then(|| vec![0u8; allocate_info.allocation_size as usize]);
        let mapped_ptr = backing
            .as_mut()
            .map(|bytes| bytes.as_mut_ptr() as *mut c_void);
        self.live.insert(handle, backing);

        Ok(Allocation::new(
            vk::DeviceMemory::from_raw(handle),
            0,
            allocate_info.allocation_size,
            allocate_info.memory_type_index,
            mapped_ptr,
        ))
    }

    unsafe fn free(
        &mut self,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        let memory = allocation.device_memory();
        self.live
            .remove(&memory.as_raw())
            .map(|_| ())
            .ok_or(AllocatorError::OwningBlockNotFound(memory))
    }
}

/// Memory properties for a typical discrete GPU: a device-local heap and a
/// host-visible heap.
///
/// - type 0: DEVICE_LOCAL on heap 0
/// - type 1: HOST_VISIBLE | HOST_COHERENT on heap 1
pub fn discrete_gpu_memory_properties(
    device_heap_size: u64,
    host_heap_size: u64,
) -> vk::PhysicalDeviceMemoryProperties {
    let mut properties = vk::PhysicalDeviceMemoryProperties {
        memory_type_count: 2,
        memory_heap_count: 2,
        ..Default::default()
    };
    properties.memory_types[0] = vk::MemoryType {
        property_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
        heap_index: 0,
    };
    properties.memory_types[1] = vk::MemoryType {
        property_flags: vk::MemoryPropertyFlags::HOST_VISIBLE
            | vk::MemoryPropertyFlags::HOST_COHERENT,
        heap_index: 1,
    };
    properties.memory_heaps[0] = vk::MemoryHeap {
        size: device_heap_size,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };
    properties.memory_heaps[1] = vk::MemoryHeap {
        size: host_heap_size,
        flags: vk::MemoryHeapFlags::empty(),
    };
    properties
}
