use {
    super::{Allocation, AllocatorError, GPUMemoryAllocator},
    ash::vk,
};

/// A memory allocator which directly allocates GPU memory using the
/// logical device. Host visible memory is mapped as soon as it is allocated
/// and stays mapped until it is freed.
///
/// # Safety
///
/// This struct retains a reference to the Vulkan logical device. It is the
/// responsibility of the application to ensure that this allocator is dropped
/// before the device is destroyed.
pub struct PassthroughAllocator {
    logical_device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl PassthroughAllocator {
    pub fn new(
        logical_device: ash::Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
    ) -> Self {
        Self {
            logical_device,
            memory_properties,
        }
    }

    fn is_host_visible(&self, memory_type_index: u32) -> bool {
        self.memory_properties.memory_types[memory_type_index as usize]
            .property_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }
}

impl GPUMemoryAllocator for PassthroughAllocator {
    unsafe fn allocate(
        &mut self,
        allocate_info: vk::MemoryAllocateInfo,
        _alignment: u64,
    ) -> Result<Allocation, AllocatorError> {
        // Alignment is unused because per the Vulkan spec:
        // https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/vkAllocateMemory.html
        // The memory returned by the device will always meet the system
        // alignment requirements.
        let memory = self
            .logical_device
            .allocate_memory(&allocate_info, None)
            .map_err(|source| AllocatorError::LogicalDeviceAllocationFailed {
                size: allocate_info.allocation_size,
                source,
            })?;

        let cpu_mapped_ptr =
            if self.is_host_visible(allocate_info.memory_type_index) {
                let mapped = self.logical_device.map_memory(
                    memory,
                    0,
                    vk::WHOLE_SIZE,
                    vk::MemoryMapFlags::empty(),
                );
                match mapped {
                    Ok(ptr) => Some(ptr),
                    Err(err) => {
                        self.logical_device.free_memory(memory, None);
                        return Err(AllocatorError::UnableToMapDeviceMemory(err));
                    }
                }
            } else {
                None
            };

        Ok(Allocation::new(
            memory,                          // memory
            0,                               // offset_in_bytes
            allocate_info.allocation_size,   // size_in_bytes
            allocate_info.memory_type_index, // memory index
            cpu_mapped_ptr,
        ))
    }

    unsafe fn free(
        &mut self,
        allocation: &Allocation,
    ) -> Result<(), AllocatorError> {
        if allocation.mapped_ptr().is_some() {
            self.logical_device.unmap_memory(allocation.device_memory());
        }
        self.logical_device
            .free_memory(allocation.device_memory(), None);
        Ok(())
    }
}
