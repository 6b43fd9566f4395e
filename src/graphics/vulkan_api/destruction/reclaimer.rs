use {
    super::{DestroyResource, PendingResource},
    crate::graphics::vulkan_api::{
        Allocation, GPUMemoryAllocator, MemorySystem, VulkanError,
    },
};

/// Destroys Vulkan handles with the logical device and returns their memory
/// to the memory system.
pub struct ResourceReclaimer<'a, A: GPUMemoryAllocator> {
    device: &'a ash::Device,
    memory: &'a mut MemorySystem<A>,
}

impl<'a, A: GPUMemoryAllocator> ResourceReclaimer<'a, A> {
    pub fn new(device: &'a ash::Device, memory: &'a mut MemorySystem<A>) -> Self {
        Self { device, memory }
    }
}

impl<'a, A: GPUMemoryAllocator> DestroyResource for ResourceReclaimer<'a, A> {
    unsafe fn destroy(
        &mut self,
        resource: PendingResource,
        allocation: Allocation,
    ) -> Result<(), VulkanError> {
        match resource {
            PendingResource::Buffer(buffer) => {
                self.device.destroy_buffer(buffer, None);
            }
            PendingResource::Image { image, view } => {
                if let Some(view) = view {
                    self.device.destroy_image_view(view, None);
                }
                self.device.destroy_image(image, None);
            }
        }
        self.memory.free_memory(&allocation)?;
        Ok(())
    }
}
