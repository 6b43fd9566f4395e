use {
    super::{Allocation, GPUMemoryAllocator, MemoryLocation, MemorySystem, UsageClass},
    crate::graphics::vulkan_api::VulkanError,
    ash::vk,
};

impl<A: GPUMemoryAllocator> MemorySystem<A> {
    /// Create a Vulkan buffer bound to newly allocated memory.
    ///
    /// # Params
    ///
    /// * `device` - the logical device used to create the buffer
    /// * `size_in_bytes` - the buffer's size
    /// * `usage` - how the buffer will be used
    /// * `location` - where the buffer's memory should live
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the buffer and allocation must be released together, typically
    ///     through the destruction queue, once the GPU is done with them
    pub unsafe fn create_buffer(
        &mut self,
        device: &ash::Device,
        size_in_bytes: u64,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> Result<(vk::Buffer, Allocation), VulkanError> {
        let create_info = vk::BufferCreateInfo {
            size: size_in_bytes,
            usage,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        let buffer = device
            .create_buffer(&create_info, None)
            .map_err(VulkanError::UnableToCreateBuffer)?;

        let requirements = device.get_buffer_memory_requirements(buffer);
        let usage_class = UsageClass::for_buffer(requirements.size, self.config());
        let allocation =
            match self.allocate_memory(requirements, location, usage_class) {
                Ok(allocation) => allocation,
                Err(err) => {
                    device.destroy_buffer(buffer, None);
                    return Err(err.into());
                }
            };

        if let Err(err) = device.bind_buffer_memory(
            buffer,
            allocation.device_memory(),
            allocation.offset_in_bytes(),
        ) {
            device.destroy_buffer(buffer, None);
            self.free_memory(&allocation)?;
            return Err(VulkanError::UnableToBindBufferMemory(err));
        }

        Ok((buffer, allocation))
    }

    /// Create a Vulkan image bound to newly allocated memory.
    ///
    /// # Params
    ///
    /// * `device` - the logical device used to create the image
    /// * `create_info` - the image's creation parameters
    /// * `location` - where the image's memory should live
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the image and allocation must be released together, typically
    ///     through the destruction queue, once the GPU is done with them
    pub unsafe fn create_image(
        &mut self,
        device: &ash::Device,
        create_info: &vk::ImageCreateInfo,
        location: MemoryLocation,
    ) -> Result<(vk::Image, Allocation), VulkanError> {
        let image = device
            .create_image(create_info, None)
            .map_err(VulkanError::UnableToCreateImage)?;

        let requirements = device.get_image_memory_requirements(image);
        let allocation =
            match self.allocate_memory(requirements, location, UsageClass::Image) {
                Ok(allocation) => allocation,
                Err(err) => {
                    device.destroy_image(image, None);
                    return Err(err.into());
                }
            };

        if let Err(err) = device.bind_image_memory(
            image,
            allocation.device_memory(),
            allocation.offset_in_bytes(),
        ) {
            device.destroy_image(image, None);
            self.free_memory(&allocation)?;
            return Err(VulkanError::UnableToBindImageMemory(err));
        }

        Ok((image, allocation))
    }
}
