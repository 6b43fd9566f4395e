use {
    crate::graphics::vulkan_api::{RenderDevice, VulkanError},
    ash::vk,
    std::sync::Arc,
};

/// RAII Vulkan CommandPool.
pub struct CommandPool {
    command_pool: vk::CommandPool,
    primary_command_buffers: Vec<vk::CommandBuffer>,
    render_device: Arc<RenderDevice>,
}

impl CommandPool {
    /// Create a new Vulkan command pool.
    ///
    /// # Params
    ///
    /// * `render_device` - the device which owns the pool
    /// * `queue_family_index` - the family of the queue the pool's command
    ///   buffers are submitted to
    /// * `flags` - creation flags, typically TRANSIENT for per-frame work
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - command pools must be destroyed before the Vulkan device is dropped.
    pub unsafe fn new(
        render_device: Arc<RenderDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self, VulkanError> {
        let create_info = vk::CommandPoolCreateInfo {
            queue_family_index,
            flags,
            ..Default::default()
        };
        let command_pool = render_device
            .device()
            .create_command_pool(&create_info, None)
            .map_err(VulkanError::UnableToCreateCommandPool)?;
        Ok(Self {
            command_pool,
            primary_command_buffers: vec![],
            render_device,
        })
    }

    /// Get the n'th primary command buffer allocated by this pool.
    ///
    /// Note: The command pool destroys all allocated buffers when it is
    /// dropped. The caller must ensure that no command buffers are kept around
    /// after the pool is dropped.
    pub fn primary_command_buffer(&self, index: usize) -> vk::CommandBuffer {
        self.primary_command_buffers[index]
    }

    /// Allocate primary command buffers from this pool.
    ///
    /// # Returns
    ///
    /// Returns the index of the first newly allocated command buffer.
    pub fn allocate_primary_command_buffers(
        &mut self,
        count: u32,
    ) -> Result<usize, VulkanError> {
        let create_info = vk::CommandBufferAllocateInfo {
            command_pool: self.command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count,
            ..Default::default()
        };
        let new_buffers = unsafe {
            self.render_device
                .device()
                .allocate_command_buffers(&create_info)
                .map_err(VulkanError::UnableToAllocateCommandBuffers)?
        };
        let first = self.primary_command_buffers.len();
        self.primary_command_buffers.extend(new_buffers);
        Ok(first)
    }

    /// Reset every command buffer allocated from this pool.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - none of the pool's command buffers can be pending execution
    pub unsafe fn reset(&self) -> Result<(), VulkanError> {
        self.render_device
            .device()
            .reset_command_pool(
                self.command_pool,
                vk::CommandPoolResetFlags::empty(),
            )
            .map_err(VulkanError::UnableToResetCommandPool)
    }

    /// Get the raw Vulkan command pool handle.
    pub fn raw(&self) -> vk::CommandPool {
        self.command_pool
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .device()
                .destroy_command_pool(self.command_pool, None);
        }
    }
}

impl std::fmt::Debug for CommandPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandPool")
            .field("command_pool", &self.command_pool)
            .field("primary_command_buffers", &self.primary_command_buffers)
            .finish()
    }
}
