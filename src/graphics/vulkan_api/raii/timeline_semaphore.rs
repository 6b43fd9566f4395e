use {
    crate::graphics::vulkan_api::{RenderDevice, VulkanError},
    ash::vk,
    std::sync::Arc,
};

/// RAII Vulkan timeline semaphore.
///
/// The counter only moves forward. The GPU signals values as submissions
/// complete and the host can read or wait on the current value.
pub struct TimelineSemaphore {
    semaphore: vk::Semaphore,
    render_device: Arc<RenderDevice>,
}

impl TimelineSemaphore {
    /// Create a new timeline semaphore.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - The semaphore must be dropped before the render device.
    pub unsafe fn new(
        render_device: Arc<RenderDevice>,
        initial_value: u64,
    ) -> Result<Self, VulkanError> {
        let type_create_info = vk::SemaphoreTypeCreateInfo {
            semaphore_type: vk::SemaphoreType::TIMELINE,
            initial_value,
            ..Default::default()
        };
        let create_info = vk::SemaphoreCreateInfo {
            p_next: &type_create_info as *const vk::SemaphoreTypeCreateInfo
                as *const std::ffi::c_void,
            ..Default::default()
        };
        let semaphore = render_device
            .device()
            .create_semaphore(&create_info, None)
            .map_err(VulkanError::UnableToCreateSemaphore)?;
        Ok(Self {
            semaphore,
            render_device,
        })
    }

    /// The most recent value signaled on the semaphore.
    pub fn counter_value(&self) -> Result<u64, VulkanError> {
        unsafe {
            self.render_device
                .device()
                .get_semaphore_counter_value(self.semaphore)
                .map_err(VulkanError::UnableToReadSemaphoreCounter)
        }
    }

    /// Block until the semaphore's counter reaches `value`.
    ///
    /// There is no timeout. A GPU which never signals the value hangs the
    /// caller.
    pub fn wait_for_value(&self, value: u64) -> Result<(), VulkanError> {
        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo {
            semaphore_count: 1,
            p_semaphores: semaphores.as_ptr(),
            p_values: values.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.render_device
                .device()
                .wait_semaphores(&wait_info, u64::MAX)
                .map_err(|source| VulkanError::UnableToWaitForSemaphore {
                    value,
                    source,
                })
        }
    }

    /// A submit info which signals `value` once all commands complete.
    pub fn signal_info(&self, value: u64) -> vk::SemaphoreSubmitInfo {
        vk::SemaphoreSubmitInfo {
            semaphore: self.semaphore,
            value,
            stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
            ..Default::default()
        }
    }

    /// Get the Vulkan semaphore handle.
    pub fn raw(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for TimelineSemaphore {
    fn drop(&mut self) {
        unsafe {
            self.render_device
                .device()
                .destroy_semaphore(self.semaphore, None);
        }
    }
}

impl std::fmt::Debug for TimelineSemaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineSemaphore")
            .field("semaphore", &self.semaphore)
            .finish()
    }
}
