mod queue;
mod queue_finder;

use {
    crate::graphics::vulkan_api::{QueueFamilies, VulkanError},
    ash::vk,
};

pub use self::{queue::Queue, queue_finder::QueueFinder};

/// The Vulkan instance, logical device, and the queues used for rendering
/// and uploads.
///
/// The render device owns the instance and logical device and destroys both
/// when dropped.
pub struct RenderDevice {
    graphics_queue: Queue,
    transfer_queue: Queue,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    physical_device: vk::PhysicalDevice,
    logical_device: ash::Device,
    instance: ash::Instance,
}

// Public API
// ----------

impl RenderDevice {
    /// Take ownership of an already-created instance and logical device.
    ///
    /// # Params
    ///
    /// * `instance` - the Vulkan instance used to create the device
    /// * `physical_device` - the physical device backing the logical device
    /// * `logical_device` - a device created with the queue create infos from
    ///   `queue_finder`, with timeline semaphores and synchronization2
    ///   enabled
    /// * `queue_finder` - the queue families picked for the device
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the render device takes ownership of the instance and logical
    ///     device, the caller must not destroy either
    ///   - every resource created with the device must be destroyed before
    ///     the render device is dropped
    pub unsafe fn from_raw(
        instance: ash::Instance,
        physical_device: vk::PhysicalDevice,
        logical_device: ash::Device,
        queue_finder: &QueueFinder,
    ) -> Self {
        let memory_properties =
            instance.get_physical_device_memory_properties(physical_device);
        let (graphics_queue, transfer_queue) =
            queue_finder.get_queues(&logical_device);
        log::info!(
            "Created render device with {} and {}",
            graphics_queue,
            transfer_queue
        );
        Self {
            graphics_queue,
            transfer_queue,
            memory_properties,
            physical_device,
            logical_device,
            instance,
        }
    }

    /// The raw ash logical device.
    pub fn device(&self) -> &ash::Device {
        &self.logical_device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// The queue used for rendering commands.
    pub fn graphics_queue(&self) -> &Queue {
        &self.graphics_queue
    }

    /// The queue used for uploads. This can be the graphics queue when the
    /// device has no other transfer-capable family.
    pub fn transfer_queue(&self) -> &Queue {
        &self.transfer_queue
    }

    /// The families on either side of an upload.
    pub fn queue_families(&self) -> QueueFamilies {
        QueueFamilies {
            transfer: self.transfer_queue.family_index(),
            graphics: self.graphics_queue.family_index(),
        }
    }

    /// Block until the device has finished all submitted work.
    pub fn wait_idle(&self) -> Result<(), VulkanError> {
        unsafe {
            self.logical_device
                .device_wait_idle()
                .map_err(VulkanError::UnableToWaitForDeviceToIdle)
        }
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        unsafe {
            self.logical_device
                .device_wait_idle()
                .expect("Error while idling the device before destruction!");
            self.logical_device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

impl std::fmt::Debug for RenderDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderDevice")
            .field("graphics_queue", &self.graphics_queue)
            .field("transfer_queue", &self.transfer_queue)
            .field("physical_device", &self.physical_device)
            .finish()
    }
}
