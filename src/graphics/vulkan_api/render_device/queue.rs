use ash::vk;

/// A Vulkan device queue.
#[derive(Debug, Copy, Clone)]
pub struct Queue {
    flags: vk::QueueFlags,
    family_index: u32,
    index: u32,
    queue: vk::Queue,
}

// Public API
// ----------

impl Queue {
    /// The queue family flags.
    pub fn family_flags(&self) -> vk::QueueFlags {
        self.flags
    }

    /// The queue family index for this queue.
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    /// The queue's index within its family.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The raw Vulkan queue handle.
    pub fn raw(&self) -> vk::Queue {
        self.queue
    }
}

impl std::fmt::Display for Queue {
    fn fmt(&self, format: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format.write_fmt(format_args!(
            "Queue {}:{} - {:?}",
            self.family_index, self.index, self.flags,
        ))
    }
}

// Private API
// -----------

impl Queue {
    pub(super) unsafe fn from_device(
        logical_device: &ash::Device,
        flags: vk::QueueFlags,
        family_index: u32,
        index: u32,
    ) -> Self {
        let queue = logical_device.get_device_queue(family_index, index);
        Self {
            flags,
            family_index,
            index,
            queue,
        }
    }
}
