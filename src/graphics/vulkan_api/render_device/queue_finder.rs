use {
    crate::graphics::vulkan_api::{Queue, QueueFamilies},
    ash::vk,
};

static QUEUE_PRIORITIES: [f32; 2] = [1.0, 1.0];

/// A helper for picking and creating the graphics and transfer queues.
#[derive(Debug, Clone)]
pub struct QueueFinder {
    graphics_family_index: u32,
    transfer_family_index: u32,
    families: Vec<vk::QueueFamilyProperties>,
}

// Public API
// ----------

impl QueueFinder {
    /// Pick the queue families for a physical device.
    ///
    /// The graphics queue comes from the first family which supports
    /// graphics. The transfer queue prefers a dedicated transfer family, then
    /// any other family with transfer support, then the graphics family.
    ///
    /// # Params
    ///
    /// * `families` - the physical device's queue family properties
    ///
    /// # Returns
    ///
    /// None when the device has no graphics queue.
    pub fn new(families: &[vk::QueueFamilyProperties]) -> Option<Self> {
        let graphics_family_index = Self::find_family(families, |flags| {
            flags.contains(vk::QueueFlags::GRAPHICS)
        })?;
        let transfer_family_index = Self::find_family(families, |flags| {
            flags.contains(vk::QueueFlags::TRANSFER)
                && !flags.intersects(
                    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE,
                )
        })
        .or_else(|| {
            families
                .iter()
                .enumerate()
                .find(|&(index, props)| {
                    index as u32 != graphics_family_index
                        && props.queue_flags.contains(vk::QueueFlags::TRANSFER)
                })
                .map(|(index, _)| index as u32)
        })
        .unwrap_or(graphics_family_index);

        Some(Self {
            graphics_family_index,
            transfer_family_index,
            families: families.to_vec(),
        })
    }

    /// Check that a physical device has all of the queues required by this
    /// crate.
    pub fn device_has_required_queues(
        families: &[vk::QueueFamilyProperties],
    ) -> bool {
        Self::new(families).is_some()
    }

    pub fn graphics_family_index(&self) -> u32 {
        self.graphics_family_index
    }

    pub fn transfer_family_index(&self) -> u32 {
        self.transfer_family_index
    }

    /// The families on either side of an upload.
    pub fn queue_families(&self) -> QueueFamilies {
        QueueFamilies {
            transfer: self.transfer_family_index,
            graphics: self.graphics_family_index,
        }
    }

    /// The queue create infos needed when creating the logical device.
    ///
    /// When both queues come from the same family a second queue is requested
    /// if the family has one.
    pub fn queue_create_infos(&self) -> Vec<vk::DeviceQueueCreateInfo> {
        let mut infos = vec![vk::DeviceQueueCreateInfo {
            queue_family_index: self.graphics_family_index,
            queue_count: 1,
            p_queue_priorities: QUEUE_PRIORITIES.as_ptr(),
            ..Default::default()
        }];
        if self.transfer_family_index == self.graphics_family_index {
            infos[0].queue_count = self.shared_family_queue_count();
        } else {
            infos.push(vk::DeviceQueueCreateInfo {
                queue_family_index: self.transfer_family_index,
                queue_count: 1,
                p_queue_priorities: QUEUE_PRIORITIES.as_ptr(),
                ..Default::default()
            });
        }
        infos
    }

    /// Get Queue instances for each queue required by this crate.
    ///
    /// # Params
    ///
    /// * `logical_device` - a device created with [Self::queue_create_infos]
    ///
    /// # Returns
    ///
    /// A tuple of `(graphics_queue, transfer_queue)`.
    ///
    /// # Safety
    ///
    /// Unsafe because:
    ///   - the logical device must have been created with the queue create
    ///     infos from this finder
    pub unsafe fn get_queues(&self, logical_device: &ash::Device) -> (Queue, Queue) {
        let graphics_queue = Queue::from_device(
            logical_device,
            self.flags(self.graphics_family_index),
            self.graphics_family_index,
            0,
        );
        let transfer_index = if self.transfer_family_index
            == self.graphics_family_index
        {
            self.shared_family_queue_count() - 1
        } else {
            0
        };
        let transfer_queue = Queue::from_device(
            logical_device,
            self.flags(self.transfer_family_index),
            self.transfer_family_index,
            transfer_index,
        );
        (graphics_queue, transfer_queue)
    }
}

// Private API
// -----------

impl QueueFinder {
    fn find_family<F>(
        families: &[vk::QueueFamilyProperties],
        predicate: F,
    ) -> Option<u32>
    where
        F: Fn(vk::QueueFlags) -> bool,
    {
        families
            .iter()
            .enumerate()
            .find(|(_index, props)| {
                props.queue_count > 0 && predicate(props.queue_flags)
            })
            .map(|(index, _)| index as u32)
    }

    fn flags(&self, family_index: u32) -> vk::QueueFlags {
        self.families[family_index as usize].queue_flags
    }

    fn shared_family_queue_count(&self) -> u32 {
        self.families[self.graphics_family_index as usize]
            .queue_count
            .min(QUEUE_PRIORITIES.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(queue_flags: vk::QueueFlags, queue_count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags,
            queue_count,
            ..Default::default()
        }
    }

    #[test]
    fn prefers_a_dedicated_transfer_family() {
        let families = [
            family(
                vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::TRANSFER,
                16,
            ),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 8),
            family(vk::QueueFlags::TRANSFER, 2),
        ];

        let finder = QueueFinder::new(&families).unwrap();

        assert_eq!(finder.graphics_family_index(), 0);
        assert_eq!(finder.transfer_family_index(), 2);
        assert!(finder.queue_families().needs_ownership_transfer());
        assert_eq!(finder.queue_create_infos().len(), 2);
    }

    #[test]
    fn falls_back_to_another_transfer_capable_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 2),
        ];

        let finder = QueueFinder::new(&families).unwrap();

        assert_eq!(finder.transfer_family_index(), 1);
    }

    #[test]
    fn shares_the_graphics_family_when_nothing_else_transfers() {
        let families = [family(
            vk::QueueFlags::GRAPHICS
                | vk::QueueFlags::COMPUTE
                | vk::QueueFlags::TRANSFER,
            4,
        )];

        let finder = QueueFinder::new(&families).unwrap();
        let infos = finder.queue_create_infos();

        assert_eq!(finder.transfer_family_index(), 0);
        assert!(!finder.queue_families().needs_ownership_transfer());
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_count, 2);
    }

    #[test]
    fn requires_a_graphics_family() {
        let families = [family(vk::QueueFlags::TRANSFER, 1)];
        assert!(QueueFinder::new(&families).is_none());
        assert!(!QueueFinder::device_has_required_queues(&families));
    }
}
