use {super::AllocatorError, ash::vk};

/// Where an allocation should live.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MemoryLocation {
    /// Fast device memory which the host cannot access directly. Data gets
    /// here through the transfer queue.
    DeviceLocal,

    /// Memory which the host can write through a persistent mapping. Used for
    /// staging buffers and small, frequently rewritten data.
    HostVisible,
}

impl MemoryLocation {
    /// The memory property flags which a memory type must have to serve
    /// this location.
    pub fn required_flags(&self) -> vk::MemoryPropertyFlags {
        match self {
            MemoryLocation::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            MemoryLocation::HostVisible => {
                vk::MemoryPropertyFlags::HOST_VISIBLE
                    | vk::MemoryPropertyFlags::HOST_COHERENT
            }
        }
    }
}

/// Find the first memory type allowed by `memory_type_bits` which has all of
/// the requested property flags.
///
/// # Params
///
/// * `memory_properties` - the physical device's memory properties
/// * `memory_type_bits` - the allowed types from a resource's memory
///   requirements
/// * `property_flags` - the properties the memory type must have
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    memory_type_bits: u32,
    property_flags: vk::MemoryPropertyFlags,
) -> Result<u32, AllocatorError> {
    memory_properties.memory_types
        [..memory_properties.memory_type_count as usize]
        .iter()
        .enumerate()
        .find(|(i, memory_type)| {
            let type_supported = memory_type_bits & (1 << i) != 0;
            let properties_supported =
                memory_type.property_flags.contains(property_flags);
            type_supported & properties_supported
        })
        .map(|(i, _memory_type)| i as u32)
        .ok_or(AllocatorError::MemoryTypeNotFound(
            property_flags,
            memory_type_bits,
        ))
}
