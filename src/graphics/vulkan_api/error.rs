use {crate::graphics::vulkan_api::AllocatorError, ash::vk, thiserror::Error};

#[derive(Debug, Error)]
pub enum VulkanError {
    #[error(transparent)]
    AllocatorError(#[from] AllocatorError),

    #[error("Unable to create a new device buffer {:?}", .0)]
    UnableToCreateBuffer(#[source] vk::Result),

    #[error("Unable to bind device memory to buffer {:?}", .0)]
    UnableToBindBufferMemory(#[source] vk::Result),

    #[error("Unable to create a new device image {:?}", .0)]
    UnableToCreateImage(#[source] vk::Result),

    #[error("Unable to bind device memory to image {:?}", .0)]
    UnableToBindImageMemory(#[source] vk::Result),

    #[error("Unable to create a timeline semaphore {:?}", .0)]
    UnableToCreateSemaphore(#[source] vk::Result),

    #[error("Unable to read the timeline semaphore counter {:?}", .0)]
    UnableToReadSemaphoreCounter(#[source] vk::Result),

    #[error("Error while waiting for timeline semaphore value {}", .value)]
    UnableToWaitForSemaphore {
        value: u64,
        #[source]
        source: vk::Result,
    },

    #[error("Unable to create a command pool {:?}", .0)]
    UnableToCreateCommandPool(#[source] vk::Result),

    #[error("Unable to allocate command buffers {:?}", .0)]
    UnableToAllocateCommandBuffers(#[source] vk::Result),

    #[error("Unable to reset the command pool {:?}", .0)]
    UnableToResetCommandPool(#[source] vk::Result),

    #[error("Unable to begin the command buffer {:?}", .0)]
    UnableToBeginCommandBuffer(#[source] vk::Result),

    #[error("Unable to end the command buffer {:?}", .0)]
    UnableToEndCommandBuffer(#[source] vk::Result),

    #[error("Unable to submit commands to the {} queue {:?}", .queue, .source)]
    UnableToSubmitCommands {
        queue: &'static str,
        #[source]
        source: vk::Result,
    },

    #[error("Error while waiting for the device to idle {:?}", .0)]
    UnableToWaitForDeviceToIdle(#[source] vk::Result),
}
