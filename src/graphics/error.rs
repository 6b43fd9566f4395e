use thiserror::Error;

use crate::graphics::vulkan_api::{AllocatorError, VulkanError};

#[derive(Error, Debug)]
pub enum GraphicsError {
    #[error(transparent)]
    VulkanError(#[from] VulkanError),

    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl From<AllocatorError> for GraphicsError {
    fn from(error: AllocatorError) -> Self {
        GraphicsError::VulkanError(VulkanError::from(error))
    }
}
