mod error;
mod gpu_context;

pub mod vulkan_api;

pub use self::{
    error::GraphicsError,
    gpu_context::{GpuContext, GpuContextConfig},
};
