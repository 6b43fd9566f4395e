//! GPU memory sub-allocation, deferred resource destruction, and batched
//! cross-queue uploads for a Vulkan renderer.

pub mod graphics;
pub mod logging;
